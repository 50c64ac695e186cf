// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command-line interface for evaluating Eel expressions

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use eel::compiler::disassemble;
use eel::{EelConfig, EelEngine, EvaluationMode, parse, try_extract};
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "eel")]
#[command(about = "Evaluate Eel expressions against JSON data")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression
    Eval {
        /// Expression to evaluate, optionally wrapped in ${...}
        expression: String,
        /// Inline JSON data, or @file to read it from a file; stdin is read
        /// when the input is not a terminal
        #[arg(short, long)]
        input: Option<String>,
        /// Evaluator to use
        #[arg(short, long, default_value = "compile")]
        mode: EvaluationMode,
        /// Evaluate in a protected context
        #[arg(long)]
        protected: bool,
        /// Whitelist pattern for protected evaluation (repeatable)
        #[arg(long = "allow", value_name = "PATTERN")]
        allow: Vec<String>,
        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },
    /// Parse an expression and print its canonical form
    Parse {
        /// Expression to parse
        expression: String,
        /// Print the syntax tree in debug form
        #[arg(long)]
        debug: bool,
    },
    /// Print the bytecode of a compiled expression
    Disassemble {
        /// Expression to compile
        expression: String,
    },
    /// Extract the body of a ${...} wrapped expression
    Extract {
        /// Text to inspect
        text: String,
    },
}

fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {e:#}", paint::error("error:"));
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => EelConfig::from_file(path)?,
        None => EelConfig::default(),
    };

    match cli.command {
        Commands::Eval {
            expression,
            input,
            mode,
            protected,
            allow,
            pretty,
        } => handle_eval(config, &expression, input.as_deref(), mode, protected, &allow, pretty),
        Commands::Parse { expression, debug } => handle_parse(&expression, debug),
        Commands::Disassemble { expression } => {
            let listing = disassemble(unwrap_template(&expression), &config)?;
            println!("{listing}");
            Ok(())
        }
        Commands::Extract { text } => match try_extract(&text) {
            Some(body) => {
                println!("{body}");
                Ok(())
            }
            None => anyhow::bail!("not a wrapped expression: {text:?}"),
        },
    }
}

/// Accept both bare and `${...}` wrapped expressions
fn unwrap_template(expression: &str) -> &str {
    try_extract(expression).unwrap_or(expression)
}

fn read_input(input: Option<&str>) -> anyhow::Result<serde_json::Value> {
    let text = match input {
        Some(path) if path.starts_with('@') => fs::read_to_string(&path[1..])
            .with_context(|| format!("cannot read input file '{}'", &path[1..]))?,
        Some(inline) => inline.to_string(),
        None if io::stdin().is_terminal() => return Ok(serde_json::json!({})),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("cannot read input from stdin")?;
            buffer
        }
    };
    if text.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(&text).context("input is not valid JSON")
}

fn handle_eval(
    config: EelConfig,
    expression: &str,
    input: Option<&str>,
    mode: EvaluationMode,
    protected: bool,
    allow: &[String],
    pretty: bool,
) -> anyhow::Result<()> {
    let data = read_input(input)?;
    let engine = EelEngine::with_config(config);

    let context = if protected || !allow.is_empty() {
        let mut context = engine.protected_context(data);
        context.whitelist_all(allow);
        context.into_context()
    } else {
        engine.context(data)
    };

    let result = engine.evaluate(unwrap_template(expression), &context, mode)?;
    let json = result.to_json();
    let output = if pretty {
        serde_json::to_string_pretty(&json)?
    } else {
        serde_json::to_string(&json)?
    };
    println!("{}", paint::value(&output));
    Ok(())
}

fn handle_parse(expression: &str, debug: bool) -> anyhow::Result<()> {
    let ast = parse(unwrap_template(expression))?;
    if debug {
        println!("{ast:#?}");
    } else {
        println!("{ast}");
    }
    Ok(())
}

#[cfg(feature = "terminal")]
mod paint {
    use colored::Colorize;

    pub fn error(text: &str) -> String {
        text.red().bold().to_string()
    }

    pub fn value(text: &str) -> String {
        text.green().to_string()
    }
}

#[cfg(not(feature = "terminal"))]
mod paint {
    pub fn error(text: &str) -> String {
        text.to_string()
    }

    pub fn value(text: &str) -> String {
        text.to_string()
    }
}
