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

//! Eel engine - the main entry point for expression evaluation

use crate::compiler::{CacheStats, CompilingEvaluator};
use crate::config::EelConfig;
use crate::core::Result;
use crate::evaluator::{Evaluator, InterpretingEvaluator};
use crate::model::{Context, EelValue, ProtectedContext};
use crate::recognizer;
use crate::registry::HelperRegistry;
use log::debug;
use serde::{Deserialize, Serialize};

/// Which evaluator the engine uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    /// Walk the syntax tree on every evaluation
    Interpret,
    /// Compile once to cached bytecode
    #[default]
    Compile,
}

impl std::str::FromStr for EvaluationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "interpret" | "interpreter" => Ok(Self::Interpret),
            "compile" | "compiled" => Ok(Self::Compile),
            other => Err(format!("unknown evaluation mode '{other}'")),
        }
    }
}

/// Main Eel engine: both evaluators, a compiled-expression cache and the
/// helper namespace
#[derive(Debug, Clone)]
pub struct EelEngine {
    config: EelConfig,
    interpreter: InterpretingEvaluator,
    compiler: CompilingEvaluator,
    helpers: HelperRegistry,
}

impl Default for EelEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EelEngine {
    /// Create an engine with the default configuration and helpers
    pub fn new() -> Self {
        Self::with_config(EelConfig::default())
    }

    /// Create an engine; the cache backend follows `config.cache`
    pub fn with_config(config: EelConfig) -> Self {
        let cache = config.cache.build_cache();
        Self {
            interpreter: InterpretingEvaluator::with_config(&config),
            compiler: CompilingEvaluator::with_config(&config, cache),
            helpers: HelperRegistry::with_defaults(),
            config,
        }
    }

    /// Replace the helper namespace
    pub fn with_helpers(mut self, helpers: HelperRegistry) -> Self {
        self.helpers = helpers;
        self
    }

    pub fn config(&self) -> &EelConfig {
        &self.config
    }

    pub fn helpers(&self) -> &HelperRegistry {
        &self.helpers
    }

    pub fn evaluator(&self, mode: EvaluationMode) -> &dyn Evaluator {
        match mode {
            EvaluationMode::Interpret => &self.interpreter,
            EvaluationMode::Compile => &self.compiler,
        }
    }

    /// A context over `data` plus the helper namespace
    pub fn context(&self, data: impl Into<EelValue>) -> Context {
        self.helpers.context_with(data)
    }

    /// A protected context over `data` plus the helper namespace. Helper
    /// methods stay callable; everything else needs a whitelist entry.
    pub fn protected_context(&self, data: impl Into<EelValue>) -> ProtectedContext {
        ProtectedContext::new(self.helpers.root_value(data))
    }

    /// Evaluate an expression against a context
    pub fn evaluate(
        &self,
        expression: &str,
        context: &Context,
        mode: EvaluationMode,
    ) -> Result<EelValue> {
        debug!("evaluating '{}' ({mode:?})", expression.trim());
        self.evaluator(mode).evaluate(expression, context)
    }

    /// Evaluate an expression against JSON data merged with the helpers
    pub fn evaluate_json(&self, expression: &str, data: serde_json::Value) -> Result<EelValue> {
        let context = self.context(data);
        self.evaluate(expression, &context, EvaluationMode::default())
    }

    /// Evaluate `text` if it is a `${…}` wrapped expression, otherwise
    /// return it verbatim as a string
    pub fn evaluate_template(
        &self,
        text: &str,
        context: &Context,
        mode: EvaluationMode,
    ) -> Result<EelValue> {
        match recognizer::try_extract(text) {
            Some(expression) => self.evaluate(expression, context, mode),
            None => Ok(EelValue::from(text)),
        }
    }

    /// Statistics of the compiled-expression cache
    pub fn cache_stats(&self) -> CacheStats {
        self.compiler.cache().stats()
    }

    pub fn clear_cache(&self) {
        self.compiler.cache().clear();
    }
}
