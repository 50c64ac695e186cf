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

//! Eel expression parser
//!
//! Converts expression text into an Abstract Syntax Tree (AST) with a
//! hand-written tokenizer and a Pratt parser.

pub mod pratt;
pub mod span;
pub mod tokenizer;

pub use pratt::{DEFAULT_MAX_NESTING, PrattParser, parse_expression_pratt};
pub use span::Spanned;
pub use tokenizer::{Token, Tokenizer, tokenize};

use crate::ast::ExpressionNode;
use crate::core::Result;
use log::trace;

/// Parse an Eel expression. Surrounding whitespace is ignored; error
/// offsets are relative to the trimmed text, which is attached to the error.
pub fn parse_expression(input: &str) -> Result<ExpressionNode> {
    let source = input.trim();
    trace!("parsing expression: {source}");
    PrattParser::new(source)
        .parse()
        .map_err(|err| err.with_expression(source))
}

/// Parse an expression with a custom nesting limit
pub fn parse_expression_with_limit(input: &str, max_depth: usize) -> Result<ExpressionNode> {
    let source = input.trim();
    PrattParser::with_max_depth(source, max_depth)
        .parse()
        .map_err(|err| err.with_expression(source))
}
