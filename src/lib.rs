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

//! Eel embedded expression language in Rust
//!
//! Eel evaluates small JavaScript-like expressions (`foo.bar + 1`,
//! `a > 2 ? 'yes' : 'no'`, `Array.map(items, x => x * 2)`) against a
//! [`Context`]. Expressions can be interpreted directly or compiled to
//! cached bytecode; both evaluators produce identical results.
//!
//! ```
//! use eel::{EelEngine, EelValue};
//! use serde_json::json;
//!
//! let engine = EelEngine::new();
//! let result = engine
//!     .evaluate_json("String.toUpperCase(name) + '!'", json!({"name": "eel"}))
//!     .unwrap();
//! assert_eq!(result, EelValue::from("EEL!"));
//! ```

pub mod ast;
pub mod compiler;
pub mod config;
pub mod core;
pub mod engine;
pub mod evaluator;
pub mod model;
pub mod parser;
pub mod recognizer;
pub mod registry;

// Re-export main types
pub use compiler::{
    CacheStats, CompiledExpression, CompilingEvaluator, ExpressionCache, LruExpressionCache,
    MemoryExpressionCache, NullExpressionCache,
};
pub use config::{CacheConfig, EelConfig};
pub use crate::core::{EelError, ErrorCode, ErrorKind, Result};
pub use engine::{EelEngine, EvaluationMode};
pub use evaluator::{Evaluator, InterpretingEvaluator};
pub use model::{Context, EelFunction, EelMap, EelObject, EelValue, MapKey, ProtectedContext};
pub use parser::parse_expression as parse;
pub use recognizer::{is_expression, try_extract};
pub use registry::HelperRegistry;
