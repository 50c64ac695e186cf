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

//! Eel expression evaluation
//!
//! Two strategies share one set of operator semantics and one scope model:
//! the tree-walking [`InterpretingEvaluator`] here and the bytecode based
//! [`CompilingEvaluator`](crate::compiler::CompilingEvaluator).

mod interpreter;
pub mod operations;
pub(crate) mod scope;

pub use interpreter::InterpretingEvaluator;
pub(crate) use interpreter::literal_value;

use crate::core::Result;
use crate::model::{Context, EelValue};

/// Common interface of the evaluation strategies.
///
/// Implementations trim the expression, never mutate the context and return
/// fully unwrapped values (no nested contexts).
pub trait Evaluator: Send + Sync {
    /// Evaluate `expression` against `context`
    fn evaluate(&self, expression: &str, context: &Context) -> Result<EelValue>;
}
