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

//! Compiler module for Eel expressions
//!
//! Expressions are compiled once to bytecode, cached, and executed on a
//! stack VM. The result of every evaluation is identical to the one of the
//! [`InterpretingEvaluator`](crate::InterpretingEvaluator).

pub mod bytecode;
pub mod cache;
pub mod compiler;
pub mod vm;

pub use bytecode::{
    Bytecode, BytecodeBuilder, CompiledExpression, FunctionProto, Instruction,
};
pub use cache::{
    CacheStats, ExpressionCache, LruExpressionCache, MemoryExpressionCache, NullExpressionCache,
    cache_key,
};
pub use compiler::ExpressionCompiler;
pub use vm::VirtualMachine;

use crate::config::EelConfig;
use crate::core::Result;
use crate::evaluator::Evaluator;
use crate::model::{Context, EelValue};
use log::debug;
use std::sync::Arc;

/// Evaluates expressions through compiled, cached bytecode
#[derive(Clone)]
pub struct CompilingEvaluator {
    compiler: ExpressionCompiler,
    vm: VirtualMachine,
    cache: Arc<dyn ExpressionCache>,
    /// Shorter expressions bypass the cache
    min_cached_length: usize,
}

impl CompilingEvaluator {
    /// An evaluator with an unbounded in-memory cache
    pub fn new() -> Self {
        Self::with_cache(Arc::new(MemoryExpressionCache::new()))
    }

    pub fn with_cache(cache: Arc<dyn ExpressionCache>) -> Self {
        Self::with_config(&EelConfig::default(), cache)
    }

    pub fn with_config(config: &EelConfig, cache: Arc<dyn ExpressionCache>) -> Self {
        Self {
            compiler: ExpressionCompiler::with_config(config),
            vm: VirtualMachine::with_config(config),
            cache,
            min_cached_length: config.cache.min_expression_length,
        }
    }

    pub fn cache(&self) -> &Arc<dyn ExpressionCache> {
        &self.cache
    }

    /// Fetch the compiled form of `expression`, compiling and storing it on
    /// a cache miss
    pub fn compiled(&self, expression: &str) -> Result<Arc<CompiledExpression>> {
        let source = expression.trim();
        if source.len() < self.min_cached_length {
            return Ok(Arc::new(self.compiler.compile(source)?));
        }

        let key = cache_key(source);

        if self.cache.has(&key) {
            if let Some(compiled) = self.cache.get(&key) {
                debug!("cache hit for '{source}'");
                return Ok(compiled);
            }
        }

        debug!("cache miss for '{source}', compiling");
        let compiled = Arc::new(self.compiler.compile(source)?);
        self.cache.set(&key, Arc::clone(&compiled));
        Ok(compiled)
    }
}

impl Default for CompilingEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CompilingEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilingEvaluator")
            .field("compiler", &self.compiler)
            .field("cache", &self.cache.stats())
            .finish()
    }
}

impl Evaluator for CompilingEvaluator {
    fn evaluate(&self, expression: &str, context: &Context) -> Result<EelValue> {
        let compiled = self.compiled(expression)?;
        self.vm.run(&compiled, context)
    }
}

/// Compile an expression with the default configuration
pub fn compile(expression: &str) -> Result<CompiledExpression> {
    ExpressionCompiler::new().compile(expression)
}

/// Disassembly listing of an expression
pub fn disassemble(expression: &str, config: &EelConfig) -> Result<String> {
    Ok(ExpressionCompiler::with_config(config)
        .compile(expression)?
        .disassemble())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_second_evaluation_hits_cache() {
        let evaluator = CompilingEvaluator::new();
        let context = Context::new(json!({"a": 20, "b": 22}));
        let cold = evaluator.evaluate("a + b", &context).unwrap();
        let warm = evaluator.evaluate("  a + b  ", &context).unwrap();
        assert_eq!(cold, warm);
        assert_eq!(warm, EelValue::Integer(42));

        let stats = evaluator.cache().stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_parse_errors_are_not_cached() {
        let evaluator = CompilingEvaluator::new();
        assert!(evaluator.evaluate("(a", &Context::empty()).is_err());
        assert!(evaluator.evaluate("(a", &Context::empty()).is_err());
        assert_eq!(evaluator.cache().stats().entries, 0);
    }

    #[test]
    fn test_null_cache_compiles_every_time() {
        let evaluator = CompilingEvaluator::with_cache(Arc::new(NullExpressionCache::new()));
        for _ in 0..3 {
            assert_eq!(
                evaluator.evaluate("1 + 1", &Context::empty()).unwrap(),
                EelValue::Integer(2)
            );
        }
        assert_eq!(evaluator.cache().stats().misses, 3);
    }

    #[test]
    fn test_short_expressions_bypass_cache() {
        let config = EelConfig {
            cache: crate::config::CacheConfig {
                min_expression_length: 4,
                ..Default::default()
            },
            ..EelConfig::default()
        };
        let evaluator = CompilingEvaluator::with_config(&config, config.cache.build_cache());
        evaluator.evaluate("1+1", &Context::empty()).unwrap();
        evaluator.evaluate("1 + 1", &Context::empty()).unwrap();
        assert_eq!(evaluator.cache().stats().entries, 1);
    }

    #[test]
    fn test_disassemble_helper() {
        let listing = disassemble("foo.bar(1)", &EelConfig::default()).unwrap();
        assert!(listing.contains("LOAD_VAR"));
        assert!(listing.contains("LOAD_PROP"));
        assert!(listing.contains("CALL_METHOD"));
    }
}
