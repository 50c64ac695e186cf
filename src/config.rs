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

//! Engine configuration options

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::compiler::{
    ExpressionCache, LruExpressionCache, MemoryExpressionCache, NullExpressionCache,
};

/// Default limit for expression nesting and arrow-function recursion
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 128;

/// Configuration shared by the evaluators and the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EelConfig {
    /// Maximum expression nesting and nesting of arrow-function calls
    pub max_recursion_depth: usize,

    /// Fold constant subexpressions when compiling
    pub optimize: bool,

    /// Compiled expression caching
    pub cache: CacheConfig,
}

impl Default for EelConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            optimize: true,
            cache: CacheConfig::default(),
        }
    }
}

impl EelConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Read a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config {}: {e}", path.display()))?;
        Ok(Self::from_json_str(&text)?)
    }
}

/// Configuration for compiled expression caching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether compiled expressions are cached at all
    pub enabled: bool,

    /// Upper bound of cached expressions, `None` for unbounded
    pub max_entries: Option<usize>,

    /// Expressions shorter than this are compiled on every evaluation
    pub min_expression_length: usize,
}

impl CacheConfig {
    /// Create a configuration optimized for high throughput
    pub fn high_performance() -> Self {
        Self {
            enabled: true,
            max_entries: None,
            min_expression_length: 0,
        }
    }

    /// Create a configuration optimized for low memory usage
    pub fn low_memory() -> Self {
        Self {
            enabled: true,
            max_entries: Some(256),
            min_expression_length: 8,
        }
    }

    /// Create a configuration with caching disabled
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_entries: None,
            min_expression_length: 0,
        }
    }

    /// Build the cache backend this configuration describes
    pub fn build_cache(&self) -> Arc<dyn ExpressionCache> {
        match (self.enabled, self.max_entries) {
            (false, _) => Arc::new(NullExpressionCache::new()),
            (true, Some(capacity)) => Arc::new(LruExpressionCache::new(capacity)),
            (true, None) => Arc::new(MemoryExpressionCache::new()),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::high_performance()
    }
}
