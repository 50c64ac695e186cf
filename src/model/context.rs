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

//! Evaluation context: a wrapped value with path lookup

use super::protected::Whitelist;
use super::value::{EelValue, MapKey};
use std::fmt;
use std::sync::Arc;

/// Wraps exactly one value and resolves single path segments against it.
///
/// A context is immutable once built. Lookups never fail: a missing key,
/// a scalar value or a null value all resolve to `EelValue::Null`.
#[derive(Clone)]
pub struct Context {
    value: EelValue,
    whitelist: Option<Arc<Whitelist>>,
}

impl Context {
    /// Wrap a value
    pub fn new(value: impl Into<EelValue>) -> Self {
        Self {
            value: value.into(),
            whitelist: None,
        }
    }

    /// A context over an empty map
    pub fn empty() -> Self {
        Self::new(EelValue::empty_map())
    }

    pub(crate) fn with_whitelist(value: EelValue, whitelist: Arc<Whitelist>) -> Self {
        Self {
            value,
            whitelist: Some(whitelist),
        }
    }

    /// The wrapped value
    pub fn value(&self) -> &EelValue {
        &self.value
    }

    /// Whether calls through this context are whitelist-checked
    pub fn is_protected(&self) -> bool {
        self.whitelist.is_some()
    }

    pub(crate) fn whitelist(&self) -> Option<&Arc<Whitelist>> {
        self.whitelist.as_ref()
    }

    pub(crate) fn whitelist_mut(&mut self) -> &mut Arc<Whitelist> {
        self.whitelist.get_or_insert_with(Default::default)
    }

    /// Resolve a single, non-nested key
    pub fn get(&self, key: &str) -> EelValue {
        lookup_name(&self.value, key)
    }

    /// Resolve a key given as an expression value (array offsets)
    pub fn get_value(&self, key: &EelValue) -> EelValue {
        lookup(&self.value, key)
    }

    /// Recursively strip every context wrapper from the wrapped value.
    /// Scalars and objects are returned unchanged.
    pub fn unwrap(&self) -> EelValue {
        self.value.unwrapped()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.whitelist {
            Some(whitelist) => write!(f, "ProtectedContext({:?}, {whitelist:?})", self.value),
            None => write!(f, "Context({:?})", self.value),
        }
    }
}

/// Look a key up in a value. The key is converted to a map key the same way
/// array offsets are.
pub(crate) fn lookup(value: &EelValue, key: &EelValue) -> EelValue {
    match MapKey::from_value(key) {
        Some(map_key) => {
            let name = map_key.to_string();
            resolve_key(value, &map_key, &name)
        }
        None => EelValue::Null,
    }
}

/// Look a property name up in a value
pub(crate) fn lookup_name(value: &EelValue, name: &str) -> EelValue {
    resolve_key(value, &MapKey::from_text(name), name)
}

fn resolve_key(value: &EelValue, key: &MapKey, name: &str) -> EelValue {
    match value {
        EelValue::Map(map) => map.get(key).cloned().unwrap_or(EelValue::Null),
        EelValue::Object(object) => object.resolve_property(name).unwrap_or(EelValue::Null),
        EelValue::Context(ctx) => resolve_key(ctx.value(), key, name),
        _ => EelValue::Null,
    }
}
