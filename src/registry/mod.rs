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

//! Helper registry for Eel expressions
//!
//! Helpers are host objects inserted into the root context under a bare
//! identifier (`String.substr(...)`, `Math.PI`). They resolve like any other
//! context value; the evaluators know nothing about them.

mod args;
pub mod array;
mod format;
pub mod math;
mod preg;
pub mod string;

pub use array::ArrayHelper;
pub use math::MathHelper;
pub use string::StringHelper;

use crate::model::{Context, EelMap, EelObject, EelValue, MapKey};
use indexmap::IndexMap;
use log::debug;
use std::sync::Arc;

/// Named helper objects making up the default namespace of an engine
#[derive(Clone)]
pub struct HelperRegistry {
    helpers: IndexMap<String, Arc<dyn EelObject>>,
}

impl HelperRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            helpers: IndexMap::new(),
        }
    }

    /// A registry holding the built-in `String`, `Array` and `Math` helpers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("String", StringHelper);
        registry.register("Array", ArrayHelper);
        registry.register("Math", MathHelper);
        registry
    }

    /// Register a helper, replacing any helper of the same name
    pub fn register<O: EelObject + 'static>(&mut self, name: impl Into<String>, helper: O) -> &mut Self {
        self.register_arc(name, Arc::new(helper))
    }

    pub fn register_arc(&mut self, name: impl Into<String>, helper: Arc<dyn EelObject>) -> &mut Self {
        let name = name.into();
        debug!("registering helper '{name}'");
        self.helpers.insert(name, helper);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn EelObject>> {
        self.helpers.get(name)
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.helpers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    /// The helpers as context entries
    pub fn to_map(&self) -> EelMap {
        self.helpers
            .iter()
            .map(|(name, helper)| (MapKey::from_text(name), EelValue::Object(Arc::clone(helper))))
            .collect()
    }

    /// The helpers as a map value, usable as a root context value
    pub fn to_value(&self) -> EelValue {
        EelValue::map(self.to_map())
    }

    /// A root context holding the default helpers
    pub fn default_context_map() -> EelMap {
        Self::with_defaults().to_map()
    }

    /// Merge `data` with the helpers into a root context value. Entries of
    /// a map `data` shadow helpers of the same name; any other value is
    /// available as `value`.
    pub fn root_value(&self, data: impl Into<EelValue>) -> EelValue {
        let mut root = self.to_map();
        match data.into() {
            EelValue::Map(entries) => {
                for (key, value) in entries.iter() {
                    root.insert(key.clone(), value.clone());
                }
            }
            EelValue::Null => {}
            other => {
                root.insert(MapKey::from_text("value"), other);
            }
        }
        EelValue::map(root)
    }

    /// A context over `data` plus the helpers
    pub fn context_with(&self, data: impl Into<EelValue>) -> Context {
        Context::new(self.root_value(data))
    }
}

impl Default for HelperRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
