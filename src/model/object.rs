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

//! Capabilities of opaque host values: objects and native functions

use super::value::EelValue;
use crate::core::Result;
use std::fmt;
use std::sync::Arc;

/// Capability interface implemented by host objects exposed to expressions.
///
/// The evaluators never inspect concrete types; property and method access on
/// an `EelValue::Object` always goes through this trait.
///
/// Implementations follow the getter convention of the expression language:
/// a property `title` is served by a `getTitle`/`isTitle` style accessor when
/// the host type has one, and by a public field otherwise.
pub trait EelObject: Send + Sync {
    /// Name used in error messages and debug output
    fn type_name(&self) -> &str;

    /// Resolve a property, `None` when the object has no such property
    fn resolve_property(&self, _name: &str) -> Option<EelValue> {
        None
    }

    /// Invoke a method, `None` when the object has no such method
    fn resolve_method(&self, _name: &str, _args: &[EelValue]) -> Option<Result<EelValue>> {
        None
    }

    /// Whether `name` may be called from a protected context without a
    /// whitelist entry
    fn allows_call_of_method(&self, _name: &str) -> bool {
        false
    }
}

impl fmt::Debug for dyn EelObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.type_name())
    }
}

/// Signature of native functions callable from expressions
pub type NativeFunction = dyn Fn(&[EelValue]) -> Result<EelValue> + Send + Sync;

/// A callable value: context functions and arrow-function closures
#[derive(Clone)]
pub struct EelFunction {
    name: Option<Arc<str>>,
    func: Arc<NativeFunction>,
}

impl EelFunction {
    /// Wrap a native closure
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&[EelValue]) -> Result<EelValue> + Send + Sync + 'static,
    {
        Self {
            name: None,
            func: Arc::new(func),
        }
    }

    /// Wrap a native closure with a name used in debug output
    pub fn named<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&[EelValue]) -> Result<EelValue> + Send + Sync + 'static,
    {
        Self {
            name: Some(name.into()),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Invoke the function
    pub fn call(&self, args: &[EelValue]) -> Result<EelValue> {
        (self.func)(args)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &EelFunction) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for EelFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Function({name})"),
            None => write!(f, "Function"),
        }
    }
}
