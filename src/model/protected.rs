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

//! Sandboxed contexts for untrusted expressions
//!
//! A [`ProtectedContext`] denies every function or method call that is not
//! matched by its whitelist. Property access stays unrestricted. Values
//! returned by calls or array offsets are treated as fresh protected scopes
//! with an empty whitelist, so chained calls need their own grant.

use super::context::Context;
use super::value::EelValue;
use std::ops::Deref;
use std::sync::Arc;

/// A single allow-rule, parsed once when it is added
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WhitelistPattern {
    /// `String.substr`: exactly this call path
    Exact(String),
    /// `String.*`: every method directly below `String`
    Prefix(String),
    /// `*`: every first-level function
    Any,
}

impl WhitelistPattern {
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim();
        if pattern == "*" {
            WhitelistPattern::Any
        } else if let Some(prefix) = pattern.strip_suffix(".*") {
            WhitelistPattern::Prefix(prefix.to_string())
        } else {
            WhitelistPattern::Exact(pattern.to_string())
        }
    }

    /// Match a dotted call path measured from the whitelisting context
    pub fn matches(&self, path: &str) -> bool {
        match self {
            WhitelistPattern::Any => !path.is_empty() && !path.contains('.'),
            WhitelistPattern::Exact(exact) => exact == path,
            WhitelistPattern::Prefix(prefix) => path
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|method| !method.is_empty() && !method.contains('.')),
        }
    }
}

/// Set of allow-rules of a protected context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    patterns: Vec<WhitelistPattern>,
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pattern: &str) {
        let parsed = WhitelistPattern::parse(pattern);
        if !self.patterns.contains(&parsed) {
            self.patterns.push(parsed);
        }
    }

    pub fn allows(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    pub fn patterns(&self) -> &[WhitelistPattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// A context that only allows whitelisted calls.
///
/// Dereferences to [`Context`], so it can be passed wherever a `&Context` is
/// expected:
///
/// ```
/// use eel::{Context, EelValue, Evaluator, InterpretingEvaluator, ProtectedContext};
/// use eel::registry::HelperRegistry;
///
/// let mut context = ProtectedContext::new(HelperRegistry::with_defaults().to_value());
/// context.whitelist("String.*");
///
/// let result = InterpretingEvaluator::new()
///     .evaluate("String.substr('Hello World', 6, 5)", &context)
///     .unwrap();
/// assert_eq!(result, EelValue::from("World"));
/// ```
#[derive(Debug, Clone)]
pub struct ProtectedContext {
    context: Context,
}

impl ProtectedContext {
    /// Wrap a value with an empty whitelist
    pub fn new(value: impl Into<EelValue>) -> Self {
        Self {
            context: Context::with_whitelist(value.into(), Arc::new(Whitelist::new())),
        }
    }

    /// Allow a call path: an exact name (`foo`, `String.substr`), a prefix
    /// wildcard (`String.*`) or everything first-level (`*`)
    pub fn whitelist(&mut self, pattern: &str) -> &mut Self {
        Arc::make_mut(self.context.whitelist_mut()).add(pattern);
        self
    }

    /// Allow several call paths at once
    pub fn whitelist_all<I, S>(&mut self, patterns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let whitelist = Arc::make_mut(self.context.whitelist_mut());
        for pattern in patterns {
            whitelist.add(pattern.as_ref());
        }
        self
    }

    pub fn allowed_patterns(&self) -> &[WhitelistPattern] {
        match self.context.whitelist() {
            Some(whitelist) => whitelist.patterns(),
            None => &[],
        }
    }

    pub fn into_context(self) -> Context {
        self.context
    }
}

impl Deref for ProtectedContext {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.context
    }
}

impl AsRef<Context> for ProtectedContext {
    fn as_ref(&self) -> &Context {
        &self.context
    }
}

impl From<ProtectedContext> for Context {
    fn from(value: ProtectedContext) -> Self {
        value.context
    }
}

/// A function returning a `ProtectedContext` delegates its own whitelist to
/// the caller
impl From<ProtectedContext> for EelValue {
    fn from(value: ProtectedContext) -> Self {
        EelValue::from(value.context)
    }
}
