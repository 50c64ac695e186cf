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

//! Runtime scopes: values paired with the protection that applies to them
//!
//! Every intermediate value of an evaluation is a [`Scope`]. An open scope
//! allows every call. A protected scope carries the whitelist of the
//! protected context it came from and the dotted path walked from that
//! context; calls are checked against `path.method`. Call results, offsets
//! and arrow-function parameters lose their path, so calling anything on
//! them needs a grant from the object itself.

use super::operations::plain;
use crate::ast::ExpressionNode;
use crate::core::error_code::{EL0101, EL0102, EL0105};
use crate::core::{EelError, Result};
use crate::model::context::{lookup, lookup_name};
use crate::model::{Context, EelValue, Whitelist};
use log::{trace, warn};
use std::cell::Cell;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub(crate) enum Guard {
    Open,
    Protected {
        whitelist: Arc<Whitelist>,
        /// Dotted path from the protecting context, `None` once detached
        path: Option<String>,
    },
}

impl Guard {
    fn detached(&self) -> Guard {
        match self {
            Guard::Open => Guard::Open,
            Guard::Protected { whitelist, .. } => Guard::Protected {
                whitelist: Arc::clone(whitelist),
                path: None,
            },
        }
    }

    fn extended(&self, name: &str) -> Guard {
        match self {
            Guard::Open => Guard::Open,
            Guard::Protected { whitelist, path } => Guard::Protected {
                whitelist: Arc::clone(whitelist),
                path: path.as_deref().map(|p| join_path(p, name)),
            },
        }
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

/// A value together with the call protection that applies to it
#[derive(Debug, Clone)]
pub struct Scope {
    pub(crate) value: EelValue,
    guard: Guard,
}

impl Scope {
    /// Root scope of an evaluation
    pub(crate) fn root(context: &Context) -> Scope {
        let guard = match context.whitelist() {
            Some(whitelist) => Guard::Protected {
                whitelist: Arc::clone(whitelist),
                path: Some(String::new()),
            },
            None => Guard::Open,
        };
        Scope::adopt(context.value().clone(), guard)
    }

    /// Wrap a value. A context value becomes the scope itself: a protected
    /// context brings its own whitelist, a plain one keeps the current guard.
    fn adopt(value: EelValue, guard: Guard) -> Scope {
        match value {
            EelValue::Context(ctx) => match ctx.whitelist() {
                Some(whitelist) => {
                    trace!("adopting protected context as new scope");
                    let guard = Guard::Protected {
                        whitelist: Arc::clone(whitelist),
                        path: Some(String::new()),
                    };
                    Scope::adopt(ctx.value().clone(), guard)
                }
                None => Scope::adopt(ctx.value().clone(), guard),
            },
            value => Scope { value, guard },
        }
    }

    pub(crate) fn into_value(self) -> EelValue {
        self.value
    }

    pub(crate) fn value(&self) -> &EelValue {
        &self.value
    }

    /// A derived value without a call path (operator results, literals)
    pub(crate) fn derived(&self, value: EelValue) -> Scope {
        Scope::adopt(value, self.guard.detached())
    }

    /// Property traversal keeps the whitelist and extends the path
    pub(crate) fn property(&self, name: &str) -> Scope {
        Scope::adopt(lookup_name(&self.value, name), self.guard.extended(name))
    }

    /// Offset access detaches the result from the call path
    pub(crate) fn index(&self, key: &EelValue) -> Scope {
        Scope::adopt(lookup(&self.value, key), self.guard.detached())
    }

    /// Call `method` on this scope's value
    pub(crate) fn call(&self, method: &str, args: &[EelValue]) -> Result<EelValue> {
        if self.value.is_null() {
            trace!("call of '{method}' on null yields null");
            return Ok(EelValue::Null);
        }

        if let Guard::Protected { whitelist, path } = &self.guard {
            let call_path = path.as_deref().map(|p| join_path(p, method));
            let whitelisted = call_path.as_deref().is_some_and(|p| whitelist.allows(p));
            let granted = match &self.value {
                EelValue::Object(object) => object.allows_call_of_method(method),
                _ => false,
            };
            if !whitelisted && !granted {
                let denied = call_path.unwrap_or_else(|| method.to_string());
                warn!("denied call of \"{denied}\" in protected context");
                return Err(EelError::not_allowed(denied));
            }
        }

        match &self.value {
            EelValue::Map(_) => match plain(&lookup_name(&self.value, method)) {
                EelValue::Function(function) => function.call(args),
                EelValue::Null => Err(EelError::evaluation_error(
                    EL0101,
                    format!("Unknown function \"{method}\""),
                )),
                other => Err(EelError::evaluation_error(
                    EL0102,
                    format!("\"{method}\" is not callable, it is a {} value", other.type_name()),
                )),
            },
            EelValue::Object(object) => object.resolve_method(method, args).unwrap_or_else(|| {
                Err(EelError::evaluation_error(
                    EL0101,
                    format!("Unknown method \"{method}\" on {}", object.type_name()),
                ))
            }),
            other => Err(EelError::evaluation_error(
                EL0101,
                format!("Cannot call method \"{method}\" on {} value", other.type_name()),
            )),
        }
    }

    /// Wrap the result of a call made through this scope
    pub(crate) fn call_result(&self, value: EelValue) -> Scope {
        self.derived(value)
    }
}

/// Arrow-function parameters of one invocation
#[derive(Debug)]
struct Frame {
    names: Arc<[String]>,
    values: Vec<EelValue>,
    parent: Option<Arc<Frame>>,
}

/// Name resolution environment: the root scope plus arrow-function frames
#[derive(Debug, Clone)]
pub(crate) struct Env {
    root: Scope,
    frame: Option<Arc<Frame>>,
}

impl Env {
    pub(crate) fn new(context: &Context) -> Self {
        Self {
            root: Scope::root(context),
            frame: None,
        }
    }

    /// Environment for the body of an arrow function. Missing arguments are
    /// null, extra arguments are ignored.
    pub(crate) fn with_frame(&self, names: &Arc<[String]>, args: &[EelValue]) -> Self {
        let values = (0..names.len())
            .map(|i| args.get(i).cloned().unwrap_or(EelValue::Null))
            .collect();
        Self {
            root: self.root.clone(),
            frame: Some(Arc::new(Frame {
                names: Arc::clone(names),
                values,
                parent: self.frame.clone(),
            })),
        }
    }

    fn local(&self, name: &str) -> Option<&EelValue> {
        let mut frame = self.frame.as_deref();
        while let Some(current) = frame {
            if let Some(i) = current.names.iter().position(|n| n == name) {
                return current.values.get(i);
            }
            frame = current.parent.as_deref();
        }
        None
    }

    /// A value with no call path in this environment
    pub(crate) fn value(&self, value: EelValue) -> Scope {
        self.root.derived(value)
    }

    /// Resolve a first-level identifier. Parameters shadow context names.
    pub(crate) fn lookup(&self, name: &str) -> Scope {
        match self.local(name) {
            Some(value) => self.root.derived(value.clone()),
            None => self.root.property(name),
        }
    }

    /// Call a first-level function. A parameter holding a function is
    /// called directly; anything else goes through the root scope.
    pub(crate) fn call_function(&self, name: &str, args: &[EelValue]) -> Result<Scope> {
        let result = match self.local(name) {
            Some(local) => match plain(local) {
                EelValue::Function(function) => function.call(args)?,
                other => {
                    return Err(EelError::evaluation_error(
                        EL0102,
                        format!("\"{name}\" is not callable, it is a {} value", other.type_name()),
                    ));
                }
            },
            None => self.root.call(name, args)?,
        };
        Ok(self.root.call_result(result))
    }
}

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Bounds nested arrow-function invocations on the current thread
pub(crate) struct CallDepthGuard(());

impl CallDepthGuard {
    pub(crate) fn enter(max_depth: usize) -> Result<Self> {
        CALL_DEPTH.with(|depth| {
            let next = depth.get() + 1;
            if next > max_depth {
                return Err(EelError::evaluation_error(
                    EL0105,
                    format!("Function calls nested deeper than {max_depth} levels"),
                ));
            }
            depth.set(next);
            Ok(CallDepthGuard(()))
        })
    }
}

impl Drop for CallDepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Reject expressions nested deeper than `max_depth`; operator and postfix
/// chains count once however long they are
pub(crate) fn check_nesting_depth(expression: &ExpressionNode, max_depth: usize) -> Result<()> {
    let depth = expression.nesting_depth();
    if depth > max_depth {
        return Err(EelError::evaluation_error(
            EL0105,
            format!("Expression nesting depth {depth} exceeds the limit of {max_depth}"),
        ));
    }
    Ok(())
}
