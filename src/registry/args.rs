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

//! Argument extraction for helper methods

use crate::core::error_code::EL0106;
use crate::core::{EelError, Result};
use crate::evaluator::operations::{Number, parse_numeric_str, plain};
use crate::model::{EelFunction, EelMap, EelValue};
use std::sync::Arc;

static NULL: EelValue = EelValue::Null;

/// Positional arguments of one helper call
pub(crate) struct Args<'a> {
    helper: &'static str,
    method: &'a str,
    values: &'a [EelValue],
}

impl<'a> Args<'a> {
    pub(crate) fn new(helper: &'static str, method: &'a str, values: &'a [EelValue]) -> Self {
        Self {
            helper,
            method,
            values,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    /// Argument `index` without context wrappers; missing arguments are null
    pub(crate) fn get(&self, index: usize) -> &'a EelValue {
        match self.values.get(index) {
            Some(value) => plain(value),
            None => &NULL,
        }
    }

    /// Arguments from `index` on
    pub(crate) fn rest(&self, index: usize) -> impl Iterator<Item = &'a EelValue> + 'a {
        self.values.iter().skip(index).map(plain)
    }

    pub(crate) fn invalid(&self, index: usize, expected: &str) -> EelError {
        EelError::evaluation_error(
            EL0106,
            format!(
                "{}.{}() argument {} expects {expected}, got {}",
                self.helper,
                self.method,
                index + 1,
                self.get(index).type_name()
            ),
        )
    }

    /// String form of a scalar argument; null is the empty string
    pub(crate) fn string(&self, index: usize) -> Result<String> {
        self.get(index)
            .to_eel_string()
            .map_err(|_| self.invalid(index, "a string"))
    }

    pub(crate) fn opt_string(&self, index: usize) -> Result<Option<String>> {
        match self.get(index) {
            EelValue::Null => Ok(None),
            _ => self.string(index).map(Some),
        }
    }

    /// Numeric argument; strings must be numeric
    pub(crate) fn number(&self, index: usize) -> Result<Number> {
        to_number(self.get(index)).ok_or_else(|| self.invalid(index, "a number"))
    }

    pub(crate) fn int(&self, index: usize) -> Result<i64> {
        match self.get(index) {
            EelValue::Null => Err(self.invalid(index, "an integer")),
            _ => self.number(index).map(|n| match n {
                Number::Int(i) => i,
                Number::Float(f) => f.trunc() as i64,
            }),
        }
    }

    pub(crate) fn opt_int(&self, index: usize) -> Result<Option<i64>> {
        match self.get(index) {
            EelValue::Null => Ok(None),
            _ => self.int(index).map(Some),
        }
    }

    pub(crate) fn float(&self, index: usize) -> Result<f64> {
        self.number(index).map(Number::as_f64)
    }

    /// Numeric value, `None` when the argument is not numeric
    pub(crate) fn float_or_none(&self, index: usize) -> Option<f64> {
        to_number(self.get(index)).map(Number::as_f64)
    }

    pub(crate) fn truthy(&self, index: usize) -> bool {
        self.get(index).is_truthy()
    }

    /// Map or array argument
    pub(crate) fn map(&self, index: usize) -> Result<&'a Arc<EelMap>> {
        match self.get(index) {
            EelValue::Map(map) => Ok(map),
            _ => Err(self.invalid(index, "an array")),
        }
    }

    pub(crate) fn function(&self, index: usize) -> Result<&'a EelFunction> {
        match self.get(index) {
            EelValue::Function(function) => Ok(function),
            _ => Err(self.invalid(index, "a function")),
        }
    }

    pub(crate) fn opt_function(&self, index: usize) -> Result<Option<&'a EelFunction>> {
        match self.get(index) {
            EelValue::Null => Ok(None),
            _ => self.function(index).map(Some),
        }
    }
}

/// Loose numeric conversion used by helpers: null is 0, booleans are 0/1
pub(crate) fn to_number(value: &EelValue) -> Option<Number> {
    match plain(value) {
        EelValue::Integer(i) => Some(Number::Int(*i)),
        EelValue::Float(f) => Some(Number::Float(*f)),
        EelValue::Boolean(b) => Some(Number::Int(i64::from(*b))),
        EelValue::Null => Some(Number::Int(0)),
        EelValue::String(s) => parse_numeric_str(s),
        _ => None,
    }
}
