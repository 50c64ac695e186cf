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

//! Value types for Eel expressions

use super::context::Context;
use super::object::{EelFunction, EelObject};
use crate::core::error_code::EL0103;
use crate::core::{EelError, Result};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Key of an ordered map. Arrays are maps with integer keys `0..n`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Int(i64),
    Str(String),
}

impl MapKey {
    /// Build a key from text, normalising canonical integers (`"1"`, `"-3"`)
    /// to integer keys
    pub fn from_text(text: &str) -> Self {
        match canonical_int(text) {
            Some(i) => MapKey::Int(i),
            None => MapKey::Str(text.to_string()),
        }
    }

    /// Build a key from an arbitrary value; `None` for values that cannot
    /// address a map entry
    pub fn from_value(value: &EelValue) -> Option<Self> {
        match value {
            EelValue::Integer(i) => Some(MapKey::Int(*i)),
            EelValue::Float(f) if f.is_finite() => Some(MapKey::Int(f.trunc() as i64)),
            EelValue::Boolean(b) => Some(MapKey::Int(i64::from(*b))),
            EelValue::String(s) => Some(MapKey::from_text(s)),
            EelValue::Context(ctx) => MapKey::from_value(ctx.value()),
            _ => None,
        }
    }

    /// The key as an expression value
    pub fn to_value(&self) -> EelValue {
        match self {
            MapKey::Int(i) => EelValue::Integer(*i),
            MapKey::Str(s) => EelValue::String(s.clone()),
        }
    }
}

fn canonical_int(text: &str) -> Option<i64> {
    let parsed = text.parse::<i64>().ok()?;
    (parsed.to_string() == text).then_some(parsed)
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Int(i) => write!(f, "{i}"),
            MapKey::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for MapKey {
    fn from(value: &str) -> Self {
        MapKey::from_text(value)
    }
}

impl From<String> for MapKey {
    fn from(value: String) -> Self {
        match canonical_int(&value) {
            Some(i) => MapKey::Int(i),
            None => MapKey::Str(value),
        }
    }
}

impl From<i64> for MapKey {
    fn from(value: i64) -> Self {
        MapKey::Int(value)
    }
}

impl From<usize> for MapKey {
    fn from(value: usize) -> Self {
        MapKey::Int(value as i64)
    }
}

/// Insertion-ordered map of expression values
pub type EelMap = IndexMap<MapKey, EelValue>;

/// A value produced or consumed by an expression
#[derive(Clone)]
pub enum EelValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Ordered map; arrays are maps keyed `0..n`
    Map(Arc<EelMap>),
    /// Opaque host object
    Object(Arc<dyn EelObject>),
    /// Native function or arrow-function closure
    Function(EelFunction),
    /// A nested (possibly protected) context
    Context(Arc<Context>),
}

impl EelValue {
    pub fn map(map: EelMap) -> Self {
        EelValue::Map(Arc::new(map))
    }

    pub fn empty_map() -> Self {
        EelValue::Map(Arc::new(EelMap::new()))
    }

    /// Build an array (integer keys `0..n`)
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = EelValue>,
    {
        let map: EelMap = items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (MapKey::Int(i as i64), v))
            .collect();
        EelValue::map(map)
    }

    pub fn object<O: EelObject + 'static>(object: O) -> Self {
        EelValue::Object(Arc::new(object))
    }

    pub fn function<F>(func: F) -> Self
    where
        F: Fn(&[EelValue]) -> Result<EelValue> + Send + Sync + 'static,
    {
        EelValue::Function(EelFunction::new(func))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            EelValue::Null => "null",
            EelValue::Boolean(_) => "boolean",
            EelValue::Integer(_) => "integer",
            EelValue::Float(_) => "float",
            EelValue::String(_) => "string",
            EelValue::Map(_) => "map",
            EelValue::Object(_) => "object",
            EelValue::Function(_) => "function",
            EelValue::Context(_) => "context",
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            EelValue::Null => true,
            EelValue::Context(ctx) => ctx.value().is_null(),
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, EelValue::Integer(_) | EelValue::Float(_))
    }

    /// JavaScript-style truthiness: null, false, 0, 0.0, "" and empty maps
    /// are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            EelValue::Null => false,
            EelValue::Boolean(b) => *b,
            EelValue::Integer(i) => *i != 0,
            EelValue::Float(f) => *f != 0.0,
            EelValue::String(s) => !s.is_empty(),
            EelValue::Map(m) => !m.is_empty(),
            EelValue::Object(_) | EelValue::Function(_) => true,
            EelValue::Context(ctx) => ctx.value().is_truthy(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EelValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EelValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            EelValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value as a float (integers are widened)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            EelValue::Integer(i) => Some(*i as f64),
            EelValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&EelMap> {
        match self {
            EelValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&EelFunction> {
        match self {
            EelValue::Function(f) => Some(f),
            _ => None,
        }
    }

    /// True for maps whose keys are exactly `0..n` in order
    pub fn is_list(&self) -> bool {
        match self {
            EelValue::Map(m) => m
                .keys()
                .enumerate()
                .all(|(i, k)| *k == MapKey::Int(i as i64)),
            _ => false,
        }
    }

    /// String coercion used by `+` concatenation
    pub fn to_eel_string(&self) -> Result<String> {
        match self {
            EelValue::Null => Ok(String::new()),
            EelValue::Boolean(b) => Ok(b.to_string()),
            EelValue::Integer(i) => Ok(i.to_string()),
            EelValue::Float(f) => Ok(format_float(*f)),
            EelValue::String(s) => Ok(s.clone()),
            EelValue::Context(ctx) => ctx.value().to_eel_string(),
            other => Err(EelError::evaluation_error(
                EL0103,
                format!("Cannot convert {} to string", other.type_name()),
            )),
        }
    }

    /// Recursively strip every context wrapper from this value and any
    /// contained maps. Values without nested contexts are returned as is.
    pub fn unwrapped(&self) -> EelValue {
        match self {
            EelValue::Context(ctx) => ctx.value().unwrapped(),
            EelValue::Map(m) if m.values().any(EelValue::contains_context) => EelValue::map(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.unwrapped()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn contains_context(&self) -> bool {
        match self {
            EelValue::Context(_) => true,
            EelValue::Map(m) => m.values().any(EelValue::contains_context),
            _ => false,
        }
    }

    /// Convert to JSON. Lists become arrays, other maps objects; objects,
    /// functions and non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            EelValue::Null => Json::Null,
            EelValue::Boolean(b) => Json::Bool(*b),
            EelValue::Integer(i) => Json::from(*i),
            EelValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            EelValue::String(s) => Json::String(s.clone()),
            EelValue::Map(m) => {
                if self.is_list() {
                    Json::Array(m.values().map(EelValue::to_json).collect())
                } else {
                    Json::Object(
                        m.iter()
                            .map(|(k, v)| (k.to_string(), v.to_json()))
                            .collect(),
                    )
                }
            }
            EelValue::Object(_) | EelValue::Function(_) => Json::Null,
            EelValue::Context(ctx) => ctx.value().to_json(),
        }
    }
}

/// Natural string form of a float: integral values print without a fraction
pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Strict equality: same type and same value
impl PartialEq for EelValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EelValue::Context(a), _) => a.value() == other,
            (_, EelValue::Context(b)) => self == b.value(),
            (EelValue::Null, EelValue::Null) => true,
            (EelValue::Boolean(a), EelValue::Boolean(b)) => a == b,
            (EelValue::Integer(a), EelValue::Integer(b)) => a == b,
            (EelValue::Float(a), EelValue::Float(b)) => a == b,
            (EelValue::String(a), EelValue::String(b)) => a == b,
            (EelValue::Map(a), EelValue::Map(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.len() == b.len()
                        && a.iter()
                            .zip(b.iter())
                            .all(|((ka, va), (kb, vb))| ka == kb && va == vb))
            }
            (EelValue::Object(a), EelValue::Object(b)) => Arc::ptr_eq(a, b),
            (EelValue::Function(a), EelValue::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for EelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EelValue::Null => write!(f, "Null"),
            EelValue::Boolean(b) => write!(f, "Boolean({b})"),
            EelValue::Integer(i) => write!(f, "Integer({i})"),
            EelValue::Float(x) => write!(f, "Float({x:?})"),
            EelValue::String(s) => write!(f, "String({s:?})"),
            EelValue::Map(m) => f.debug_map().entries(m.iter()).finish(),
            EelValue::Object(o) => write!(f, "{o:?}"),
            EelValue::Function(func) => write!(f, "{func:?}"),
            EelValue::Context(ctx) => write!(f, "{ctx:?}"),
        }
    }
}

impl fmt::Display for EelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EelValue::Map(_) => write!(f, "{}", self.to_json()),
            EelValue::Object(o) => write!(f, "[object {}]", o.type_name()),
            EelValue::Function(_) => write!(f, "[function]"),
            EelValue::Context(ctx) => write!(f, "{}", ctx.value()),
            other => match other.to_eel_string() {
                Ok(s) => write!(f, "{s}"),
                Err(_) => write!(f, "{}", other.type_name()),
            },
        }
    }
}

impl Serialize for EelValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl Default for EelValue {
    fn default() -> Self {
        EelValue::Null
    }
}

impl From<bool> for EelValue {
    fn from(value: bool) -> Self {
        EelValue::Boolean(value)
    }
}

impl From<i64> for EelValue {
    fn from(value: i64) -> Self {
        EelValue::Integer(value)
    }
}

impl From<i32> for EelValue {
    fn from(value: i32) -> Self {
        EelValue::Integer(i64::from(value))
    }
}

impl From<usize> for EelValue {
    fn from(value: usize) -> Self {
        i64::try_from(value)
            .map(EelValue::Integer)
            .unwrap_or(EelValue::Float(value as f64))
    }
}

impl From<f64> for EelValue {
    fn from(value: f64) -> Self {
        EelValue::Float(value)
    }
}

impl From<&str> for EelValue {
    fn from(value: &str) -> Self {
        EelValue::String(value.to_string())
    }
}

impl From<String> for EelValue {
    fn from(value: String) -> Self {
        EelValue::String(value)
    }
}

impl<T: Into<EelValue>> From<Option<T>> for EelValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(EelValue::Null)
    }
}

impl<T: Into<EelValue>> From<Vec<T>> for EelValue {
    fn from(value: Vec<T>) -> Self {
        EelValue::list(value.into_iter().map(Into::into))
    }
}

impl From<EelMap> for EelValue {
    fn from(value: EelMap) -> Self {
        EelValue::map(value)
    }
}

impl From<EelFunction> for EelValue {
    fn from(value: EelFunction) -> Self {
        EelValue::Function(value)
    }
}

impl From<Arc<dyn EelObject>> for EelValue {
    fn from(value: Arc<dyn EelObject>) -> Self {
        EelValue::Object(value)
    }
}

impl From<Context> for EelValue {
    fn from(value: Context) -> Self {
        EelValue::Context(Arc::new(value))
    }
}

impl<K: Into<MapKey>, V: Into<EelValue>> FromIterator<(K, V)> for EelValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        EelValue::map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<serde_json::Value> for EelValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Json::Null => EelValue::Null,
            Json::Bool(b) => EelValue::Boolean(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => EelValue::Integer(i),
                None => EelValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => EelValue::String(s),
            Json::Array(items) => EelValue::list(items.into_iter().map(EelValue::from)),
            Json::Object(obj) => obj
                .into_iter()
                .map(|(k, v)| (MapKey::from(k), EelValue::from(v)))
                .collect(),
        }
    }
}

impl From<&EelValue> for serde_json::Value {
    fn from(value: &EelValue) -> Self {
        value.to_json()
    }
}
