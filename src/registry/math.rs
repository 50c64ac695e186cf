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

//! The `Math` helper
//!
//! Functions follow the conventions of the JavaScript `Math` object:
//! non-numeric input yields `NaN` rather than an error.

use super::args::{Args, to_number};
use crate::core::Result;
use crate::evaluator::operations::Number;
use crate::model::{EelObject, EelValue};
use rand::Rng;
use std::f64::consts;

/// Mathematical constants and functions, exposed as `Math`
#[derive(Debug, Default, Clone, Copy)]
pub struct MathHelper;

impl EelObject for MathHelper {
    fn type_name(&self) -> &str {
        "Math"
    }

    fn resolve_property(&self, name: &str) -> Option<EelValue> {
        let value = match name {
            "E" => consts::E,
            "LN2" => consts::LN_2,
            "LN10" => consts::LN_10,
            "LOG2E" => consts::LOG2_E,
            "LOG10E" => consts::LOG10_E,
            "PI" => consts::PI,
            "SQRT1_2" => consts::FRAC_1_SQRT_2,
            "SQRT2" => consts::SQRT_2,
            _ => return None,
        };
        Some(EelValue::Float(value))
    }

    fn resolve_method(&self, name: &str, args: &[EelValue]) -> Option<Result<EelValue>> {
        let args = Args::new("Math", name, args);
        let result: Result<EelValue> = match name {
            "abs" => Ok(abs(&args)),
            "acos" => Ok(unary(&args, f64::acos)),
            "acosh" => Ok(unary(&args, f64::acosh)),
            "asin" => Ok(unary(&args, f64::asin)),
            "asinh" => Ok(unary(&args, f64::asinh)),
            "atan" => Ok(unary(&args, f64::atan)),
            "atanh" => Ok(unary(&args, f64::atanh)),
            "atan2" => Ok(binary(&args, f64::atan2)),
            "cbrt" => Ok(unary(&args, f64::cbrt)),
            "ceil" => Ok(unary(&args, f64::ceil)),
            "cos" => Ok(unary(&args, f64::cos)),
            "cosh" => Ok(unary(&args, f64::cosh)),
            "exp" => Ok(unary(&args, f64::exp)),
            "expm1" => Ok(unary(&args, f64::exp_m1)),
            "floor" => Ok(unary(&args, f64::floor)),
            "isFinite" => Ok(args.float_or_none(0).is_some_and(f64::is_finite).into()),
            "isInfinite" => Ok(args.float_or_none(0).is_some_and(f64::is_infinite).into()),
            "isNaN" => Ok(args.float_or_none(0).is_none_or(f64::is_nan).into()),
            "hypot" => Ok(hypot(&args)),
            "log" => Ok(unary(&args, f64::ln)),
            "log1p" => Ok(unary(&args, f64::ln_1p)),
            "log10" => Ok(unary(&args, f64::log10)),
            "log2" => Ok(unary(&args, f64::log2)),
            "max" => Ok(extreme(&args, f64::NEG_INFINITY, |a, b| a > b)),
            "min" => Ok(extreme(&args, f64::INFINITY, |a, b| a < b)),
            "pow" => Ok(pow(&args)),
            "random" => Ok(EelValue::Float(rand::thread_rng().r#gen::<f64>())),
            "randomInt" => random_int(&args),
            "round" => round(&args),
            "sign" => Ok(sign(&args)),
            "sin" => Ok(unary(&args, f64::sin)),
            "sinh" => Ok(unary(&args, f64::sinh)),
            "sqrt" => Ok(unary(&args, f64::sqrt)),
            "tan" => Ok(unary(&args, f64::tan)),
            "tanh" => Ok(unary(&args, f64::tanh)),
            "trunc" => Ok(unary(&args, f64::trunc)),
            _ => return None,
        };
        Some(result)
    }

    fn allows_call_of_method(&self, _name: &str) -> bool {
        true
    }
}

fn unary(args: &Args, f: fn(f64) -> f64) -> EelValue {
    EelValue::Float(args.float_or_none(0).map_or(f64::NAN, f))
}

fn binary(args: &Args, f: fn(f64, f64) -> f64) -> EelValue {
    match (args.float_or_none(0), args.float_or_none(1)) {
        (Some(a), Some(b)) => EelValue::Float(f(a, b)),
        _ => EelValue::Float(f64::NAN),
    }
}

fn abs(args: &Args) -> EelValue {
    match to_number(args.get(0)) {
        Some(Number::Int(i)) => i
            .checked_abs()
            .map_or(EelValue::Float((i as f64).abs()), EelValue::Integer),
        Some(Number::Float(f)) => EelValue::Float(f.abs()),
        None => EelValue::Float(f64::NAN),
    }
}

fn hypot(args: &Args) -> EelValue {
    let mut sum = 0.0;
    for value in args.rest(0) {
        match to_number(value) {
            Some(n) => sum += n.as_f64().powi(2),
            None => return EelValue::Float(f64::NAN),
        }
    }
    EelValue::Float(sum.sqrt())
}

/// The operand `wins` prefers over every other; a single array argument is
/// searched element-wise. Without operands the `empty` value is returned.
fn extreme(args: &Args, empty: f64, wins: fn(f64, f64) -> bool) -> EelValue {
    let values: Vec<&EelValue> = match (args.len(), args.get(0)) {
        (1, EelValue::Map(array)) => array.values().collect(),
        _ => args.rest(0).collect(),
    };

    let mut best: Option<Number> = None;
    for value in values {
        let Some(number) = to_number(value) else {
            return EelValue::Float(f64::NAN);
        };
        if number.as_f64().is_nan() {
            return EelValue::Float(f64::NAN);
        }
        if best.is_none_or(|current| wins(number.as_f64(), current.as_f64())) {
            best = Some(number);
        }
    }
    best.map_or(EelValue::Float(empty), Number::into_value)
}

fn pow(args: &Args) -> EelValue {
    match (to_number(args.get(0)), to_number(args.get(1))) {
        (Some(Number::Int(base)), Some(Number::Int(exponent))) if exponent >= 0 => {
            u32::try_from(exponent)
                .ok()
                .and_then(|e| base.checked_pow(e))
                .map_or_else(
                    || EelValue::Float((base as f64).powf(exponent as f64)),
                    EelValue::Integer,
                )
        }
        (Some(base), Some(exponent)) => EelValue::Float(base.as_f64().powf(exponent.as_f64())),
        _ => EelValue::Float(f64::NAN),
    }
}

fn random_int(args: &Args) -> Result<EelValue> {
    let (a, b) = (args.int(0)?, args.int(1)?);
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    Ok(EelValue::Integer(rand::thread_rng().gen_range(low..=high)))
}

/// Round half away from zero to `precision` decimal digits
fn round(args: &Args) -> Result<EelValue> {
    let Some(subject) = args.float_or_none(0) else {
        return Ok(EelValue::Float(f64::NAN));
    };
    let precision = match args.get(1) {
        EelValue::Null => 0,
        EelValue::Integer(p) => *p,
        _ => return Ok(EelValue::Float(f64::NAN)),
    };
    if precision == 0 {
        return Ok(EelValue::Float(subject.round()));
    }

    let exponent = i32::try_from(precision.clamp(-308, 308)).unwrap_or(0);
    let factor = 10f64.powi(exponent.abs());
    if exponent < 0 {
        return Ok(EelValue::Float((subject / factor).round() * factor));
    }
    let scaled = subject * factor;
    if !scaled.is_finite() {
        return Ok(EelValue::Float(subject));
    }
    Ok(EelValue::Float(scaled.round() / factor))
}

fn sign(args: &Args) -> EelValue {
    let number = match args.get(0) {
        EelValue::Null => None,
        value => to_number(value),
    };
    match number.map(Number::as_f64) {
        Some(x) if x < 0.0 => EelValue::Integer(-1),
        Some(x) if x > 0.0 => EelValue::Integer(1),
        Some(x) if x == 0.0 => EelValue::Integer(0),
        _ => EelValue::Float(f64::NAN),
    }
}
