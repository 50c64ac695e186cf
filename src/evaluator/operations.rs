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

//! Binary and unary operator semantics
//!
//! Shared by the interpreter, the virtual machine and the constant folder of
//! the compiler, so the three can never disagree on a result.

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::core::error_code::{EL0103, EL0104};
use crate::core::{EelError, Result};
use crate::model::EelValue;
use std::cmp::Ordering;

/// Strip context wrappers so operators see the plain value
#[inline]
pub(crate) fn plain(value: &EelValue) -> &EelValue {
    match value {
        EelValue::Context(ctx) => plain(ctx.value()),
        other => other,
    }
}

/// Numeric operand after coercion
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }

    pub(crate) fn into_value(self) -> EelValue {
        match self {
            Number::Int(i) => EelValue::Integer(i),
            Number::Float(f) => EelValue::Float(f),
        }
    }
}

/// Parse a numeric string (`"12"`, `" -1.5 "`, `"1e3"`). Words such as
/// `inf` or `NaN` are not numbers.
pub(crate) fn parse_numeric_str(text: &str) -> Option<Number> {
    let text = text.trim();
    if text.is_empty()
        || !text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
    {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::Int(i));
    }
    text.parse::<f64>().ok().map(Number::Float)
}

fn to_number(value: &EelValue, op: BinaryOperator) -> Result<Number> {
    match plain(value) {
        EelValue::Integer(i) => Ok(Number::Int(*i)),
        EelValue::Float(f) => Ok(Number::Float(*f)),
        EelValue::Null => Ok(Number::Int(0)),
        EelValue::Boolean(b) => Ok(Number::Int(i64::from(*b))),
        EelValue::String(s) => parse_numeric_str(s).ok_or_else(|| type_mismatch(op, value)),
        other => Err(type_mismatch(op, other)),
    }
}

fn type_mismatch(op: BinaryOperator, value: &EelValue) -> EelError {
    EelError::evaluation_error(
        EL0103,
        format!(
            "Operator '{op}' cannot be applied to {} value",
            plain(value).type_name()
        ),
    )
}

/// Arithmetic operators: `+ - * / %`
pub struct ArithmeticEvaluator;

impl ArithmeticEvaluator {
    /// `+` adds two numbers and concatenates anything else
    pub fn evaluate_addition(left: &EelValue, right: &EelValue) -> Result<EelValue> {
        let (l, r) = (plain(left), plain(right));
        if l.is_numeric() && r.is_numeric() {
            return Self::evaluate_numeric(BinaryOperator::Add, l, r);
        }
        let mut text = l.to_eel_string()?;
        text.push_str(&r.to_eel_string()?);
        Ok(EelValue::String(text))
    }

    pub fn evaluate_subtraction(left: &EelValue, right: &EelValue) -> Result<EelValue> {
        Self::evaluate_numeric(BinaryOperator::Subtract, left, right)
    }

    pub fn evaluate_multiplication(left: &EelValue, right: &EelValue) -> Result<EelValue> {
        Self::evaluate_numeric(BinaryOperator::Multiply, left, right)
    }

    /// Integer division stays integral when exact
    pub fn evaluate_division(left: &EelValue, right: &EelValue) -> Result<EelValue> {
        Self::evaluate_numeric(BinaryOperator::Divide, left, right)
    }

    pub fn evaluate_modulo(left: &EelValue, right: &EelValue) -> Result<EelValue> {
        Self::evaluate_numeric(BinaryOperator::Modulo, left, right)
    }

    fn evaluate_numeric(op: BinaryOperator, left: &EelValue, right: &EelValue) -> Result<EelValue> {
        let l = to_number(left, op)?;
        let r = to_number(right, op)?;

        if matches!(op, BinaryOperator::Divide | BinaryOperator::Modulo) && r.is_zero() {
            return Err(EelError::evaluation_error(
                EL0104,
                format!("Division by zero in '{op}'"),
            ));
        }

        let result = match (l, r) {
            (Number::Int(a), Number::Int(b)) => Self::integer_op(op, a, b),
            _ => Number::Float(Self::float_op(op, l.as_f64(), r.as_f64())),
        };
        Ok(result.into_value())
    }

    /// Integer arithmetic, promoting to float on overflow
    fn integer_op(op: BinaryOperator, a: i64, b: i64) -> Number {
        let checked = match op {
            BinaryOperator::Add => a.checked_add(b),
            BinaryOperator::Subtract => a.checked_sub(b),
            BinaryOperator::Multiply => a.checked_mul(b),
            BinaryOperator::Divide => match a.checked_rem(b) {
                Some(0) => a.checked_div(b),
                _ => None,
            },
            BinaryOperator::Modulo => a.checked_rem(b),
            _ => None,
        };
        checked
            .map(Number::Int)
            .unwrap_or_else(|| Number::Float(Self::float_op(op, a as f64, b as f64)))
    }

    fn float_op(op: BinaryOperator, a: f64, b: f64) -> f64 {
        match op {
            BinaryOperator::Add => a + b,
            BinaryOperator::Subtract => a - b,
            BinaryOperator::Multiply => a * b,
            BinaryOperator::Divide => a / b,
            BinaryOperator::Modulo => a % b,
            _ => f64::NAN,
        }
    }
}

/// Equality and relational operators
pub struct ComparisonEvaluator;

impl ComparisonEvaluator {
    /// Strict equality: same type and same value
    pub fn evaluate_equals(left: &EelValue, right: &EelValue) -> bool {
        left == right
    }

    /// Ordering used by `< <= > >=`; `None` when the values are unordered
    /// (NaN)
    pub fn compare(op: BinaryOperator, left: &EelValue, right: &EelValue) -> Result<Option<Ordering>> {
        let (l, r) = (plain(left), plain(right));
        let ordering = match (l, r) {
            (EelValue::Null | EelValue::Boolean(_), _) | (_, EelValue::Null | EelValue::Boolean(_)) => {
                Self::check_comparable(op, l)?;
                Self::check_comparable(op, r)?;
                Some(l.is_truthy().cmp(&r.is_truthy()))
            }
            (EelValue::Integer(a), EelValue::Integer(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (a, b) = (a.as_float().unwrap_or(f64::NAN), b.as_float().unwrap_or(f64::NAN));
                a.partial_cmp(&b)
            }
            (EelValue::String(a), EelValue::String(b)) => Some(a.cmp(b)),
            (number, EelValue::String(s)) if number.is_numeric() => {
                Self::compare_number_with_string(number, s)
            }
            (EelValue::String(s), number) if number.is_numeric() => {
                Self::compare_number_with_string(number, s).map(Ordering::reverse)
            }
            _ => {
                let offending = if Self::check_comparable(op, l).is_err() { l } else { r };
                return Err(type_mismatch(op, offending));
            }
        };
        Ok(ordering)
    }

    fn check_comparable(op: BinaryOperator, value: &EelValue) -> Result<()> {
        match value {
            EelValue::Map(_) | EelValue::Object(_) | EelValue::Function(_) => {
                Err(type_mismatch(op, value))
            }
            _ => Ok(()),
        }
    }

    fn compare_number_with_string(number: &EelValue, text: &str) -> Option<Ordering> {
        match parse_numeric_str(text) {
            Some(parsed) => {
                let n = number.as_float().unwrap_or(f64::NAN);
                n.partial_cmp(&parsed.as_f64())
            }
            None => {
                let formatted = number.to_eel_string().ok()?;
                Some(formatted.as_str().cmp(text))
            }
        }
    }

    pub fn evaluate_relational(op: BinaryOperator, left: &EelValue, right: &EelValue) -> Result<bool> {
        let ordering = Self::compare(op, left, right)?;
        Ok(match (op, ordering) {
            (_, None) => false,
            (BinaryOperator::LessThan, Some(o)) => o == Ordering::Less,
            (BinaryOperator::LessThanOrEqual, Some(o)) => o != Ordering::Greater,
            (BinaryOperator::GreaterThan, Some(o)) => o == Ordering::Greater,
            (BinaryOperator::GreaterThanOrEqual, Some(o)) => o != Ordering::Less,
            _ => false,
        })
    }
}

/// Truthiness based logical operators
pub struct LogicalEvaluator;

impl LogicalEvaluator {
    pub fn evaluate_not(operand: &EelValue) -> EelValue {
        EelValue::Boolean(!operand.is_truthy())
    }

    /// `&&` with both operands at hand: the first falsy operand or the last
    pub fn evaluate_and(left: &EelValue, right: &EelValue) -> EelValue {
        if left.is_truthy() { right.clone() } else { left.clone() }
    }

    /// `||` with both operands at hand: the first truthy operand or the last
    pub fn evaluate_or(left: &EelValue, right: &EelValue) -> EelValue {
        if left.is_truthy() { left.clone() } else { right.clone() }
    }
}

/// Apply a binary operator to two evaluated operands
pub fn evaluate_binary(op: BinaryOperator, left: &EelValue, right: &EelValue) -> Result<EelValue> {
    match op {
        BinaryOperator::Add => ArithmeticEvaluator::evaluate_addition(left, right),
        BinaryOperator::Subtract => ArithmeticEvaluator::evaluate_subtraction(left, right),
        BinaryOperator::Multiply => ArithmeticEvaluator::evaluate_multiplication(left, right),
        BinaryOperator::Divide => ArithmeticEvaluator::evaluate_division(left, right),
        BinaryOperator::Modulo => ArithmeticEvaluator::evaluate_modulo(left, right),
        BinaryOperator::Equal => Ok(EelValue::Boolean(ComparisonEvaluator::evaluate_equals(
            left, right,
        ))),
        BinaryOperator::NotEqual => Ok(EelValue::Boolean(!ComparisonEvaluator::evaluate_equals(
            left, right,
        ))),
        BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual => {
            ComparisonEvaluator::evaluate_relational(op, left, right).map(EelValue::Boolean)
        }
        BinaryOperator::And => Ok(LogicalEvaluator::evaluate_and(left, right)),
        BinaryOperator::Or => Ok(LogicalEvaluator::evaluate_or(left, right)),
    }
}

/// Apply a unary operator
pub fn evaluate_unary(op: UnaryOperator, operand: &EelValue) -> EelValue {
    match op {
        UnaryOperator::Not => LogicalEvaluator::evaluate_not(operand),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn binary(op: BinaryOperator, l: impl Into<EelValue>, r: impl Into<EelValue>) -> Result<EelValue> {
        evaluate_binary(op, &l.into(), &r.into())
    }

    #[rstest]
    #[case(EelValue::Integer(2), EelValue::Integer(3), EelValue::Integer(5))]
    #[case(EelValue::Float(1.5), EelValue::Integer(1), EelValue::Float(2.5))]
    #[case(EelValue::from("Foo"), EelValue::from("Bar"), EelValue::from("FooBar"))]
    #[case(EelValue::from("a"), EelValue::Integer(1), EelValue::from("a1"))]
    #[case(EelValue::Integer(1), EelValue::from("1"), EelValue::from("11"))]
    #[case(EelValue::Null, EelValue::Integer(1), EelValue::from("1"))]
    #[case(EelValue::Boolean(true), EelValue::from("!"), EelValue::from("true!"))]
    #[case(EelValue::Float(1.0), EelValue::from(""), EelValue::from("1"))]
    fn test_addition(#[case] l: EelValue, #[case] r: EelValue, #[case] expected: EelValue) {
        assert_eq!(binary(BinaryOperator::Add, l, r).unwrap(), expected);
    }

    #[test]
    fn test_integer_overflow_promotes_to_float() {
        let result = binary(BinaryOperator::Add, i64::MAX, 1i64).unwrap();
        assert!(matches!(result, EelValue::Float(_)));
        let result = binary(BinaryOperator::Multiply, i64::MAX, 2i64).unwrap();
        assert!(matches!(result, EelValue::Float(_)));
    }

    #[test]
    fn test_division() {
        assert_eq!(binary(BinaryOperator::Divide, 4i64, 2i64).unwrap(), EelValue::Integer(2));
        assert_eq!(binary(BinaryOperator::Divide, 5i64, 2i64).unwrap(), EelValue::Float(2.5));
        assert_eq!(binary(BinaryOperator::Modulo, 7i64, 3i64).unwrap(), EelValue::Integer(1));
        assert_eq!(binary(BinaryOperator::Modulo, 5.5, 2i64).unwrap(), EelValue::Float(1.5));

        for op in [BinaryOperator::Divide, BinaryOperator::Modulo] {
            let err = binary(op, 1i64, 0i64).unwrap_err();
            assert_eq!(err.error_code(), &EL0104);
            let err = binary(op, 1i64, 0.0).unwrap_err();
            assert_eq!(err.error_code(), &EL0104);
        }
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(binary(BinaryOperator::Subtract, "10", 4i64).unwrap(), EelValue::Integer(6));
        assert_eq!(binary(BinaryOperator::Multiply, true, 3i64).unwrap(), EelValue::Integer(3));
        assert_eq!(binary(BinaryOperator::Subtract, EelValue::Null, 2i64).unwrap(), EelValue::Integer(-2));
        assert_eq!(binary(BinaryOperator::Multiply, " 1.5", 2i64).unwrap(), EelValue::Float(3.0));

        let err = binary(BinaryOperator::Subtract, "abc", 1i64).unwrap_err();
        assert_eq!(err.error_code(), &EL0103);
        let err = binary(BinaryOperator::Multiply, EelValue::empty_map(), 1i64).unwrap_err();
        assert_eq!(err.error_code(), &EL0103);
        assert!(parse_numeric_str("inf").is_none());
        assert!(parse_numeric_str("NaN").is_none());
    }

    #[rstest]
    #[case(BinaryOperator::LessThan, EelValue::Integer(1), EelValue::Integer(2), true)]
    #[case(BinaryOperator::GreaterThan, EelValue::Float(2.5), EelValue::Integer(2), true)]
    #[case(BinaryOperator::LessThanOrEqual, EelValue::from("abc"), EelValue::from("abd"), true)]
    #[case(BinaryOperator::LessThan, EelValue::Boolean(false), EelValue::Boolean(true), true)]
    #[case(BinaryOperator::GreaterThan, EelValue::Null, EelValue::Integer(0), false)]
    #[case(BinaryOperator::GreaterThanOrEqual, EelValue::Null, EelValue::Integer(0), true)]
    #[case(BinaryOperator::LessThan, EelValue::Integer(5), EelValue::from("10"), true)]
    #[case(BinaryOperator::GreaterThan, EelValue::from("10"), EelValue::Integer(5), true)]
    #[case(BinaryOperator::LessThan, EelValue::Integer(5), EelValue::from("abc"), true)]
    #[case(BinaryOperator::GreaterThan, EelValue::Float(f64::NAN), EelValue::Integer(1), false)]
    fn test_relational(
        #[case] op: BinaryOperator,
        #[case] l: EelValue,
        #[case] r: EelValue,
        #[case] expected: bool,
    ) {
        assert_eq!(binary(op, l, r).unwrap(), EelValue::Boolean(expected));
    }

    #[test]
    fn test_relational_type_mismatch() {
        let err = binary(BinaryOperator::LessThan, EelValue::empty_map(), 1i64).unwrap_err();
        assert_eq!(err.error_code(), &EL0103);
        let err = binary(BinaryOperator::LessThan, EelValue::Null, EelValue::empty_map()).unwrap_err();
        assert_eq!(err.error_code(), &EL0103);
    }

    #[test]
    fn test_logic_returns_operands() {
        assert_eq!(binary(BinaryOperator::Or, EelValue::Null, "foo").unwrap(), EelValue::from("foo"));
        assert_eq!(binary(BinaryOperator::Or, 0i64, "").unwrap(), EelValue::from(""));
        assert_eq!(binary(BinaryOperator::And, "", false).unwrap(), EelValue::from(""));
        assert_eq!(binary(BinaryOperator::And, "Bar", 0i64).unwrap(), EelValue::Integer(0));
        assert_eq!(evaluate_unary(UnaryOperator::Not, &EelValue::from("0")), EelValue::Boolean(false));
    }
}
