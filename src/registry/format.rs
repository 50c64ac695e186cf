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

//! `printf`-style formatting behind `String.format`
//!
//! Directives follow `%[argnum$][flags][width][.precision]specifier` with
//! the flags `-`, `+`, ` `, `0` and `'c` (pad with `c`) and the specifiers
//! `b c d e E f F o s u x X`. `%%` is a literal percent sign.

use super::string::{to_float, to_integer};
use crate::core::error_code::EL0106;
use crate::core::{EelError, Result};
use crate::model::EelValue;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Default)]
struct Directive {
    argnum: Option<usize>,
    left: bool,
    plus: bool,
    pad: Option<char>,
    width: usize,
    precision: Option<usize>,
}

fn format_error(message: impl Into<String>) -> EelError {
    EelError::evaluation_error(EL0106, message.into())
}

/// Format `template` with positional `args`
pub(crate) fn sprintf(template: &str, args: &[&EelValue]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_arg = 0;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let directive = parse_directive(&mut chars)?;
        let specifier = chars
            .next()
            .ok_or_else(|| format_error("String.format() template ends inside a directive"))?;
        let index = match directive.argnum {
            Some(argnum) => argnum - 1,
            None => {
                next_arg += 1;
                next_arg - 1
            }
        };
        let value = args.get(index).ok_or_else(|| {
            format_error(format!(
                "String.format() needs at least {} arguments, {} given",
                index + 1,
                args.len()
            ))
        })?;
        render(&mut out, &directive, specifier, value)?;
    }
    Ok(out)
}

fn digits(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut value: Option<usize> = None;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        chars.next();
        value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(digit as usize));
    }
    value
}

fn parse_directive(chars: &mut Peekable<Chars<'_>>) -> Result<Directive> {
    let mut directive = Directive::default();

    // `%2$s` names its argument; a bare number is a width
    let mut lookahead = chars.clone();
    if let Some(argnum) = digits(&mut lookahead) {
        if lookahead.peek() == Some(&'$') {
            if argnum == 0 {
                return Err(format_error("String.format() argument numbers start at 1"));
            }
            lookahead.next();
            *chars = lookahead;
            directive.argnum = Some(argnum);
        }
    }

    loop {
        match chars.peek() {
            Some('-') => directive.left = true,
            Some('+') => directive.plus = true,
            Some(' ') => directive.pad = Some(' '),
            Some('0') => directive.pad = Some('0'),
            Some('\'') => {
                chars.next();
                directive.pad = chars.next();
                continue;
            }
            _ => break,
        }
        chars.next();
    }

    directive.width = digits(chars).unwrap_or(0);
    if chars.peek() == Some(&'.') {
        chars.next();
        directive.precision = Some(digits(chars).unwrap_or(0));
    }
    Ok(directive)
}

fn int_of(value: &EelValue) -> i64 {
    match value {
        EelValue::Integer(i) => *i,
        EelValue::Float(f) => f.trunc() as i64,
        EelValue::String(s) => to_integer(s),
        other => i64::from(other.is_truthy()),
    }
}

fn float_of(value: &EelValue) -> f64 {
    match value {
        EelValue::Integer(i) => *i as f64,
        EelValue::Float(f) => *f,
        EelValue::String(s) => to_float(s),
        other => f64::from(u8::from(other.is_truthy())),
    }
}

/// `1.5e+3` style exponent notation
fn exponent(value: f64, precision: usize, upper: bool) -> String {
    let formatted = format!("{value:.precision$e}");
    let (mantissa, exp) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
    let sign = if exp.starts_with('-') { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{mantissa}{e}{sign}{}", exp.trim_start_matches('-'))
}

fn render(out: &mut String, directive: &Directive, specifier: char, value: &EelValue) -> Result<()> {
    let precision = directive.precision;
    let (body, numeric) = match specifier {
        's' => {
            let text = value.to_eel_string().map_err(|_| {
                format_error(format!(
                    "String.format() cannot format {} with %s",
                    value.type_name()
                ))
            })?;
            let text = match precision {
                Some(length) => text.chars().take(length).collect(),
                None => text,
            };
            (text, false)
        }
        'd' => {
            let n = int_of(value);
            let sign = if directive.plus && n >= 0 { "+" } else { "" };
            (format!("{sign}{n}"), true)
        }
        'u' => ((int_of(value) as u64).to_string(), true),
        'f' | 'F' => {
            let x = float_of(value);
            let precision = precision.unwrap_or(6);
            let sign = if directive.plus && x >= 0.0 { "+" } else { "" };
            (format!("{sign}{x:.precision$}"), true)
        }
        'e' | 'E' => {
            let x = float_of(value);
            let sign = if directive.plus && x >= 0.0 { "+" } else { "" };
            let body = exponent(x, precision.unwrap_or(6), specifier == 'E');
            (format!("{sign}{body}"), true)
        }
        'x' => (format!("{:x}", int_of(value) as u64), false),
        'X' => (format!("{:X}", int_of(value) as u64), false),
        'o' => (format!("{:o}", int_of(value) as u64), false),
        'b' => (format!("{:b}", int_of(value) as u64), false),
        'c' => {
            // A single character, never padded
            let code = int_of(value).rem_euclid(256) as u8;
            out.push(char::from(code));
            return Ok(());
        }
        other => {
            return Err(format_error(format!(
                "String.format() does not know the specifier '{other}'"
            )));
        }
    };

    let length = body.chars().count();
    if length >= directive.width {
        out.push_str(&body);
        return Ok(());
    }
    let fill = directive.width - length;
    let pad = directive.pad.unwrap_or(' ');

    if directive.left {
        out.push_str(&body);
        out.extend(std::iter::repeat_n(pad, fill));
    } else if pad == '0' && numeric && body.starts_with(['-', '+']) {
        // Zeros go between the sign and the digits
        let (sign, digits) = body.split_at(1);
        out.push_str(sign);
        out.extend(std::iter::repeat_n('0', fill));
        out.push_str(digits);
    } else {
        out.extend(std::iter::repeat_n(pad, fill));
        out.push_str(&body);
    }
    Ok(())
}
