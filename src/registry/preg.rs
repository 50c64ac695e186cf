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

//! Delimited `/pattern/flags` regular expressions
//!
//! Patterns are written with a delimiter and trailing flags. The delimiter is
//! the first character of the pattern; bracket delimiters close with their
//! counterpart (`(…)`, `[…]`, `{…}`, `<…>`). Flags `i`, `m`, `s`, `x` and
//! `U` map to inline `regex` flags, `u` is accepted and ignored since
//! matching is always Unicode aware.

use crate::core::error_code::EL0107;
use crate::core::{EelError, Result};
use dashmap::DashMap;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

const MAX_CACHED_PATTERNS: usize = 256;

type PatternCache = DashMap<String, Arc<Regex>>;

static DELIMITED: Lazy<PatternCache> = Lazy::new(DashMap::new);
static PLAIN: Lazy<PatternCache> = Lazy::new(DashMap::new);

/// Compile a delimited pattern, reusing earlier compilations
pub(crate) fn compile(pattern: &str) -> Result<Arc<Regex>> {
    cached(&DELIMITED, pattern, || translate(pattern))
}

/// Compile a pattern already in `regex` syntax, reusing earlier compilations
pub(crate) fn compile_plain(pattern: &str) -> Result<Arc<Regex>> {
    cached(&PLAIN, pattern, || Ok(pattern.to_string()))
}

fn cached(
    patterns: &PatternCache,
    key: &str,
    source: impl FnOnce() -> Result<String>,
) -> Result<Arc<Regex>> {
    if let Some(regex) = patterns.get(key) {
        return Ok(Arc::clone(regex.value()));
    }

    let source = source()?;
    let regex = Regex::new(&source).map(Arc::new).map_err(|e| {
        EelError::evaluation_error(EL0107, format!("Invalid regular expression {key}: {e}"))
    })?;

    if patterns.len() >= MAX_CACHED_PATTERNS {
        debug!("regular expression cache full, clearing");
        patterns.clear();
    }
    patterns.insert(key.to_string(), Arc::clone(&regex));
    Ok(regex)
}

/// Translate `/body/flags` into `(?flags)body`
fn translate(pattern: &str) -> Result<String> {
    let invalid = |reason: &str| {
        EelError::evaluation_error(
            EL0107,
            format!("Invalid regular expression {pattern}: {reason}"),
        )
    };

    let trimmed = pattern.trim_start();
    let mut chars = trimmed.chars();
    let open = chars.next().ok_or_else(|| invalid("empty pattern"))?;
    if open.is_alphanumeric() || open == '\\' || open.is_whitespace() {
        return Err(invalid("delimiter must not be alphanumeric or backslash"));
    }
    let close = match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        other => other,
    };

    let rest = &trimmed[open.len_utf8()..];
    let end = rest
        .rfind(close)
        .ok_or_else(|| invalid("no ending delimiter"))?;
    let body = &rest[..end];
    let modifiers = &rest[end + close.len_utf8()..];

    let mut flags = String::new();
    for modifier in modifiers.chars() {
        match modifier {
            'i' | 'm' | 's' | 'x' | 'U' => {
                if !flags.contains(modifier) {
                    flags.push(modifier);
                }
            }
            'u' => {}
            '\n' | '\r' | ' ' => {}
            other => return Err(invalid(&format!("unknown modifier '{other}'"))),
        }
    }

    if flags.is_empty() {
        Ok(body.to_string())
    } else {
        Ok(format!("(?{flags}){body}"))
    }
}

/// Translate a replacement string using `$1`, `${1}` or `\1` group
/// references into `regex` replacement syntax. Other `$` signs are literal.
pub(crate) fn replacement(template: &str) -> String {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len() + 4);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '$' | '\\' => {
                let braced = c == '$' && chars.get(i + 1) == Some(&'{');
                let start = if braced { i + 2 } else { i + 1 };
                let digits = chars[start.min(chars.len())..]
                    .iter()
                    .take(2)
                    .take_while(|d| d.is_ascii_digit())
                    .count();
                let closed = !braced || chars.get(start + digits) == Some(&'}');

                if digits > 0 && closed {
                    let group: String = chars[start..start + digits].iter().collect();
                    out.push_str("${");
                    out.push_str(&group);
                    out.push('}');
                    i = start + digits + usize::from(braced);
                    continue;
                }
                if c == '$' {
                    out.push_str("$$");
                } else {
                    out.push(c);
                }
            }
            other => out.push(other),
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("/abc/", "abc")]
    #[case("/abc/i", "(?i)abc")]
    #[case("/a\\/b/ms", "(?ms)a\\/b")]
    #[case("#x#u", "x")]
    #[case("{a(b)}x", "(?x)a(b)")]
    #[case("~[0-9]+~U", "(?U)[0-9]+")]
    fn test_translate(#[case] pattern: &str, #[case] expected: &str) {
        assert_eq!(translate(pattern).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("/abc")]
    #[case("/abc/e")]
    #[case("/(unclosed/")]
    fn test_invalid_patterns(#[case] pattern: &str) {
        let err = compile(pattern).unwrap_err();
        assert_eq!(err.error_code(), &EL0107);
    }

    #[test]
    fn test_compiled_patterns_are_shared() {
        let first = compile("/[a-z]+/").unwrap();
        let second = compile("/[a-z]+/").unwrap();
        assert!(first.is_match("eel"));
        assert!(second.is_match("eel"));
    }

    #[rstest]
    #[case("$3.$2.$1", "${3}.${2}.${1}")]
    #[case("\\1-${2}", "${1}-${2}")]
    #[case("costs $ 5", "costs $$ 5")]
    #[case("${x}", "$${x}")]
    #[case("$12a", "${12}a")]
    fn test_replacement(#[case] template: &str, #[case] expected: &str) {
        assert_eq!(replacement(template), expected);
    }
}
