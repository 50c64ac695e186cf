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

//! Recognition of `${ ... }` wrapped expressions in template text
//!
//! A text is an expression only if the wrapper spans all of it: it starts
//! at the first character and its closing brace is the last one. Braces
//! inside quoted strings do not count, and quotes may contain backslash
//! escapes. Recognition is a single left-to-right scan.

/// The expression body of `text` if the whole text is a `${…}` wrapper
pub fn try_extract(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if !text.starts_with("${") {
        return None;
    }

    let mut depth = 1usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (i, &byte) in bytes.iter().enumerate().skip(2) {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == open {
                quote = None;
            }
            continue;
        }

        match byte {
            b'\'' | b'"' => quote = Some(byte),
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let body = &text[2..i];
                    let complete = i + 1 == bytes.len() && !body.trim().is_empty();
                    return complete.then_some(body);
                }
            }
            _ => {}
        }
    }
    None
}

/// Whether the whole of `text` is a `${…}` wrapped expression
pub fn is_expression(text: &str) -> bool {
    try_extract(text).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("${foo + bar}", "foo + bar")]
    #[case("${ foo }", " foo ")]
    #[case("${{a: 1}}", "{a: 1}")]
    #[case("${'}' + \"{\"}", "'}' + \"{\"")]
    #[case("${'it\\'s }'}", "'it\\'s }'")]
    #[case("${Array.map(x, y => {v: y})}", "Array.map(x, y => {v: y})")]
    fn test_extracts_wrapped_expressions(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(try_extract(text), Some(expected));
        assert!(is_expression(text));
    }

    #[rstest]
    #[case::leading_text("x${foo}")]
    #[case::leading_whitespace(" ${foo}")]
    #[case::trailing_whitespace("${foo} ")]
    #[case::trailing_text("${foo}bar")]
    #[case::two_wrappers("${foo} ${bar}")]
    #[case::unterminated("${foo")]
    #[case::unbalanced("${foo{}")]
    #[case::quoted_brace("${'}'")]
    #[case::empty("${}")]
    #[case::blank("${  }")]
    #[case::no_wrapper("foo + bar")]
    #[case::dollar_only("$")]
    #[case::empty_text("")]
    fn test_rejects(#[case] text: &str) {
        assert_eq!(try_extract(text), None);
        assert!(!is_expression(text));
    }

    #[test]
    fn test_long_malformed_input_is_linear() {
        let text = format!("${{{}", "{'".repeat(200_000));
        let start = std::time::Instant::now();
        assert!(!is_expression(&text));
        assert!(start.elapsed() < std::time::Duration::from_secs(1));

        let nested = format!("${{{}x{}}}", "{".repeat(50_000), "}".repeat(50_000));
        assert_eq!(try_extract(&nested).map(str::len), Some(100_001));
    }
}
