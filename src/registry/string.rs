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

//! The `String` helper
//!
//! Positions and lengths are counted in Unicode scalar values, never bytes.

use super::args::Args;
use super::{format, preg};
use crate::core::Result;
use crate::evaluator::operations::plain;
use crate::model::{EelObject, EelValue};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use md5::Md5;
use rustc_hash::FxHashSet;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// String manipulation functions, exposed as `String`
#[derive(Debug, Default, Clone, Copy)]
pub struct StringHelper;

impl EelObject for StringHelper {
    fn type_name(&self) -> &str {
        "String"
    }

    fn resolve_method(&self, name: &str, args: &[EelValue]) -> Option<Result<EelValue>> {
        let args = Args::new("String", name, args);
        let result: Result<EelValue> = match name {
            "substr" => substr(&args),
            "substring" => substring(&args),
            "charAt" => char_at(&args),
            "endsWith" => ends_with(&args),
            "startsWith" => starts_with(&args),
            "indexOf" => index_of(&args),
            "lastIndexOf" => last_index_of(&args),
            "pregMatch" => preg_match(&args),
            "pregMatchAll" => preg_match_all(&args),
            "pregReplace" => preg_replace(&args),
            "pregSplit" => preg_split(&args),
            "replace" => replace(&args),
            "split" => split(&args),
            "toLowerCase" => args.string(0).map(|s| s.to_lowercase().into()),
            "toUpperCase" => args.string(0).map(|s| s.to_uppercase().into()),
            "firstLetterToUpperCase" => {
                args.string(0).map(|s| map_first(&s, char::to_uppercase).into())
            }
            "firstLetterToLowerCase" => {
                args.string(0).map(|s| map_first(&s, char::to_lowercase).into())
            }
            "stripTags" => strip_tags(&args),
            "nl2br" => args.string(0).map(|s| nl2br(&s).into()),
            "isBlank" => args.string(0).map(|s| s.trim().is_empty().into()),
            "trim" => trim(&args),
            "toString" => args.string(0).map(EelValue::from),
            "toInteger" => args.string(0).map(|s| to_integer(&s).into()),
            "toFloat" => args.string(0).map(|s| to_float(&s).into()),
            "toBoolean" => args
                .string(0)
                .map(|s| (s.to_lowercase() == "true" || to_integer(&s) == 1).into()),
            "rawUrlEncode" => args.string(0).map(|s| raw_url_encode(&s).into()),
            "rawUrlDecode" => args.string(0).map(|s| raw_url_decode(&s).into()),
            "htmlSpecialChars" => html_special_chars(&args),
            "crop" => crop(&args, Boundary::Character),
            "cropAtWord" => crop(&args, Boundary::Word),
            "cropAtSentence" => crop(&args, Boundary::Sentence),
            "length" => args.string(0).map(|s| s.chars().count().into()),
            "wordCount" => args.string(0).map(|s| word_count(&s).into()),
            "base64encode" => args.string(0).map(|s| BASE64.encode(s).into()),
            "base64decode" => args.string(0).map(|s| match BASE64.decode(s.as_bytes()) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned().into(),
                Err(_) => EelValue::Boolean(false),
            }),
            "md5" => args.string(0).map(|s| hex::encode(Md5::digest(s.as_bytes())).into()),
            "sha1" => args.string(0).map(|s| hex::encode(Sha1::digest(s.as_bytes())).into()),
            "sha256" => args
                .string(0)
                .map(|s| hex::encode(Sha256::digest(s.as_bytes())).into()),
            "chr" => chr(&args),
            "ord" => args
                .string(0)
                .map(|s| i64::from(s.bytes().next().unwrap_or(0)).into()),
            "format" => format_values(&args),
            _ => return None,
        };
        Some(result)
    }

    fn allows_call_of_method(&self, _name: &str) -> bool {
        true
    }
}

/// `length` characters starting at character `start`
fn chars_slice(text: &str, start: usize, length: usize) -> String {
    text.chars().skip(start).take(length).collect()
}

fn clamp(value: i64) -> usize {
    usize::try_from(value.max(0)).unwrap_or(usize::MAX)
}

fn substr(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let start = args.int(1)?;
    let length = args.opt_int(2)?;

    let count = text.chars().count() as i64;
    let start = if start < 0 { (count + start).max(0) } else { start };
    let length = length.map_or(usize::MAX, clamp);
    Ok(chars_slice(&text, clamp(start), length).into())
}

fn substring(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let mut start = clamp(args.int(1)?);
    let mut end = args
        .opt_int(2)?
        .map_or_else(|| text.chars().count(), clamp);
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }
    Ok(chars_slice(&text, start, end - start).into())
}

fn char_at(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let index = args.int(1)?;
    if index < 0 {
        return Ok(EelValue::from(""));
    }
    Ok(chars_slice(&text, clamp(index), 1).into())
}

fn ends_with(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let search = args.string(1)?;
    let head = match args.opt_int(2)? {
        Some(position) => chars_slice(&text, 0, clamp(position)),
        None => text,
    };
    Ok(head.ends_with(&search).into())
}

fn starts_with(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let search = args.string(1)?;
    let position = clamp(args.opt_int(2)?.unwrap_or(0));
    let tail = chars_slice(&text, position, usize::MAX);
    Ok(tail.starts_with(&search).into())
}

/// Character index of the first occurrence of `needle` in `haystack` at or
/// after character `from`
fn find_chars(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let byte_start = haystack.char_indices().nth(from).map(|(i, _)| i)?;
    haystack[byte_start..]
        .find(needle)
        .map(|byte| from + haystack[byte_start..byte_start + byte].chars().count())
}

fn index_of(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let search = args.string(1)?;
    let from = clamp(args.opt_int(2)?.unwrap_or(0));
    let count = text.chars().count();

    if search.is_empty() {
        return Ok(count.min(from).into());
    }
    Ok(find_chars(&text, &search, from)
        .map_or(EelValue::Integer(-1), EelValue::from))
}

fn last_index_of(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let search = args.string(1)?;
    let count = text.chars().count();
    let to = args.opt_int(2)?.map_or(count, clamp);

    if search.is_empty() {
        return Ok(count.min(to).into());
    }
    let head = chars_slice(&text, 0, to);
    Ok(head
        .rfind(&search)
        .map_or(EelValue::Integer(-1), |byte| {
            head[..byte].chars().count().into()
        }))
}

fn preg_match(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let regex = preg::compile(&args.string(1)?)?;

    let Some(captures) = regex.captures(&text) else {
        return Ok(EelValue::Null);
    };
    let matched = (0..captures.len())
        .rev()
        .find(|&i| captures.get(i).is_some())
        .unwrap_or(0);
    Ok(EelValue::list((0..=matched).map(|i| {
        EelValue::from(captures.get(i).map_or("", |m| m.as_str()))
    })))
}

fn preg_match_all(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let regex = preg::compile(&args.string(1)?)?;

    let mut groups: Vec<Vec<EelValue>> = vec![Vec::new(); regex.captures_len()];
    for captures in regex.captures_iter(&text) {
        for (i, group) in groups.iter_mut().enumerate() {
            group.push(EelValue::from(captures.get(i).map_or("", |m| m.as_str())));
        }
    }

    if groups.first().is_none_or(Vec::is_empty) {
        return Ok(EelValue::Null);
    }
    Ok(EelValue::list(groups.into_iter().map(EelValue::list)))
}

/// Negative or missing limits mean no limit
fn limit(args: &Args, index: usize) -> Result<Option<usize>> {
    Ok(args
        .opt_int(index)?
        .filter(|&limit| limit > 0)
        .map(clamp))
}

fn preg_replace(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let regex = preg::compile(&args.string(1)?)?;
    let replacement = preg::replacement(&args.string(2)?);
    let limit = limit(args, 3)?.unwrap_or(0);
    Ok(regex
        .replacen(&text, limit, replacement.as_str())
        .into_owned()
        .into())
}

fn preg_split(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let regex = preg::compile(&args.string(1)?)?;
    let parts: Vec<&str> = match limit(args, 2)? {
        Some(limit) => regex.splitn(&text, limit).collect(),
        None => regex.split(&text).collect(),
    };
    Ok(parts.into())
}

fn replace(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let search = args.string(1)?;
    let replacement = args.string(2)?;
    if search.is_empty() {
        return Ok(text.into());
    }
    Ok(text.replace(&search, &replacement).into())
}

fn split(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let Some(separator) = args.opt_string(1)? else {
        return Ok(EelValue::list([EelValue::from(text)]));
    };
    let limit = args.opt_int(2)?;

    if separator.is_empty() {
        let chars = text.chars().map(|c| EelValue::from(c.to_string()));
        return Ok(match limit {
            Some(limit) => EelValue::list(chars.take(clamp(limit))),
            None => EelValue::list(chars),
        });
    }

    let parts: Vec<&str> = match limit {
        None => text.split(separator.as_str()).collect(),
        Some(limit) if limit > 0 => text.splitn(clamp(limit), separator.as_str()).collect(),
        Some(0) => vec![text.as_str()],
        Some(limit) => {
            let mut parts: Vec<&str> = text.split(separator.as_str()).collect();
            parts.truncate(parts.len().saturating_sub(clamp(-limit)));
            parts
        }
    };
    Ok(parts.into())
}

fn map_first<I>(text: &str, convert: impl Fn(char) -> I) -> String
where
    I: Iterator<Item = char>,
{
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => convert(first).chain(chars).collect(),
        None => String::new(),
    }
}

fn strip_tags(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let allowed: FxHashSet<String> = match args.opt_string(1)? {
        Some(tags) => preg::compile_plain(r"<\s*([A-Za-z][A-Za-z0-9]*)\s*/?>")?
            .captures_iter(&tags)
            .map(|c| c[1].to_lowercase())
            .collect(),
        None => FxHashSet::default(),
    };

    let without_comments = preg::compile_plain(r"(?s)<!--.*?-->")?.replace_all(&text, "");
    let tags = preg::compile_plain(r"</?\s*([A-Za-z][A-Za-z0-9]*)\b[^>]*>|<[!?/][^>]*>")?;
    Ok(tags
        .replace_all(&without_comments, |captures: &regex::Captures| {
            match captures.get(1) {
                Some(name) if allowed.contains(&name.as_str().to_lowercase()) => {
                    captures[0].to_string()
                }
                _ => String::new(),
            }
        })
        .into_owned()
        .into())
}

/// Insert `<br />` before every line break (`\r\n`, `\n\r`, `\n` or `\r`)
fn nl2br(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\n' || c == '\r' {
            out.push_str("<br />");
            out.push(c);
            if let Some(&next) = chars.peek() {
                if (next == '\n' || next == '\r') && next != c {
                    out.push(next);
                    chars.next();
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn trim(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let trimmed = match args.opt_string(1)? {
        Some(charlist) => {
            let set: Vec<char> = charlist.chars().collect();
            text.trim_matches(|c| set.contains(&c)).to_string()
        }
        None => text
            .trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0B'))
            .to_string(),
    };
    Ok(trimmed.into())
}

/// Length in bytes of the leading decimal number of `text` (after
/// whitespace), and whether it carries a fraction or exponent
fn numeric_prefix(text: &str) -> (&str, bool) {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let digits = |from: usize| {
        bytes[from.min(bytes.len())..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let integral = digits(end);
    end += integral;
    let mut fractional = false;

    if bytes.get(end) == Some(&b'.') && (integral > 0 || digits(end + 1) > 0) {
        end += 1 + digits(end + 1);
        fractional = true;
    }
    if integral == 0 && !fractional {
        return ("", false);
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exponent = digits(end + 1 + sign);
        if exponent > 0 {
            end += 1 + sign + exponent;
            fractional = true;
        }
    }
    (&text[..end], fractional)
}

/// Integer value of the leading number of `text`, `0` if there is none
pub(crate) fn to_integer(text: &str) -> i64 {
    match numeric_prefix(text) {
        ("", _) => 0,
        (prefix, false) => prefix
            .parse::<i64>()
            .unwrap_or_else(|_| if prefix.starts_with('-') { i64::MIN } else { i64::MAX }),
        (prefix, true) => {
            let value = prefix.parse::<f64>().unwrap_or(0.0);
            if value.is_finite() { value.trunc() as i64 } else { 0 }
        }
    }
}

/// Float value of the leading number of `text`, `0.0` if there is none
pub(crate) fn to_float(text: &str) -> f64 {
    match numeric_prefix(text) {
        ("", _) => 0.0,
        (prefix, _) => prefix.parse::<f64>().unwrap_or(0.0),
    }
}

fn raw_url_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 3);
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn raw_url_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(decoded) = bytes
                .get(i + 1..i + 3)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            {
                out.push(decoded);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn html_special_chars(args: &Args) -> Result<EelValue> {
    let text = args.string(0)?;
    let preserve_entities = args.truthy(1);
    let entity = preg::compile_plain(r"^&(?:#[0-9]+|#[xX][0-9A-Fa-f]+|[A-Za-z][A-Za-z0-9]*);")?;

    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        match c {
            '&' if preserve_entities && entity.is_match(&text[i..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    Ok(out.into())
}

/// Last word boundary strictly before character `max`, `0` if none
fn preceding_word_boundary(chars: &[char], max: usize) -> usize {
    (1..max.min(chars.len()))
        .rev()
        .find(|&i| {
            let before = chars[i - 1].is_alphanumeric();
            let after = chars[i].is_alphanumeric();
            before != after || (!before && !after)
        })
        .unwrap_or(0)
}

/// Last sentence boundary strictly before character `max`, `0` if none
///
/// A sentence ends with `.`, `!` or `?`, optionally followed by closing
/// quotes or brackets, and the boundary sits after the whitespace run that
/// follows it.
fn preceding_sentence_boundary(chars: &[char], max: usize) -> usize {
    let limit = max.min(chars.len());
    let mut boundary = 0;
    let mut i = 0;
    while i < limit {
        if !matches!(chars[i], '.' | '!' | '?') {
            i += 1;
            continue;
        }
        let mut end = i + 1;
        while end < chars.len() && matches!(chars[end], '.' | '!' | '?' | '"' | '\'' | ')') {
            end += 1;
        }
        let whitespace = chars[end..].iter().take_while(|c| c.is_whitespace()).count();
        if whitespace > 0 && end + whitespace < limit {
            boundary = end + whitespace;
        }
        i = end.max(i + 1);
    }
    boundary
}

#[derive(Debug, Clone, Copy)]
enum Boundary {
    Character,
    Word,
    Sentence,
}

fn crop(args: &Args, boundary: Boundary) -> Result<EelValue> {
    let text = args.string(0)?;
    let max = clamp(args.int(1)?);
    let suffix = args.string(2)?;

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max {
        return Ok(text.into());
    }
    let end = match boundary {
        Boundary::Character => max,
        Boundary::Word => preceding_word_boundary(&chars, max),
        Boundary::Sentence => preceding_sentence_boundary(&chars, max),
    };
    let mut cropped: String = chars[..end].iter().collect();
    cropped.push_str(&suffix);
    Ok(cropped.into())
}

/// Character for a byte value; codes wrap modulo 256
fn chr(args: &Args) -> Result<EelValue> {
    let code = args.opt_int(0)?.unwrap_or(0).rem_euclid(256);
    let byte = u8::try_from(code).map_err(|_| args.invalid(0, "a character code"))?;
    Ok(char::from(byte).to_string().into())
}

fn format_values(args: &Args) -> Result<EelValue> {
    let template = args.string(0)?;
    let values: Vec<&EelValue> = match args.get(1) {
        EelValue::Null => Vec::new(),
        _ => args.map(1)?.values().map(plain).collect(),
    };
    format::sprintf(&template, &values).map(EelValue::from)
}

fn word_count(text: &str) -> usize {
    text.chars()
        .filter(|c| !c.is_ascii_punctuation() && !c.is_numeric())
        .collect::<String>()
        .split_whitespace()
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn call(method: &str, args: Vec<EelValue>) -> Result<EelValue> {
        StringHelper
            .resolve_method(method, &args)
            .unwrap_or_else(|| panic!("unknown method {method}"))
    }

    fn s(text: &str) -> EelValue {
        EelValue::from(text)
    }

    fn i(value: i64) -> EelValue {
        EelValue::Integer(value)
    }

    #[rstest]
    #[case::positive(vec![s("Hello, World!"), i(7), i(5)], "World")]
    #[case::to_end(vec![s("Hello, World!"), i(7)], "World!")]
    #[case::negative_start(vec![s("Hello, World!"), i(-6)], "World!")]
    #[case::negative_length(vec![s("Hello, World!"), i(7), i(-3)], "")]
    #[case::unicode(vec![s("Öl und Bär"), i(7), i(3)], "Bär")]
    fn test_substr(#[case] args: Vec<EelValue>, #[case] expected: &str) {
        assert_eq!(call("substr", args).unwrap(), s(expected));
    }

    #[rstest]
    #[case(vec![s("Hello, World!"), i(7), i(12)], "World")]
    #[case(vec![s("Hello, World!"), i(12), i(7)], "World")]
    #[case(vec![s("Hello, World!"), i(7)], "World!")]
    #[case(vec![s("Hello, World!"), i(-2), i(5)], "Hello")]
    fn test_substring(#[case] args: Vec<EelValue>, #[case] expected: &str) {
        assert_eq!(call("substring", args).unwrap(), s(expected));
    }

    #[rstest]
    #[case(vec![s("Hello, World!"), i(5)], ",")]
    #[case(vec![s("Hello, World!"), i(-1)], "")]
    #[case(vec![s("Hello, World!"), i(20)], "")]
    fn test_char_at(#[case] args: Vec<EelValue>, #[case] expected: &str) {
        assert_eq!(call("charAt", args).unwrap(), s(expected));
    }

    #[rstest]
    #[case("endsWith", vec![s("To be, or not to be, that is the question."), s("question.")], true)]
    #[case("endsWith", vec![s("To be, or not to be, that is the question."), s("to be")], false)]
    #[case("endsWith", vec![s("To be, or not to be, that is the question."), s("to be"), i(19)], true)]
    #[case("startsWith", vec![s("Hello world!"), s("Hello")], true)]
    #[case("startsWith", vec![s("Hello world!"), s("hello")], false)]
    #[case("startsWith", vec![s("Hello world!"), s("world"), i(6)], true)]
    fn test_ends_and_starts_with(
        #[case] method: &str,
        #[case] args: Vec<EelValue>,
        #[case] expected: bool,
    ) {
        assert_eq!(call(method, args).unwrap(), EelValue::Boolean(expected));
    }

    #[rstest]
    #[case("indexOf", vec![s("Blue Whale"), s("Blue")], 0)]
    #[case("indexOf", vec![s("Blue Whale"), s("Blute")], -1)]
    #[case("indexOf", vec![s("Blue Whale"), s("Whale"), i(0)], 5)]
    #[case("indexOf", vec![s("Blue Whale"), s("Whale"), i(5)], 5)]
    #[case("indexOf", vec![s("Blue Whale"), s(""), i(9)], 9)]
    #[case("indexOf", vec![s("Blue Whale"), s(""), i(11)], 10)]
    #[case("indexOf", vec![s("Blue Whale"), s("blue")], -1)]
    #[case("indexOf", vec![s("Bär Bär"), s("Bär"), i(1)], 4)]
    #[case("lastIndexOf", vec![s("canal"), s("a")], 3)]
    #[case("lastIndexOf", vec![s("canal"), s("a"), i(2)], 1)]
    #[case("lastIndexOf", vec![s("canal"), s("a"), i(0)], -1)]
    #[case("lastIndexOf", vec![s("canal"), s("x")], -1)]
    fn test_index_of(#[case] method: &str, #[case] args: Vec<EelValue>, #[case] expected: i64) {
        assert_eq!(call(method, args).unwrap(), i(expected));
    }

    #[test]
    fn test_preg_match() {
        let result = call("pregMatch", vec![s("For more information, see Chapter 3.4.5.1"), s("/(chapter \\d+(\\.\\d)*)/i")]).unwrap();
        assert_eq!(
            result.to_json(),
            serde_json::json!(["Chapter 3.4.5.1", "Chapter 3.4.5.1", ".1"])
        );
        assert_eq!(
            call("pregMatch", vec![s("No match"), s("/[0-9]+/")]).unwrap(),
            EelValue::Null
        );
    }

    #[test]
    fn test_preg_match_all() {
        let result = call(
            "pregMatchAll",
            vec![s("<hr id=\"icon-one\" /><hr id=\"icon-two\" />"), s("/id=\"icon-(.+?)\"/")],
        )
        .unwrap();
        assert_eq!(
            result.to_json(),
            serde_json::json!([
                ["id=\"icon-one\"", "id=\"icon-two\""],
                ["one", "two"]
            ])
        );
        assert_eq!(
            call("pregMatchAll", vec![s("abc"), s("/[0-9]/")]).unwrap(),
            EelValue::Null
        );
    }

    #[rstest]
    #[case(vec![s("Some.String with sp:cial characters"), s("/[[:^alnum:]]/"), s("-")], "Some-String-with-sp-cial-characters")]
    #[case(vec![s("2016-08-31"), s("/([0-9]+)-([0-9]+)-([0-9]+)/"), s("$3.$2.$1")], "31.08.2016")]
    #[case(vec![s("aaa"), s("/a/"), s("b"), i(2)], "bba")]
    fn test_preg_replace(#[case] args: Vec<EelValue>, #[case] expected: &str) {
        assert_eq!(call("pregReplace", args).unwrap(), s(expected));
    }

    #[test]
    fn test_preg_split() {
        let result = call("pregSplit", vec![s("foo bar   baz"), s("/\\s+/")]).unwrap();
        assert_eq!(result.to_json(), serde_json::json!(["foo", "bar", "baz"]));
        let limited = call("pregSplit", vec![s("first  second third"), s("/\\s+/"), i(2)]).unwrap();
        assert_eq!(limited.to_json(), serde_json::json!(["first", "second third"]));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = call("pregMatch", vec![s("x"), s("/(/")]).unwrap_err();
        assert_eq!(err.error_code(), &crate::core::error_code::EL0107);
    }

    #[rstest]
    #[case(vec![s("My hovercraft is full of eels"), s("eels"), s("spaghetti")], "My hovercraft is full of spaghetti")]
    #[case(vec![s("abc"), s(""), s("x")], "abc")]
    #[case(vec![s("Kaspers Kaffee"), s("Kaspers"), s("Robert's")], "Robert's Kaffee")]
    fn test_replace(#[case] args: Vec<EelValue>, #[case] expected: &str) {
        assert_eq!(call("replace", args).unwrap(), s(expected));
    }

    #[rstest]
    #[case(vec![s("My hovercraft is full...")], serde_json::json!(["My hovercraft is full..."]))]
    #[case(vec![s("My hovercraft is full..."), s(" ")], serde_json::json!(["My", "hovercraft", "is", "full..."]))]
    #[case(vec![s("My hovercraft is full..."), s(" "), i(2)], serde_json::json!(["My", "hovercraft is full..."]))]
    #[case(vec![s("a,b,c,d"), s(","), i(-2)], serde_json::json!(["a", "b"]))]
    #[case(vec![s("Äbc"), s("")], serde_json::json!(["Ä", "b", "c"]))]
    #[case(vec![s("Äbc"), s(""), i(2)], serde_json::json!(["Ä", "b"]))]
    fn test_split(#[case] args: Vec<EelValue>, #[case] expected: serde_json::Value) {
        assert_eq!(call("split", args).unwrap().to_json(), expected);
    }

    #[test]
    fn test_case_conversions() {
        assert_eq!(call("toLowerCase", vec![s("Öl und BÄR")]).unwrap(), s("öl und bär"));
        assert_eq!(call("toUpperCase", vec![s("öl und bär")]).unwrap(), s("ÖL UND BÄR"));
        assert_eq!(call("firstLetterToUpperCase", vec![s("ärger")]).unwrap(), s("Ärger"));
        assert_eq!(call("firstLetterToLowerCase", vec![s("Neos")]).unwrap(), s("neos"));
        assert_eq!(call("firstLetterToUpperCase", vec![s("")]).unwrap(), s(""));
    }

    #[rstest]
    #[case(vec![s("<a href=\"#\">Some <strong>bold</strong> text</a>")], "Some bold text")]
    #[case(vec![s("<a href=\"#\">Some <strong>bold</strong> text</a>"), s("<strong>")], "Some <strong>bold</strong> text")]
    #[case(vec![s("a <!-- hidden --> b")], "a  b")]
    #[case(vec![s("1 < 2")], "1 < 2")]
    fn test_strip_tags(#[case] args: Vec<EelValue>, #[case] expected: &str) {
        assert_eq!(call("stripTags", args).unwrap(), s(expected));
    }

    #[test]
    fn test_nl2br_and_trim() {
        assert_eq!(call("nl2br", vec![s("line 1\nline 2\r\nline 3")]).unwrap(), s("line 1<br />\nline 2<br />\r\nline 3"));
        assert_eq!(call("trim", vec![s("  \tHello World\n ")]).unwrap(), s("Hello World"));
        assert_eq!(call("trim", vec![s("__x__"), s("_")]).unwrap(), s("x"));
        assert_eq!(call("isBlank", vec![s("  \n")]).unwrap(), EelValue::Boolean(true));
        assert_eq!(call("isBlank", vec![s(" a ")]).unwrap(), EelValue::Boolean(false));
    }

    #[rstest]
    #[case("toString", vec![i(42)], s("42"))]
    #[case("toString", vec![EelValue::Boolean(true)], s("true"))]
    #[case("toString", vec![EelValue::Float(1.5)], s("1.5"))]
    #[case("toInteger", vec![s("42")], i(42))]
    #[case("toInteger", vec![s("  -7 apples")], i(-7))]
    #[case("toInteger", vec![s("x12")], i(0))]
    #[case("toInteger", vec![s("4.0e8")], i(400_000_000))]
    #[case("toFloat", vec![s("1.5kg")], EelValue::Float(1.5))]
    #[case("toFloat", vec![s("4.0e8")], EelValue::Float(4e8))]
    #[case("toFloat", vec![s(".5")], EelValue::Float(0.5))]
    #[case("toFloat", vec![s("abc")], EelValue::Float(0.0))]
    #[case("toBoolean", vec![s("TRUE")], EelValue::Boolean(true))]
    #[case("toBoolean", vec![s("1")], EelValue::Boolean(true))]
    #[case("toBoolean", vec![s("false")], EelValue::Boolean(false))]
    #[case("toBoolean", vec![s("0")], EelValue::Boolean(false))]
    fn test_conversions(#[case] method: &str, #[case] args: Vec<EelValue>, #[case] expected: EelValue) {
        assert_eq!(call(method, args).unwrap(), expected);
    }

    #[test]
    fn test_url_encoding() {
        assert_eq!(
            call("rawUrlEncode", vec![s("Foo & Bar = ä~")]).unwrap(),
            s("Foo%20%26%20Bar%20%3D%20%C3%A4~")
        );
        assert_eq!(
            call("rawUrlDecode", vec![s("Foo%20%26%20Bar%20%3D%20%C3%A4%zz")]).unwrap(),
            s("Foo & Bar = ä%zz")
        );
    }

    #[rstest]
    #[case(vec![s("Foo &amp; Bar <b>")], "Foo &amp;amp; Bar &lt;b&gt;")]
    #[case(vec![s("Foo &amp; Bar &#39; &x"), EelValue::Boolean(true)], "Foo &amp; Bar &#39; &amp;x")]
    fn test_html_special_chars(#[case] args: Vec<EelValue>, #[case] expected: &str) {
        assert_eq!(call("htmlSpecialChars", args).unwrap(), s(expected));
    }

    #[rstest]
    #[case("crop", vec![s("Kasper Skårhøj implemented the original version of the crop function"), i(18), s("...")], "Kasper Skårhøj imp...")]
    #[case("crop", vec![s("Kasper"), i(18), s("...")], "Kasper")]
    #[case("cropAtWord", vec![s("Kasper Skårhøj implemented the original version of the crop function"), i(18), s("...")], "Kasper Skårhøj ...")]
    #[case("cropAtWord", vec![s("Kasper Skårhøj"), i(3), s("...")], "...")]
    #[case("cropAtSentence", vec![s("Kasper Skårhøj implemented the original version of the crop function. But now we are using a TextIterator. Not too bad either."), i(80), s("...")], "Kasper Skårhøj implemented the original version of the crop function. ...")]
    #[case("cropAtSentence", vec![s("Kasper Skårhøj implemented the original version of the crop function. But now we are using a TextIterator."), i(60), s("...")], "...")]
    #[case("cropAtSentence", vec![s("Really? \"Yes.\" Then go."), i(20), s("…")], "Really? \"Yes.\" …")]
    fn test_crop(#[case] method: &str, #[case] args: Vec<EelValue>, #[case] expected: &str) {
        assert_eq!(call(method, args).unwrap(), s(expected));
    }

    #[rstest]
    #[case("Hello, World!", 2)]
    #[case("Hello, World 2 people!", 3)]
    #[case("Ärger über Öl", 3)]
    #[case("", 0)]
    fn test_word_count(#[case] text: &str, #[case] expected: i64) {
        assert_eq!(call("wordCount", vec![s(text)]).unwrap(), i(expected));
    }

    #[test]
    fn test_length_base64_and_hash() {
        assert_eq!(call("length", vec![s("Skårhøj")]).unwrap(), i(7));
        assert_eq!(call("base64encode", vec![s("Hello")]).unwrap(), s("SGVsbG8="));
        assert_eq!(call("base64decode", vec![s("SGVsbG8=")]).unwrap(), s("Hello"));
        assert_eq!(call("base64decode", vec![s("***")]).unwrap(), EelValue::Boolean(false));
        assert_eq!(
            call("sha256", vec![s("abc")]).unwrap(),
            s("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[rstest]
    #[case(65, "A")]
    #[case(256, "\0")]
    #[case(0, "\0")]
    #[case(-191, "A")]
    fn test_chr(#[case] code: i64, #[case] expected: &str) {
        assert_eq!(call("chr", vec![i(code)]).unwrap(), s(expected));
    }

    #[rstest]
    #[case(s("A"), 65)]
    #[case(s(""), 0)]
    #[case(i(1), 49)]
    #[case(s("longer string"), 108)]
    #[case(s("ä"), 195)]
    fn test_ord(#[case] value: EelValue, #[case] expected: i64) {
        assert_eq!(call("ord", vec![value]).unwrap(), i(expected));
    }

    #[test]
    fn test_md5_and_sha1() {
        assert_eq!(
            call("md5", vec![s("joh316")]).unwrap(),
            s("bacb98acf97e0b6112b1d1b650b84971")
        );
        assert_eq!(
            call("sha1", vec![s("joh316")]).unwrap(),
            s("063b3d108bed9f88fa618c6046de0dccadcf3158")
        );
        assert_eq!(
            call("md5", vec![s("")]).unwrap(),
            s("d41d8cd98f00b204e9800998ecf8427e")
        );
    }

    #[test]
    fn test_format() {
        let values = EelValue::list([s("eel"), i(3), EelValue::Float(2.5)]);
        assert_eq!(
            call("format", vec![s("%s has %d fins and %.1f%% fat"), values]).unwrap(),
            s("eel has 3 fins and 2.5% fat")
        );
        assert_eq!(call("format", vec![s("plain")]).unwrap(), s("plain"));

        let err = call("format", vec![s("%s %s"), EelValue::list([s("one")])]).unwrap_err();
        assert_eq!(err.error_code(), &crate::core::error_code::EL0106);
        assert!(call("format", vec![s("%s"), s("not a list")]).is_err());
    }

    #[test]
    fn test_unknown_method_and_bad_arguments() {
        assert!(StringHelper.resolve_method("reverse", &[]).is_none());
        let err = call("substr", vec![s("abc"), s("x")]).unwrap_err();
        assert_eq!(err.error_code(), &crate::core::error_code::EL0106);
        assert!(call("length", vec![EelValue::empty_map()]).is_err());
    }
}
