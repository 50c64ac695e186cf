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

//! Tokenizer for Eel expressions
//!
//! Works directly on the input bytes:
//! - Zero-copy identifiers and string literals (strings are only copied when
//!   they contain an escaped quote)
//! - Negative numbers are left to the parser, which joins a `-` with an
//!   adjacent number in operand position
//! - Every token carries its byte span for error reporting

use super::span::Spanned;
use crate::core::error_code::{EL0004, EL0005, EL0007};
use crate::core::{EelError, Result, SourceLocation};
use std::borrow::Cow;
use std::fmt;

/// Token produced by the [`Tokenizer`]
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'input> {
    // Literals
    /// Integer literal (e.g., 42)
    Integer(i64),
    /// Floating point literal (e.g., 3.141)
    Float(f64),
    /// String literal with escaped quotes resolved
    String(Cow<'input, str>),
    /// `true` / `false` in any letter case
    Boolean(bool),

    /// Identifier (e.g., `foo`, `_bar2`)
    Identifier(&'input str),

    // Operators
    /// Addition or concatenation (+)
    Plus,
    /// Subtraction (-)
    Minus,
    /// Multiplication (*)
    Multiply,
    /// Division (/)
    Divide,
    /// Modulo (%)
    Percent,
    /// Logical negation (! or not)
    Not,
    /// Strict equality (==)
    Equal,
    /// Strict inequality (!=)
    NotEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal (<=)
    LessThanOrEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal (>=)
    GreaterThanOrEqual,
    /// Logical AND (&& or and)
    And,
    /// Logical OR (|| or or)
    Or,
    /// Ternary condition (?)
    Question,
    /// Ternary alternative and object key separator (:)
    Colon,
    /// Arrow function (=>)
    Arrow,

    // Delimiters
    /// Left parenthesis (
    LeftParen,
    /// Right parenthesis )
    RightParen,
    /// Left square bracket [
    LeftBracket,
    /// Right square bracket ]
    RightBracket,
    /// Left curly brace {
    LeftBrace,
    /// Right curly brace }
    RightBrace,
    /// Dot (.) for path navigation
    Dot,
    /// Comma separator (,)
    Comma,
}

impl<'input> Token<'input> {
    /// Get keyword from an identifier-shaped word
    #[inline]
    pub fn from_keyword(word: &str) -> Option<Token<'input>> {
        match word {
            "not" => Some(Token::Not),
            "and" => Some(Token::And),
            "or" => Some(Token::Or),
            _ if word.eq_ignore_ascii_case("true") => Some(Token::Boolean(true)),
            _ if word.eq_ignore_ascii_case("false") => Some(Token::Boolean(false)),
            _ => None,
        }
    }

    /// Get identifier string
    #[inline]
    pub fn as_identifier(&self) -> Option<&'input str> {
        match self {
            Token::Identifier(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric literal tokens
    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Token::Integer(_) | Token::Float(_))
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Token::Integer(i) => return write!(f, "number {i}"),
            Token::Float(x) => return write!(f, "number {x}"),
            Token::String(s) => return write!(f, "string '{s}'"),
            Token::Boolean(b) => return write!(f, "boolean {b}"),
            Token::Identifier(name) => return write!(f, "identifier '{name}'"),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Multiply => "*",
            Token::Divide => "/",
            Token::Percent => "%",
            Token::Not => "!",
            Token::Equal => "==",
            Token::NotEqual => "!=",
            Token::LessThan => "<",
            Token::LessThanOrEqual => "<=",
            Token::GreaterThan => ">",
            Token::GreaterThanOrEqual => ">=",
            Token::And => "&&",
            Token::Or => "||",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Arrow => "=>",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            Token::Dot => ".",
            Token::Comma => ",",
        };
        write!(f, "'{symbol}'")
    }
}

/// Byte-level tokenizer. Cheap to clone, which the parser uses for lookahead.
#[derive(Clone)]
pub struct Tokenizer<'input> {
    input: &'input str,
    bytes: &'input [u8],
    pos: usize,
    end: usize,
}

impl<'input> Tokenizer<'input> {
    /// Create a new tokenizer
    #[inline]
    pub fn new(input: &'input str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            end: input.len(),
        }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    fn is_id_start(ch: u8) -> bool {
        matches!(ch, b'A'..=b'Z' | b'a'..=b'z' | b'_')
    }

    #[inline(always)]
    fn is_id_continue(ch: u8) -> bool {
        matches!(ch, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_')
    }

    #[inline(always)]
    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    #[inline(always)]
    fn skip_whitespace(&mut self) {
        while self.pos < self.end && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// `digits` or `digits.digits`; integers too large for i64 become floats
    fn parse_number(&mut self) -> Result<Token<'input>> {
        let start = self.pos;
        while self.pos < self.end && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }

        let is_float = self.peek_byte(0) == Some(b'.')
            && self.peek_byte(1).is_some_and(|b| b.is_ascii_digit());

        if is_float {
            self.pos += 1;
            while self.pos < self.end && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }

        let text = &self.input[start..self.pos];
        if !is_float {
            if let Ok(value) = text.parse::<i64>() {
                return Ok(Token::Integer(value));
            }
        }
        text.parse::<f64>().map(Token::Float).map_err(|_| {
            EelError::parse_error(
                EL0005,
                format!("Invalid number literal '{text}'"),
                "",
                Some(SourceLocation::new(start, self.pos - start)),
            )
        })
    }

    fn parse_identifier(&mut self) -> &'input str {
        let start = self.pos;
        while self.pos < self.end && Self::is_id_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    /// Quoted string. A backslash only escapes the enclosing quote character;
    /// any other backslash is kept literally.
    fn parse_string_literal(&mut self, quote: u8) -> Result<Cow<'input, str>> {
        let open = self.pos;
        self.pos += 1;
        let start = self.pos;
        let mut has_escape = false;

        while self.pos < self.end {
            match self.bytes[self.pos] {
                b'\\' if self.peek_byte(1) == Some(quote) => {
                    has_escape = true;
                    self.pos += 2;
                }
                b if b == quote => {
                    let content = &self.input[start..self.pos];
                    self.pos += 1;
                    if !has_escape {
                        return Ok(Cow::Borrowed(content));
                    }
                    let q = quote as char;
                    return Ok(Cow::Owned(content.replace(&format!("\\{q}"), &q.to_string())));
                }
                _ => self.pos += 1,
            }
        }

        Err(EelError::parse_error(
            EL0004,
            "Unterminated string literal",
            "",
            Some(SourceLocation::new(open, self.end - open)),
        ))
    }

    fn unexpected_char(&self) -> EelError {
        let ch = self.input[self.pos..].chars().next().unwrap_or('\0');
        EelError::parse_error(
            EL0007,
            format!("Unexpected character '{ch}'"),
            "",
            Some(SourceLocation::new(self.pos, ch.len_utf8())),
        )
    }

    #[inline(always)]
    fn single(&mut self, token: Token<'input>) -> Token<'input> {
        self.pos += 1;
        token
    }

    #[inline(always)]
    fn double(&mut self, token: Token<'input>) -> Token<'input> {
        self.pos += 2;
        token
    }

    /// Next token with its span, `None` at end of input
    pub fn next_token(&mut self) -> Result<Option<Spanned<Token<'input>>>> {
        self.skip_whitespace();

        if self.pos >= self.end {
            return Ok(None);
        }

        let start = self.pos;
        let token = match self.bytes[self.pos] {
            b'.' => self.single(Token::Dot),
            b'(' => self.single(Token::LeftParen),
            b')' => self.single(Token::RightParen),
            b'[' => self.single(Token::LeftBracket),
            b']' => self.single(Token::RightBracket),
            b'{' => self.single(Token::LeftBrace),
            b'}' => self.single(Token::RightBrace),
            b',' => self.single(Token::Comma),
            b':' => self.single(Token::Colon),
            b'?' => self.single(Token::Question),
            b'+' => self.single(Token::Plus),
            b'-' => self.single(Token::Minus),
            b'*' => self.single(Token::Multiply),
            b'/' => self.single(Token::Divide),
            b'%' => self.single(Token::Percent),

            b'=' => match self.peek_byte(1) {
                Some(b'=') => self.double(Token::Equal),
                Some(b'>') => self.double(Token::Arrow),
                _ => return Err(self.unexpected_char()),
            },
            b'!' => match self.peek_byte(1) {
                Some(b'=') => self.double(Token::NotEqual),
                _ => self.single(Token::Not),
            },
            b'<' => match self.peek_byte(1) {
                Some(b'=') => self.double(Token::LessThanOrEqual),
                _ => self.single(Token::LessThan),
            },
            b'>' => match self.peek_byte(1) {
                Some(b'=') => self.double(Token::GreaterThanOrEqual),
                _ => self.single(Token::GreaterThan),
            },
            b'&' => match self.peek_byte(1) {
                Some(b'&') => self.double(Token::And),
                _ => return Err(self.unexpected_char()),
            },
            b'|' => match self.peek_byte(1) {
                Some(b'|') => self.double(Token::Or),
                _ => return Err(self.unexpected_char()),
            },

            b'0'..=b'9' => self.parse_number()?,
            quote @ (b'\'' | b'"') => Token::String(self.parse_string_literal(quote)?),

            ch if Self::is_id_start(ch) => {
                let word = self.parse_identifier();
                Token::from_keyword(word).unwrap_or(Token::Identifier(word))
            }

            _ => return Err(self.unexpected_char()),
        };

        Ok(Some(Spanned::new(token, start, self.pos)))
    }

    /// Tokenize the whole input
    pub fn tokenize_all(&mut self) -> Result<Vec<Spanned<Token<'input>>>> {
        let mut tokens = Vec::with_capacity(32);
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}

/// Tokenize an input string
pub fn tokenize(input: &str) -> Result<Vec<Spanned<Token<'_>>>> {
    Tokenizer::new(input).tokenize_all()
}
