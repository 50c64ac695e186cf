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

//! Pratt parser for Eel expressions
//!
//! Binary operators are handled by precedence climbing; the ternary operator
//! is folded into the same loop at the lowest level. Primary expressions,
//! postfix chains (`.name`, `.name(...)`, `[...]`) and unary negation are
//! parsed by dedicated functions.

use super::span::Spanned;
use super::tokenizer::{Token, Tokenizer};
use crate::ast::{Arguments, BinaryOperator, ExpressionNode, LiteralValue, UnaryOperator};
use crate::core::error_code::{EL0001, EL0002, EL0003, EL0006};
use crate::core::{EelError, Result, SourceLocation};
use log::trace;

/// Default limit of nested operands before parsing is aborted
pub const DEFAULT_MAX_NESTING: usize = 256;

/// Operator precedence levels (higher = tighter binding)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Lowest precedence - ternary conditional (right associative)
    Ternary = 1,
    /// Logical OR
    Or = 2,
    /// Logical AND
    And = 3,
    /// Equality operators (==, !=)
    Equality = 4,
    /// Relational operators (<, >, <=, >=)
    Relational = 5,
    /// Additive operators (+, -)
    Additive = 6,
    /// Multiplicative operators (*, /, %)
    Multiplicative = 7,
    /// Unary negation (!, not)
    Unary = 8,
    /// Invocation/Indexing (., [])
    Invocation = 9,
}

impl Precedence {
    /// Get the next higher precedence level for left-associative operators
    #[inline(always)]
    pub const fn next_level(self) -> Self {
        match self {
            Precedence::Ternary => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Relational,
            Precedence::Relational => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Unary,
            Precedence::Unary => Precedence::Invocation,
            Precedence::Invocation => Precedence::Invocation,
        }
    }

    /// Check if this precedence is right associative
    #[inline(always)]
    pub const fn is_right_associative(self) -> bool {
        matches!(self, Precedence::Ternary)
    }
}

#[inline(always)]
fn get_precedence(token: &Token<'_>) -> Option<Precedence> {
    match token {
        Token::Dot | Token::LeftBracket => Some(Precedence::Invocation),
        Token::Plus | Token::Minus => Some(Precedence::Additive),
        Token::Multiply | Token::Divide | Token::Percent => Some(Precedence::Multiplicative),
        Token::Equal | Token::NotEqual => Some(Precedence::Equality),
        Token::LessThan
        | Token::LessThanOrEqual
        | Token::GreaterThan
        | Token::GreaterThanOrEqual => Some(Precedence::Relational),
        Token::And => Some(Precedence::And),
        Token::Or => Some(Precedence::Or),
        Token::Question => Some(Precedence::Ternary),
        _ => None,
    }
}

#[inline(always)]
fn token_to_binary_op(token: &Token<'_>) -> Option<BinaryOperator> {
    match token {
        Token::Plus => Some(BinaryOperator::Add),
        Token::Minus => Some(BinaryOperator::Subtract),
        Token::Multiply => Some(BinaryOperator::Multiply),
        Token::Divide => Some(BinaryOperator::Divide),
        Token::Percent => Some(BinaryOperator::Modulo),
        Token::Equal => Some(BinaryOperator::Equal),
        Token::NotEqual => Some(BinaryOperator::NotEqual),
        Token::LessThan => Some(BinaryOperator::LessThan),
        Token::LessThanOrEqual => Some(BinaryOperator::LessThanOrEqual),
        Token::GreaterThan => Some(BinaryOperator::GreaterThan),
        Token::GreaterThanOrEqual => Some(BinaryOperator::GreaterThanOrEqual),
        Token::And => Some(BinaryOperator::And),
        Token::Or => Some(BinaryOperator::Or),
        _ => None,
    }
}

/// Pratt parser over a token stream with one token of lookahead
pub struct PrattParser<'input> {
    input: &'input str,
    tokenizer: Tokenizer<'input>,
    current_token: Option<Spanned<Token<'input>>>,
    depth: usize,
    max_depth: usize,
}

impl<'input> PrattParser<'input> {
    /// Create a new parser with the default nesting limit
    pub fn new(input: &'input str) -> Self {
        Self::with_max_depth(input, DEFAULT_MAX_NESTING)
    }

    /// Create a new parser with a custom nesting limit
    pub fn with_max_depth(input: &'input str, max_depth: usize) -> Self {
        Self {
            input,
            tokenizer: Tokenizer::new(input),
            current_token: None,
            depth: 0,
            max_depth,
        }
    }

    /// Move to the next token, returning the one that was current
    #[inline(always)]
    fn advance(&mut self) -> Result<Option<Spanned<Token<'input>>>> {
        let previous = self.current_token.take();
        self.current_token = self.tokenizer.next_token()?;
        Ok(previous)
    }

    #[inline(always)]
    fn current(&self) -> Option<&Token<'input>> {
        self.current_token.as_ref().map(|t| &t.value)
    }

    fn unexpected_token(token: &Spanned<Token<'input>>) -> EelError {
        EelError::parse_error(
            EL0002,
            format!("Unexpected token {}", token.value),
            "",
            Some(token.location()),
        )
    }

    fn unexpected_end(&self, expected: &str) -> EelError {
        EelError::parse_error(
            EL0006,
            format!("Unexpected end of input, expected {expected}"),
            "",
            Some(SourceLocation::point(self.input.len())),
        )
    }

    /// Consume a closing delimiter. A missing delimiter at end of input is
    /// reported as unclosed at the position of its opening counterpart.
    fn expect_closing(&mut self, closing: Token<'input>, open_at: usize) -> Result<()> {
        match &self.current_token {
            Some(token) if token.value == closing => {
                self.advance()?;
                Ok(())
            }
            Some(token) => Err(Self::unexpected_token(token)),
            None => Err(EelError::parse_error(
                EL0003,
                format!("Missing closing {closing}"),
                "",
                Some(SourceLocation::point(open_at)),
            )),
        }
    }

    fn expect(&mut self, expected: Token<'input>) -> Result<()> {
        match &self.current_token {
            Some(token) if token.value == expected => {
                self.advance()?;
                Ok(())
            }
            Some(token) => Err(Self::unexpected_token(token)),
            None => Err(self.unexpected_end(&expected.to_string())),
        }
    }

    /// Source text of identifier-shaped tokens, keywords included, so that
    /// `foo.not` or `{true: 1}` still name a property
    fn word_of(&self, token: &Spanned<Token<'input>>) -> Option<&'input str> {
        match &token.value {
            Token::Identifier(name) => Some(*name),
            Token::Boolean(_) | Token::Not | Token::And | Token::Or => {
                self.input.get(token.start..token.end)
            }
            _ => None,
        }
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.depth += 1;
        if self.depth > self.max_depth {
            let offset = self
                .current_token
                .as_ref()
                .map_or(self.input.len(), |t| t.start);
            return Err(EelError::parse_error(
                EL0001,
                format!("Expression nesting exceeds {} levels", self.max_depth),
                "",
                Some(SourceLocation::point(offset)),
            ));
        }
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Parse primary expression (literals, identifiers, calls, groups,
    /// array/object literals and arrow functions)
    fn parse_primary(&mut self) -> Result<ExpressionNode> {
        let Some(token) = self.current_token.as_ref() else {
            return Err(self.unexpected_end("an expression"));
        };

        match &token.value {
            Token::Integer(_) | Token::Float(_) | Token::String(_) | Token::Boolean(_) => {
                let literal = match self.advance()?.map(|t| t.value) {
                    Some(Token::Integer(i)) => LiteralValue::Integer(i),
                    Some(Token::Float(x)) => LiteralValue::Float(x),
                    Some(Token::String(s)) => LiteralValue::String(s.into_owned()),
                    Some(Token::Boolean(b)) => LiteralValue::Boolean(b),
                    _ => return Err(self.unexpected_end("a literal")),
                };
                Ok(ExpressionNode::literal(literal))
            }
            Token::Minus => self.parse_negative_number(),
            Token::Identifier(name) => {
                let name = *name;
                self.advance()?;
                match self.current() {
                    Some(Token::Arrow) => {
                        self.advance()?;
                        self.parse_arrow_body(vec![name.to_string()])
                    }
                    Some(Token::LeftParen) => {
                        let open_at = self.current_token.as_ref().map_or(0, |t| t.start);
                        self.advance()?;
                        let args = self.parse_arguments(open_at)?;
                        Ok(ExpressionNode::function_call(name, args))
                    }
                    _ => Ok(ExpressionNode::identifier(name)),
                }
            }
            Token::LeftParen => {
                let open_at = token.start;
                if let Some((params, resume)) = self.scan_arrow_parameters() {
                    trace!("arrow function with {} parameter(s)", params.len());
                    self.tokenizer = resume;
                    self.current_token = self.tokenizer.next_token()?;
                    return self.parse_arrow_body(params);
                }
                self.advance()?;
                let expr = self.parse_expression_with_precedence(Precedence::Ternary)?;
                self.expect_closing(Token::RightParen, open_at)?;
                Ok(expr)
            }
            Token::LeftBracket => {
                let open_at = token.start;
                self.advance()?;
                self.parse_array_literal(open_at)
            }
            Token::LeftBrace => {
                let open_at = token.start;
                self.advance()?;
                self.parse_object_literal(open_at)
            }
            _ => Err(Self::unexpected_token(token)),
        }
    }

    /// `-` immediately followed by a number in operand position
    fn parse_negative_number(&mut self) -> Result<ExpressionNode> {
        let Some(minus) = self.current_token.as_ref() else {
            return Err(self.unexpected_end("an expression"));
        };
        let mut lookahead = self.tokenizer.clone();
        let adjacent = match lookahead.next_token() {
            Ok(Some(next)) if next.value.is_number() && next.start == minus.end => next.value,
            _ => return Err(Self::unexpected_token(minus)),
        };
        self.advance()?;
        self.advance()?;
        let literal = match adjacent {
            Token::Integer(i) => i
                .checked_neg()
                .map(LiteralValue::Integer)
                .unwrap_or(LiteralValue::Float(-(i as f64))),
            Token::Float(x) => LiteralValue::Float(-x),
            _ => return Err(self.unexpected_end("a number")),
        };
        Ok(ExpressionNode::literal(literal))
    }

    /// Lookahead for `(a, b) =>` or `() =>` while positioned on `(`.
    /// Returns the parameter names and a tokenizer positioned after `=>`.
    fn scan_arrow_parameters(&self) -> Option<(Vec<String>, Tokenizer<'input>)> {
        let mut lookahead = self.tokenizer.clone();
        let mut params = Vec::new();
        let mut expect_name = true;
        loop {
            let token = lookahead.next_token().ok()??;
            match token.value {
                Token::RightParen if expect_name && params.is_empty() => break,
                Token::RightParen if !expect_name => break,
                Token::Identifier(name) if expect_name => {
                    params.push(name.to_string());
                    expect_name = false;
                }
                Token::Comma if !expect_name => expect_name = true,
                _ => return None,
            }
        }
        match lookahead.next_token().ok()?? {
            Spanned {
                value: Token::Arrow,
                ..
            } => Some((params, lookahead)),
            _ => None,
        }
    }

    fn parse_arrow_body(&mut self, params: Vec<String>) -> Result<ExpressionNode> {
        let body = self.parse_expression_with_precedence(Precedence::Ternary)?;
        Ok(ExpressionNode::arrow_function(params, body))
    }

    /// Comma separated expressions after an opening `(`
    fn parse_arguments(&mut self, open_at: usize) -> Result<Arguments> {
        let mut args = Arguments::new();
        if let Some(Token::RightParen) = self.current() {
            self.advance()?;
            return Ok(args);
        }

        loop {
            args.push(self.parse_expression_with_precedence(Precedence::Ternary)?);
            match &self.current_token {
                Some(Spanned {
                    value: Token::Comma,
                    ..
                }) => {
                    self.advance()?;
                }
                Some(Spanned {
                    value: Token::RightParen,
                    ..
                }) => {
                    self.advance()?;
                    return Ok(args);
                }
                Some(token) => return Err(Self::unexpected_token(token)),
                None => {
                    return Err(EelError::parse_error(
                        EL0003,
                        "Missing closing ')' in call arguments",
                        "",
                        Some(SourceLocation::point(open_at)),
                    ));
                }
            }
        }
    }

    fn parse_array_literal(&mut self, open_at: usize) -> Result<ExpressionNode> {
        let mut items = Vec::new();
        if let Some(Token::RightBracket) = self.current() {
            self.advance()?;
            return Ok(ExpressionNode::ArrayLiteral(items));
        }

        loop {
            items.push(self.parse_expression_with_precedence(Precedence::Ternary)?);
            if let Some(Token::Comma) = self.current() {
                self.advance()?;
                continue;
            }
            self.expect_closing(Token::RightBracket, open_at)?;
            return Ok(ExpressionNode::ArrayLiteral(items));
        }
    }

    fn parse_object_literal(&mut self, open_at: usize) -> Result<ExpressionNode> {
        let mut entries = Vec::new();
        if let Some(Token::RightBrace) = self.current() {
            self.advance()?;
            return Ok(ExpressionNode::ObjectLiteral(entries));
        }

        loop {
            let key = match self.advance()? {
                Some(Spanned {
                    value: Token::String(key),
                    ..
                }) => key.into_owned(),
                Some(token) => match self.word_of(&token) {
                    Some(word) => word.to_string(),
                    None => return Err(Self::unexpected_token(&token)),
                },
                None => {
                    return Err(EelError::parse_error(
                        EL0003,
                        "Missing closing '}'",
                        "",
                        Some(SourceLocation::point(open_at)),
                    ));
                }
            };
            self.expect(Token::Colon)?;
            let value = self.parse_expression_with_precedence(Precedence::Ternary)?;
            entries.push((key, value));

            if let Some(Token::Comma) = self.current() {
                self.advance()?;
                continue;
            }
            self.expect_closing(Token::RightBrace, open_at)?;
            return Ok(ExpressionNode::ObjectLiteral(entries));
        }
    }

    /// Parse postfix expressions (method calls, indexing, path navigation)
    fn parse_postfix(&mut self, mut left: ExpressionNode) -> Result<ExpressionNode> {
        loop {
            match &self.current_token {
                Some(Spanned {
                    value: Token::Dot, ..
                }) => {
                    self.advance()?;
                    left = self.parse_path_or_method(left)?;
                }
                Some(Spanned {
                    value: Token::LeftBracket,
                    start,
                    ..
                }) => {
                    let open_at = *start;
                    self.advance()?;
                    let index = self.parse_expression_with_precedence(Precedence::Ternary)?;
                    self.expect_closing(Token::RightBracket, open_at)?;
                    left = ExpressionNode::index(left, index);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    /// Parse path navigation or method call after dot
    fn parse_path_or_method(&mut self, base: ExpressionNode) -> Result<ExpressionNode> {
        let name = match self.advance()? {
            Some(token) => match self.word_of(&token) {
                Some(name) => name,
                None => return Err(Self::unexpected_token(&token)),
            },
            None => return Err(self.unexpected_end("a property name")),
        };

        match &self.current_token {
            Some(Spanned {
                value: Token::LeftParen,
                start,
                ..
            }) => {
                let open_at = *start;
                self.advance()?;
                let args = self.parse_arguments(open_at)?;
                Ok(ExpressionNode::method_call(base, name, args))
            }
            _ => Ok(ExpressionNode::path(base, name)),
        }
    }

    /// Negation binds to a single postfix expression: `!a < b` is `(!a) < b`
    fn parse_unary(&mut self) -> Result<ExpressionNode> {
        self.nested(|parser| {
            if let Some(Token::Not) = parser.current() {
                parser.advance()?;
                let operand = parser.parse_unary()?;
                return Ok(ExpressionNode::unary_op(UnaryOperator::Not, operand));
            }
            let primary = parser.parse_primary()?;
            parser.parse_postfix(primary)
        })
    }

    /// Core precedence climbing loop
    fn parse_expression_with_precedence(
        &mut self,
        min_precedence: Precedence,
    ) -> Result<ExpressionNode> {
        let mut left = self.parse_unary()?;

        while let Some(current_token) = self.current() {
            let precedence = match get_precedence(current_token) {
                Some(prec) if prec >= min_precedence => prec,
                _ => break,
            };

            if let Token::Question = current_token {
                self.advance()?;
                let then_expr =
                    self.nested(|parser| parser.parse_expression_with_precedence(Precedence::Ternary))?;
                self.expect(Token::Colon)?;
                // Right associative: `a ? b : c ? d : e` is `a ? b : (c ? d : e)`
                let else_expr =
                    self.nested(|parser| parser.parse_expression_with_precedence(precedence))?;
                left = ExpressionNode::conditional(left, then_expr, else_expr);
                continue;
            }

            let Some(op) = token_to_binary_op(current_token) else {
                break;
            };
            self.advance()?;
            let next_min = if precedence.is_right_associative() {
                precedence
            } else {
                precedence.next_level()
            };
            let right = self.parse_expression_with_precedence(next_min)?;
            left = ExpressionNode::binary_op(op, left, right);
        }

        Ok(left)
    }

    /// Parse complete input
    pub fn parse(&mut self) -> Result<ExpressionNode> {
        self.advance()?;
        let expr = self.parse_expression_with_precedence(Precedence::Ternary)?;

        if let Some(token) = &self.current_token {
            return Err(Self::unexpected_token(token));
        }

        Ok(expr)
    }
}

/// Parse an expression with the Pratt parser
pub fn parse_expression_pratt(input: &str) -> Result<ExpressionNode> {
    PrattParser::new(input).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error_code::{EL0004, EL0007};

    fn parse(input: &str) -> ExpressionNode {
        parse_expression_pratt(input).unwrap()
    }

    fn error_at(input: &str) -> (u16, usize) {
        match parse_expression_pratt(input).unwrap_err() {
            EelError::Parse {
                error_code,
                location,
                ..
            } => (error_code.code, location.map_or(usize::MAX, |l| l.offset)),
            other => panic!("Expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence_ordering() {
        assert!(Precedence::Multiplicative > Precedence::Additive);
        assert!(Precedence::Additive > Precedence::Relational);
        assert!(Precedence::Relational > Precedence::Equality);
        assert!(Precedence::Equality > Precedence::And);
        assert!(Precedence::And > Precedence::Or);
        assert!(Precedence::Or > Precedence::Ternary);
    }

    #[test]
    fn test_basic_expressions() {
        assert!(matches!(parse("foo"), ExpressionNode::Identifier(_)));
        assert!(matches!(parse("foo.bar"), ExpressionNode::Path { .. }));
        assert_eq!(parse("1 + 2 * 3 + 4 / 2 + 2").to_string(), "(((1 + (2 * 3)) + (4 / 2)) + 2)");
        assert_eq!(parse("2 * 1 == 3 - 1").to_string(), "((2 * 1) == (3 - 1))");
        assert_eq!(parse("a < b == c >= d").to_string(), "((a < b) == (c >= d))");
    }

    #[test]
    fn test_logical_operators() {
        assert_eq!(parse("a || b && c").to_string(), "(a || (b && c))");
        assert_eq!(parse("a or b and not c").to_string(), "(a || (b && !c))");
        assert_eq!(parse("!1 < 2").to_string(), "(!1 < 2)");
        assert_eq!(parse("!!a.b").to_string(), "!!a.b");
    }

    #[test]
    fn test_ternary_associativity() {
        assert_eq!(parse("a ? b : c ? d : e").to_string(), "(a ? b : (c ? d : e))");
        assert_eq!(parse("a ? b ? c : d : e").to_string(), "(a ? (b ? c : d) : e)");
        assert_eq!(parse("x || y ? 1 + 2 : 3").to_string(), "((x || y) ? (1 + 2) : 3)");
    }

    #[test]
    fn test_negative_numbers() {
        assert_eq!(parse("-100"), ExpressionNode::literal(LiteralValue::Integer(-100)));
        assert_eq!(parse("-17.4"), ExpressionNode::literal(LiteralValue::Float(-17.4)));
        assert_eq!(parse("a -1").to_string(), "(a - 1)");
        assert_eq!(parse("a - -1").to_string(), "(a - -1)");
        assert_eq!(error_at("- 1"), (2, 0));
        assert_eq!(error_at("-a"), (2, 0));
    }

    #[test]
    fn test_calls_and_paths() {
        assert!(matches!(parse("count()"), ExpressionNode::FunctionCall(_)));
        assert!(matches!(parse("String.substr(s, 1)"), ExpressionNode::MethodCall(_)));
        assert_eq!(
            parse("a.b[c.d].e(1, 'x')[0]").to_string(),
            "a.b[c.d].e(1, 'x')[0]"
        );
        assert_eq!(parse("foo.not.true").to_string(), "foo.not.true");
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("[1, 'a', [true]]").to_string(), "[1, 'a', [true]]");
        assert_eq!(parse("[]").to_string(), "[]");
        assert_eq!(parse("{foo: 1, 'bar baz': x}").to_string(), "{foo: 1, 'bar baz': x}");
        assert_eq!(parse("{}").to_string(), "{}");
    }

    #[test]
    fn test_arrow_functions() {
        assert_eq!(parse("x => x * 2").to_string(), "((x) => (x * 2))");
        assert_eq!(parse("(a, b) => a + b").to_string(), "((a, b) => (a + b))");
        assert_eq!(parse("() => 1").to_string(), "(() => 1)");
        assert_eq!(
            parse("Array.map(items, x => x.id)").to_string(),
            "Array.map(items, ((x) => x.id))"
        );
        // A plain group is not an arrow function
        assert_eq!(parse("(a) + 1").to_string(), "(a + 1)");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(error_at("a * (5 + a))"), (2, 11));
        assert_eq!(error_at("(a * 5 + b"), (3, 0));
        assert_eq!(error_at("foo(1, 2"), (3, 3));
        assert_eq!(error_at("[1, 2"), (3, 0));
        assert_eq!(error_at("a +"), (6, 3));
        assert_eq!(error_at(""), (6, 0));
        assert_eq!(error_at("'unterminated").0, EL0004.code);
        assert_eq!(error_at("a # b").0, EL0007.code);
        assert_eq!(error_at("a b"), (2, 2));
        assert_eq!(error_at("a ? b"), (6, 5));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(300), ")".repeat(300));
        assert_eq!(error_at(&deep).0, EL0001.code);

        let fine = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert!(parse_expression_pratt(&fine).is_ok());
    }

    #[test]
    fn test_ternary_branches_count_as_nesting() {
        let open_then = format!("{}1", "a ? ".repeat(200_000));
        assert_eq!(error_at(&open_then).0, EL0001.code);

        let else_chain = format!("{}1", "a ? 1 : ".repeat(1_000));
        assert_eq!(error_at(&else_chain).0, EL0001.code);

        let moderate = format!("{}1", "a ? 1 : ".repeat(100));
        assert!(parse_expression_pratt(&moderate).is_ok());
    }

    #[test]
    fn test_long_flat_chains_parse() {
        let sum = vec!["1"; 300_000].join("+");
        let ast = parse_expression_pratt(&sum).unwrap();
        assert_eq!(ast.nesting_depth(), 2);

        let path = format!("a{}", ".b".repeat(50_000));
        assert_eq!(parse_expression_pratt(&path).unwrap().nesting_depth(), 1);
    }
}
