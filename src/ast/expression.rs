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

//! Expression AST nodes

use super::operator::{BinaryOperator, UnaryOperator};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Arguments of a call. Most calls take four arguments or fewer.
pub type Arguments = SmallVec<[ExpressionNode; 4]>;

/// AST node representing an Eel expression
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    /// Literal value (number, string, boolean)
    Literal(LiteralValue),

    /// Identifier resolved against the context (e.g., `foo`)
    Identifier(String),

    /// Object path navigation (e.g., `foo.bar`)
    Path {
        /// Base expression
        base: Box<ExpressionNode>,
        /// Property name
        name: String,
    },

    /// Offset access (e.g., `foo[0]`, `foo[bar.key]`)
    Index {
        /// Base expression
        base: Box<ExpressionNode>,
        /// Offset expression
        index: Box<ExpressionNode>,
    },

    /// First-level function call (e.g., `count(items)`)
    FunctionCall(Box<FunctionCallData>),

    /// Method call on an object path (e.g., `String.substr(s, 1)`)
    MethodCall(Box<MethodCallData>),

    /// Array literal (e.g., `[1, 2, 3]`)
    ArrayLiteral(Vec<ExpressionNode>),

    /// Object literal (e.g., `{foo: 1, 'bar': 2}`)
    ObjectLiteral(Vec<(String, ExpressionNode)>),

    /// Unary operation
    UnaryOp {
        /// The operator
        op: UnaryOperator,
        /// The operand
        operand: Box<ExpressionNode>,
    },

    /// Binary operation
    BinaryOp(Box<BinaryOpData>),

    /// Ternary conditional (e.g., `a ? b : c`)
    Conditional(Box<ConditionalData>),

    /// Arrow function (e.g., `(a, b) => a + b`)
    ArrowFunction(Arc<ArrowFunctionData>),
}

/// Function call data
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallData {
    /// Function name
    pub name: String,
    /// Arguments
    pub args: Arguments,
}

/// Method call data
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCallData {
    /// Target expression
    pub base: ExpressionNode,
    /// Method name
    pub method: String,
    /// Arguments
    pub args: Arguments,
}

/// Binary operation data
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOpData {
    /// The operator
    pub op: BinaryOperator,
    /// Left operand
    pub left: ExpressionNode,
    /// Right operand
    pub right: ExpressionNode,
}

/// Conditional expression data
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalData {
    /// Condition
    pub condition: ExpressionNode,
    /// Value when the condition is truthy
    pub then_expr: ExpressionNode,
    /// Value when the condition is falsy
    pub else_expr: ExpressionNode,
}

/// Arrow function data, shared by every closure created from it
#[derive(Debug, Clone, PartialEq)]
pub struct ArrowFunctionData {
    /// Parameter names
    pub params: Vec<String>,
    /// Function body
    pub body: ExpressionNode,
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Boolean literal
    Boolean(bool),
    /// Integer literal
    Integer(i64),
    /// Floating point literal
    Float(f64),
    /// String literal (escapes already resolved)
    String(String),
}

impl ExpressionNode {
    /// Create a literal expression
    pub fn literal(value: LiteralValue) -> Self {
        Self::Literal(value)
    }

    /// Create an identifier expression
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    /// Create a path expression
    pub fn path(base: ExpressionNode, name: impl Into<String>) -> Self {
        Self::Path {
            base: Box::new(base),
            name: name.into(),
        }
    }

    /// Create an index expression
    pub fn index(base: ExpressionNode, index: ExpressionNode) -> Self {
        Self::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    /// Create a function call expression
    pub fn function_call(name: impl Into<String>, args: impl Into<Arguments>) -> Self {
        Self::FunctionCall(Box::new(FunctionCallData {
            name: name.into(),
            args: args.into(),
        }))
    }

    /// Create a method call expression
    pub fn method_call(
        base: ExpressionNode,
        method: impl Into<String>,
        args: impl Into<Arguments>,
    ) -> Self {
        Self::MethodCall(Box::new(MethodCallData {
            base,
            method: method.into(),
            args: args.into(),
        }))
    }

    /// Create a binary operation expression
    pub fn binary_op(op: BinaryOperator, left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::BinaryOp(Box::new(BinaryOpData { op, left, right }))
    }

    /// Create a unary operation expression
    pub fn unary_op(op: UnaryOperator, operand: ExpressionNode) -> Self {
        Self::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a conditional expression
    pub fn conditional(
        condition: ExpressionNode,
        then_expr: ExpressionNode,
        else_expr: ExpressionNode,
    ) -> Self {
        Self::Conditional(Box::new(ConditionalData {
            condition,
            then_expr,
            else_expr,
        }))
    }

    /// Create an arrow function expression
    pub fn arrow_function(params: Vec<String>, body: ExpressionNode) -> Self {
        Self::ArrowFunction(Arc::new(ArrowFunctionData { params, body }))
    }

    /// Check if this is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Nesting depth of the tree (a leaf has depth 1).
    ///
    /// The left operand of a binary operation and the base of a path, index
    /// or method call sit at the depth of their parent: evaluators walk those
    /// chains in a loop, so `1 + 2 + 3` and `a.b.c` both have depth 2.
    pub fn nesting_depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1usize)];
        while let Some((node, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            let inner = depth + 1;
            match node {
                Self::Literal(_) | Self::Identifier(_) => {}
                Self::Path { base, .. } => pending.push((&**base, depth)),
                Self::Index { base, index } => {
                    pending.push((&**base, depth));
                    pending.push((&**index, inner));
                }
                Self::FunctionCall(data) => pending.extend(data.args.iter().map(|a| (a, inner))),
                Self::MethodCall(data) => {
                    pending.push((&data.base, depth));
                    pending.extend(data.args.iter().map(|a| (a, inner)));
                }
                Self::ArrayLiteral(items) => pending.extend(items.iter().map(|i| (i, inner))),
                Self::ObjectLiteral(entries) => {
                    pending.extend(entries.iter().map(|(_, v)| (v, inner)))
                }
                Self::UnaryOp { operand, .. } => pending.push((&**operand, inner)),
                Self::BinaryOp(data) => {
                    pending.push((&data.left, depth));
                    pending.push((&data.right, inner));
                }
                Self::Conditional(data) => {
                    pending.push((&data.condition, inner));
                    pending.push((&data.then_expr, inner));
                    pending.push((&data.else_expr, inner));
                }
                Self::ArrowFunction(data) => pending.push((&data.body, inner)),
            }
        }
        deepest
    }

    /// Split `a.b[c].d()` into its root expression and the steps applied to
    /// it, in evaluation order. `None` when this is not a postfix expression.
    pub fn postfix_chain(&self) -> Option<(&ExpressionNode, Vec<PostfixStep<'_>>)> {
        let mut steps = Vec::new();
        let mut node = self;
        loop {
            match node {
                Self::Path { base, name } => {
                    steps.push(PostfixStep::Property(name));
                    node = &**base;
                }
                Self::Index { base, index } => {
                    steps.push(PostfixStep::Index(&**index));
                    node = &**base;
                }
                Self::MethodCall(data) => {
                    steps.push(PostfixStep::Method(data));
                    node = &data.base;
                }
                _ => break,
            }
        }
        if steps.is_empty() {
            return None;
        }
        steps.reverse();
        Some((node, steps))
    }

    /// Move every child node into `out`, leaving cheap placeholders behind
    fn take_children(&mut self, out: &mut Vec<ExpressionNode>) {
        fn hollow(node: &mut ExpressionNode) -> ExpressionNode {
            std::mem::replace(node, ExpressionNode::Literal(LiteralValue::Boolean(false)))
        }
        match self {
            Self::Literal(_) | Self::Identifier(_) => {}
            Self::Path { base, .. } => out.push(hollow(base)),
            Self::Index { base, index } => {
                out.push(hollow(base));
                out.push(hollow(index));
            }
            Self::FunctionCall(data) => out.extend(data.args.drain(..)),
            Self::MethodCall(data) => {
                out.push(hollow(&mut data.base));
                out.extend(data.args.drain(..));
            }
            Self::ArrayLiteral(items) => out.append(items),
            Self::ObjectLiteral(entries) => out.extend(entries.drain(..).map(|(_, v)| v)),
            Self::UnaryOp { operand, .. } => out.push(hollow(operand)),
            Self::BinaryOp(data) => {
                out.push(hollow(&mut data.left));
                out.push(hollow(&mut data.right));
            }
            Self::Conditional(data) => {
                out.push(hollow(&mut data.condition));
                out.push(hollow(&mut data.then_expr));
                out.push(hollow(&mut data.else_expr));
            }
            // Bodies shared with live closures are dropped by their last owner
            Self::ArrowFunction(data) => {
                if let Some(data) = Arc::get_mut(data) {
                    out.push(hollow(&mut data.body));
                }
            }
        }
    }
}

impl BinaryOpData {
    /// Flatten the left-deep chain ending in this operation: `1 + 2 - 3`
    /// gives the operand `1` and the operations `+ 2`, `- 3` in order.
    pub fn chain(&self) -> (&ExpressionNode, Vec<&BinaryOpData>) {
        let mut operations = vec![self];
        let mut first = &self.left;
        while let ExpressionNode::BinaryOp(data) = first {
            operations.push(data);
            first = &data.left;
        }
        operations.reverse();
        (first, operations)
    }
}

/// One step of a postfix chain such as `a.b[c].d()`
#[derive(Debug, Clone, Copy)]
pub enum PostfixStep<'a> {
    /// `.name`
    Property(&'a str),
    /// `[index]`
    Index(&'a ExpressionNode),
    /// `.method(args)`
    Method(&'a MethodCallData),
}

/// Long operator chains nest thousands of boxes deep; unlink them in a loop
impl Drop for ExpressionNode {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut node) = pending.pop() {
            node.take_children(&mut pending);
        }
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    if s.contains('\'') && !s.contains('"') {
        write!(f, "\"{s}\"")
    } else {
        write!(f, "'{}'", s.replace('\'', "\\'"))
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[ExpressionNode]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Boolean(b) => write!(f, "{b}"),
            LiteralValue::Integer(i) => write!(f, "{i}"),
            LiteralValue::Float(x) => write!(f, "{x:?}"),
            LiteralValue::String(s) => write_quoted(f, s),
        }
    }
}

/// Canonical source form; binary, conditional and arrow expressions are
/// fully parenthesised
impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(lit) => write!(f, "{lit}"),
            Self::Identifier(name) => write!(f, "{name}"),
            Self::Path { .. } | Self::Index { .. } | Self::MethodCall(_) => {
                let Some((root, steps)) = self.postfix_chain() else {
                    return Ok(());
                };
                write!(f, "{root}")?;
                for step in steps {
                    match step {
                        PostfixStep::Property(name) => write!(f, ".{name}")?,
                        PostfixStep::Index(index) => write!(f, "[{index}]")?,
                        PostfixStep::Method(data) => {
                            write!(f, ".{}(", data.method)?;
                            write_args(f, &data.args)?;
                            write!(f, ")")?;
                        }
                    }
                }
                Ok(())
            }
            Self::FunctionCall(data) => {
                write!(f, "{}(", data.name)?;
                write_args(f, &data.args)?;
                write!(f, ")")
            }
            Self::ArrayLiteral(items) => {
                write!(f, "[")?;
                write_args(f, items)?;
                write!(f, "]")
            }
            Self::ObjectLiteral(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if is_plain_identifier(key) {
                        write!(f, "{key}")?;
                    } else {
                        write_quoted(f, key)?;
                    }
                    write!(f, ": {value}")?;
                }
                write!(f, "}}")
            }
            Self::UnaryOp { op, operand } => write!(f, "{op}{operand}"),
            Self::BinaryOp(data) => {
                let (first, operations) = data.chain();
                for _ in &operations {
                    write!(f, "(")?;
                }
                write!(f, "{first}")?;
                for operation in operations {
                    write!(f, " {} {})", operation.op, operation.right)?;
                }
                Ok(())
            }
            Self::Conditional(data) => write!(
                f,
                "({} ? {} : {})",
                data.condition, data.then_expr, data.else_expr
            ),
            Self::ArrowFunction(data) => write!(f, "(({}) => {})", data.params.join(", "), data.body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_canonical_form() {
        let expr = ExpressionNode::binary_op(
            BinaryOperator::Add,
            ExpressionNode::literal(LiteralValue::Integer(1)),
            ExpressionNode::binary_op(
                BinaryOperator::Multiply,
                ExpressionNode::path(ExpressionNode::identifier("a"), "b"),
                ExpressionNode::literal(LiteralValue::Float(2.0)),
            ),
        );
        assert_eq!(expr.to_string(), "(1 + (a.b * 2.0))");
    }

    #[test]
    fn test_display_literals_and_calls() {
        let call = ExpressionNode::method_call(
            ExpressionNode::identifier("String"),
            "substr",
            vec![
                ExpressionNode::literal(LiteralValue::String("it's".to_string())),
                ExpressionNode::literal(LiteralValue::Integer(-1)),
            ],
        );
        assert_eq!(call.to_string(), "String.substr(\"it's\", -1)");

        let object = ExpressionNode::ObjectLiteral(vec![
            ("foo".to_string(), ExpressionNode::identifier("x")),
            ("two words".to_string(), ExpressionNode::ArrayLiteral(vec![])),
        ]);
        assert_eq!(object.to_string(), "{foo: x, 'two words': []}");
    }

    fn int(i: i64) -> ExpressionNode {
        ExpressionNode::literal(LiteralValue::Integer(i))
    }

    fn left_chain(terms: i64) -> ExpressionNode {
        (1..terms).fold(int(0), |left, i| {
            ExpressionNode::binary_op(BinaryOperator::Add, left, int(i))
        })
    }

    #[test]
    fn test_nesting_depth() {
        let leaf = ExpressionNode::identifier("a");
        assert_eq!(leaf.nesting_depth(), 1);
        let nested = ExpressionNode::unary_op(
            UnaryOperator::Not,
            ExpressionNode::index(leaf.clone(), ExpressionNode::path(leaf, "b")),
        );
        assert_eq!(nested.nesting_depth(), 3);

        let right_nested = ExpressionNode::binary_op(
            BinaryOperator::Add,
            int(1),
            ExpressionNode::binary_op(BinaryOperator::Add, int(2), int(3)),
        );
        assert_eq!(right_nested.nesting_depth(), 3);
    }

    #[test]
    fn test_left_chains_stay_shallow() {
        assert_eq!(left_chain(1000).nesting_depth(), 2);

        let path = (0..1000).fold(ExpressionNode::identifier("a"), |base, _| {
            ExpressionNode::path(base, "b")
        });
        assert_eq!(path.nesting_depth(), 1);
        let (root, steps) = path.postfix_chain().unwrap();
        assert_eq!(root, &ExpressionNode::identifier("a"));
        assert_eq!(steps.len(), 1000);
    }

    #[test]
    fn test_chain_order() {
        let (first, operations) = match &left_chain(4) {
            ExpressionNode::BinaryOp(data) => {
                let (first, operations) = data.chain();
                (first.clone(), operations.iter().map(|op| op.right.to_string()).collect::<Vec<_>>())
            }
            other => panic!("not a binary operation: {other}"),
        };
        assert_eq!(first, int(0));
        assert_eq!(operations, vec!["1", "2", "3"]);
        assert_eq!(left_chain(4).to_string(), "(((0 + 1) + 2) + 3)");
    }

    #[test]
    fn test_long_chain_displays_and_drops() {
        let chain = left_chain(200_000);
        let text = chain.to_string();
        assert!(text.starts_with("((("));
        assert!(text.ends_with(" + 199999)"));
        drop(chain);
    }
}
