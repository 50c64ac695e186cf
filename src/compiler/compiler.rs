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

//! Expression compiler for Eel expressions
//!
//! Translates a parsed expression into bytecode. With `optimize` enabled,
//! literal-only subexpressions are folded using the same operator semantics
//! the VM applies at runtime, and branches decided by a constant condition
//! are compiled alone.

use crate::ast::{
    ArrowFunctionData, BinaryOpData, BinaryOperator, ConditionalData, ExpressionNode,
    FunctionCallData, MethodCallData, PostfixStep, UnaryOperator,
};
use crate::compiler::bytecode::{
    BytecodeBuilder, CompiledExpression, FunctionIndex, FunctionProto, Instruction,
};
use crate::config::EelConfig;
use crate::core::error_code::EL0108;
use crate::core::{EelError, Result};
use crate::evaluator::literal_value;
use crate::evaluator::operations::{evaluate_binary, evaluate_unary};
use crate::evaluator::scope::check_nesting_depth;
use crate::model::EelValue;
use crate::parser::parse_expression;
use log::debug;
use std::sync::Arc;

/// Expression compiler that converts AST to bytecode
#[derive(Debug, Clone)]
pub struct ExpressionCompiler {
    /// Fold constant subexpressions
    optimize: bool,
    /// Maximum expression tree depth
    max_depth: usize,
}

impl ExpressionCompiler {
    pub fn new() -> Self {
        Self::with_config(&EelConfig::default())
    }

    pub fn with_config(config: &EelConfig) -> Self {
        Self {
            optimize: config.optimize,
            max_depth: config.max_recursion_depth,
        }
    }

    /// Parse and compile an expression
    pub fn compile(&self, source: &str) -> Result<CompiledExpression> {
        let source = source.trim();
        let ast = parse_expression(source)?;
        self.compile_ast(&ast, source)
    }

    /// Compile an already parsed expression
    pub fn compile_ast(&self, ast: &ExpressionNode, source: &str) -> Result<CompiledExpression> {
        check_nesting_depth(ast, self.max_depth)?;

        let mut functions = Vec::new();
        let main = {
            let mut emitter = Emitter {
                optimize: self.optimize,
                functions: &mut functions,
                builder: BytecodeBuilder::new(),
            };
            emitter.compile_expression(ast)?;
            emitter.builder.emit(Instruction::Return);
            emitter.builder.finish()
        };

        debug!(
            "compiled '{}' to {} instructions and {} functions",
            source,
            main.instructions.len(),
            functions.len()
        );

        Ok(CompiledExpression {
            source: source.to_string(),
            main,
            functions,
        })
    }
}

impl Default for ExpressionCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Emits the code of one program; arrow function bodies get their own
/// emitter sharing the function table
struct Emitter<'a> {
    optimize: bool,
    functions: &'a mut Vec<FunctionProto>,
    builder: BytecodeBuilder,
}

impl Emitter<'_> {
    fn compile_expression(&mut self, expression: &ExpressionNode) -> Result<()> {
        // Operator chains fold their own constant prefix
        let foldable = !expression.is_literal() && !matches!(expression, ExpressionNode::BinaryOp(_));
        if self.optimize && foldable {
            if let Some(value) = fold(expression) {
                return self.builder.push_constant(value);
            }
        }

        match expression {
            ExpressionNode::Literal(literal) => self.builder.push_constant(literal_value(literal)),

            ExpressionNode::Identifier(name) => {
                let index = self.builder.add_name(name)?;
                self.builder.emit(Instruction::LoadVariable(index));
                Ok(())
            }

            ExpressionNode::Path { .. } | ExpressionNode::Index { .. } | ExpressionNode::MethodCall(_) => {
                self.compile_postfix(expression)
            }

            ExpressionNode::FunctionCall(data) => self.compile_function_call(data),

            ExpressionNode::ArrayLiteral(items) => {
                let count = u16::try_from(items.len()).map_err(|_| too_many("array items"))?;
                for item in items {
                    self.compile_expression(item)?;
                }
                self.builder.emit(Instruction::MakeArray(count));
                Ok(())
            }

            ExpressionNode::ObjectLiteral(entries) => {
                let count = u16::try_from(entries.len()).map_err(|_| too_many("object entries"))?;
                for (key, value) in entries {
                    self.builder.push_constant(EelValue::String(key.clone()))?;
                    self.compile_expression(value)?;
                }
                self.builder.emit(Instruction::MakeObject(count));
                Ok(())
            }

            ExpressionNode::UnaryOp { op, operand } => {
                self.compile_expression(operand)?;
                match op {
                    UnaryOperator::Not => self.builder.emit(Instruction::Not),
                };
                Ok(())
            }

            ExpressionNode::BinaryOp(data) => self.compile_binary_chain(data),
            ExpressionNode::Conditional(data) => self.compile_conditional(data),
            ExpressionNode::ArrowFunction(data) => self.compile_arrow_function(data),
        }
    }

    /// Compile a left-deep operator chain in one pass. With `optimize`,
    /// the longest constant prefix of the chain becomes a single constant.
    fn compile_binary_chain(&mut self, data: &BinaryOpData) -> Result<()> {
        let (first, operations) = data.chain();
        let mut rest = &operations[..];

        let mut folded = None;
        if self.optimize {
            if let Some(mut value) = fold(first) {
                while let Some((operation, tail)) = rest.split_first() {
                    match fold_operation(operation, value.clone()) {
                        Some(next) => value = next,
                        None => break,
                    }
                    rest = tail;
                }
                folded = Some(value);
            }
        }
        if folded.is_none() {
            self.compile_expression(first)?;
        }

        for operation in rest {
            let left = folded.take();
            let Some(instruction) = operator_instruction(operation.op) else {
                self.compile_logical(operation, left)?;
                continue;
            };
            if let Some(left) = left {
                self.builder.push_constant(left)?;
            }
            self.compile_expression(&operation.right)?;
            self.builder.emit(instruction);
        }

        match folded {
            Some(value) => self.builder.push_constant(value),
            None => Ok(()),
        }
    }

    /// `&&` and `||` keep the deciding operand on the stack. A constant left
    /// operand that did not fold the whole operation never short-circuits,
    /// so only the right side is compiled.
    fn compile_logical(&mut self, operation: &BinaryOpData, left: Option<EelValue>) -> Result<()> {
        if left.is_some() {
            return self.compile_expression(&operation.right);
        }
        let jump = if operation.op == BinaryOperator::And {
            self.builder.emit_jump(Instruction::JumpIfFalseKeep(0))
        } else {
            self.builder.emit_jump(Instruction::JumpIfTrueKeep(0))
        };
        self.compile_expression(&operation.right)?;
        self.builder.patch_jump(jump)
    }

    /// Root first, then each step; method targets precede their arguments
    fn compile_postfix(&mut self, expression: &ExpressionNode) -> Result<()> {
        let Some((root, steps)) = expression.postfix_chain() else {
            return self.compile_expression(expression);
        };
        self.compile_expression(root)?;
        for step in steps {
            match step {
                PostfixStep::Property(name) => {
                    let index = self.builder.add_name(name)?;
                    self.builder.emit(Instruction::LoadProperty(index));
                }
                PostfixStep::Index(index) => {
                    self.compile_expression(index)?;
                    self.builder.emit(Instruction::IndexAccess);
                }
                PostfixStep::Method(data) => self.compile_method_arguments(data)?,
            }
        }
        Ok(())
    }

    fn compile_conditional(&mut self, data: &ConditionalData) -> Result<()> {
        if self.optimize {
            if let Some(condition) = fold(&data.condition) {
                let branch = if condition.is_truthy() {
                    &data.then_expr
                } else {
                    &data.else_expr
                };
                return self.compile_expression(branch);
            }
        }

        self.compile_expression(&data.condition)?;
        let else_jump = self.builder.emit_jump(Instruction::JumpIfFalse(0));
        self.compile_expression(&data.then_expr)?;
        let end_jump = self.builder.emit_jump(Instruction::Jump(0));
        self.builder.patch_jump(else_jump)?;
        self.compile_expression(&data.else_expr)?;
        self.builder.patch_jump(end_jump)
    }

    fn compile_function_call(&mut self, data: &FunctionCallData) -> Result<()> {
        let arity = u8::try_from(data.args.len()).map_err(|_| too_many("arguments"))?;
        for arg in &data.args {
            self.compile_expression(arg)?;
        }
        let index = self.builder.add_name(&data.name)?;
        self.builder.emit(Instruction::CallFunction(index, arity));
        Ok(())
    }

    /// Arguments left to right, with the target already on the stack
    fn compile_method_arguments(&mut self, data: &MethodCallData) -> Result<()> {
        let arity = u8::try_from(data.args.len()).map_err(|_| too_many("arguments"))?;
        for arg in &data.args {
            self.compile_expression(arg)?;
        }
        let index = self.builder.add_name(&data.method)?;
        self.builder.emit(Instruction::CallMethod(index, arity));
        Ok(())
    }

    fn compile_arrow_function(&mut self, data: &ArrowFunctionData) -> Result<()> {
        let code = {
            let mut body = Emitter {
                optimize: self.optimize,
                functions: &mut *self.functions,
                builder: BytecodeBuilder::new(),
            };
            body.compile_expression(&data.body)?;
            body.builder.emit(Instruction::Return);
            body.builder.finish()
        };

        self.functions.push(FunctionProto {
            params: Arc::from(data.params.clone()),
            code,
        });
        let index = FunctionIndex::try_from(self.functions.len() - 1)
            .map_err(|_| too_many("arrow functions"))?;
        self.builder.emit(Instruction::MakeClosure(index));
        Ok(())
    }
}

/// Value of a subexpression made of literals and operators only. `None`
/// when it depends on the context or when evaluating it fails, so runtime
/// errors still surface at runtime.
fn fold(expression: &ExpressionNode) -> Option<EelValue> {
    match expression {
        ExpressionNode::Literal(literal) => Some(literal_value(literal)),
        ExpressionNode::UnaryOp { op, operand } => Some(evaluate_unary(*op, &fold(operand)?)),
        ExpressionNode::BinaryOp(data) => {
            let (first, operations) = data.chain();
            operations
                .into_iter()
                .try_fold(fold(first)?, |left, operation| fold_operation(operation, left))
        }
        ExpressionNode::Conditional(data) => {
            if fold(&data.condition)?.is_truthy() {
                fold(&data.then_expr)
            } else {
                fold(&data.else_expr)
            }
        }
        _ => None,
    }
}

/// Apply one operation of a chain to an already folded left operand
fn fold_operation(operation: &BinaryOpData, left: EelValue) -> Option<EelValue> {
    match operation.op {
        BinaryOperator::And if !left.is_truthy() => Some(left),
        BinaryOperator::Or if left.is_truthy() => Some(left),
        BinaryOperator::And | BinaryOperator::Or => fold(&operation.right),
        op => evaluate_binary(op, &left, &fold(&operation.right)?).ok(),
    }
}

/// Instruction applying a non-logical operator to the two topmost values
fn operator_instruction(op: BinaryOperator) -> Option<Instruction> {
    Some(match op {
        BinaryOperator::Add => Instruction::Add,
        BinaryOperator::Subtract => Instruction::Subtract,
        BinaryOperator::Multiply => Instruction::Multiply,
        BinaryOperator::Divide => Instruction::Divide,
        BinaryOperator::Modulo => Instruction::Modulo,
        BinaryOperator::Equal => Instruction::Equal,
        BinaryOperator::NotEqual => Instruction::NotEqual,
        BinaryOperator::LessThan => Instruction::LessThan,
        BinaryOperator::LessThanOrEqual => Instruction::LessThanOrEqual,
        BinaryOperator::GreaterThan => Instruction::GreaterThan,
        BinaryOperator::GreaterThanOrEqual => Instruction::GreaterThanOrEqual,
        BinaryOperator::And | BinaryOperator::Or => return None,
    })
}

fn too_many(what: &str) -> EelError {
    EelError::evaluation_error(EL0108, format!("Expression has too many {what} to compile"))
}
