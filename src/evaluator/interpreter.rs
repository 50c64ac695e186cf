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

//! Tree-walking evaluator

use super::Evaluator;
use super::operations::{evaluate_binary, evaluate_unary};
use super::scope::{CallDepthGuard, Env, Scope, check_nesting_depth};
use crate::ast::{
    ArrowFunctionData, BinaryOpData, BinaryOperator, ExpressionNode, LiteralValue, PostfixStep,
};
use crate::config::EelConfig;
use crate::core::Result;
use crate::model::{Context, EelFunction, EelMap, EelValue, MapKey};
use crate::parser::parse_expression;
use log::trace;
use std::sync::Arc;

/// Evaluates expressions by walking the parsed tree.
///
/// The expression is parsed again on every call; use
/// [`CompilingEvaluator`](crate::CompilingEvaluator) to reuse work across
/// calls.
#[derive(Debug, Clone)]
pub struct InterpretingEvaluator {
    walker: TreeWalker,
}

impl InterpretingEvaluator {
    pub fn new() -> Self {
        Self::with_config(&EelConfig::default())
    }

    pub fn with_config(config: &EelConfig) -> Self {
        Self {
            walker: TreeWalker {
                max_depth: config.max_recursion_depth,
            },
        }
    }

    /// Evaluate an already parsed expression
    pub fn evaluate_expression(
        &self,
        expression: &ExpressionNode,
        context: &Context,
    ) -> Result<EelValue> {
        check_nesting_depth(expression, self.walker.max_depth)?;
        let env = Env::new(context);
        let scope = self.walker.evaluate_node(expression, &env)?;
        Ok(scope.into_value().unwrapped())
    }
}

impl Default for InterpretingEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for InterpretingEvaluator {
    fn evaluate(&self, expression: &str, context: &Context) -> Result<EelValue> {
        trace!("interpreting expression: {}", expression.trim());
        let ast = parse_expression(expression)?;
        self.evaluate_expression(&ast, context)
    }
}

#[derive(Debug, Clone, Copy)]
struct TreeWalker {
    max_depth: usize,
}

impl TreeWalker {
    fn evaluate_node(&self, node: &ExpressionNode, env: &Env) -> Result<Scope> {
        match node {
            ExpressionNode::Literal(literal) => Ok(env.value(literal_value(literal))),

            ExpressionNode::Identifier(name) => Ok(env.lookup(name)),

            ExpressionNode::Path { .. } | ExpressionNode::Index { .. } => {
                self.evaluate_postfix(node, env)
            }

            ExpressionNode::FunctionCall(data) => {
                let args = self.evaluate_arguments(&data.args, env)?;
                env.call_function(&data.name, &args)
            }

            ExpressionNode::MethodCall(_) => self.evaluate_postfix(node, env),

            ExpressionNode::ArrayLiteral(items) => {
                let values = self.evaluate_arguments(items, env)?;
                Ok(env.value(EelValue::list(values)))
            }

            ExpressionNode::ObjectLiteral(entries) => {
                let mut map = EelMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let value = self.evaluate_node(value, env)?.into_value();
                    map.insert(MapKey::from_text(key), value);
                }
                Ok(env.value(EelValue::map(map)))
            }

            ExpressionNode::UnaryOp { op, operand } => {
                let operand = self.evaluate_node(operand, env)?;
                Ok(env.value(evaluate_unary(*op, operand.value())))
            }

            ExpressionNode::BinaryOp(data) => self.evaluate_binary_chain(data, env),

            ExpressionNode::Conditional(data) => {
                let condition = self.evaluate_node(&data.condition, env)?;
                if condition.value().is_truthy() {
                    self.evaluate_node(&data.then_expr, env)
                } else {
                    self.evaluate_node(&data.else_expr, env)
                }
            }

            ExpressionNode::ArrowFunction(data) => Ok(env.value(self.make_closure(data, env))),
        }
    }

    /// `a.b[c].d()` from the root outwards, one step per iteration
    fn evaluate_postfix(&self, node: &ExpressionNode, env: &Env) -> Result<Scope> {
        let Some((root, steps)) = node.postfix_chain() else {
            return self.evaluate_node(node, env);
        };
        let mut target = self.evaluate_node(root, env)?;
        for step in steps {
            target = match step {
                PostfixStep::Property(name) => target.property(name),
                PostfixStep::Index(index) => {
                    let key = self.evaluate_node(index, env)?.into_value();
                    target.index(&key)
                }
                PostfixStep::Method(data) => {
                    let args = self.evaluate_arguments(&data.args, env)?;
                    let result = target.call(&data.method, &args)?;
                    target.call_result(result)
                }
            };
        }
        Ok(target)
    }

    /// Left-deep operator chains run in a loop so `1 + 1 + ... + 1` needs
    /// no recursion per operand
    fn evaluate_binary_chain(&self, data: &BinaryOpData, env: &Env) -> Result<Scope> {
        let (first, operations) = data.chain();
        let mut left = self.evaluate_node(first, env)?;
        for operation in operations {
            left = match operation.op {
                BinaryOperator::And if !left.value().is_truthy() => left,
                BinaryOperator::Or if left.value().is_truthy() => left,
                BinaryOperator::And | BinaryOperator::Or => {
                    self.evaluate_node(&operation.right, env)?
                }
                op => {
                    let right = self.evaluate_node(&operation.right, env)?;
                    env.value(evaluate_binary(op, left.value(), right.value())?)
                }
            };
        }
        Ok(left)
    }

    /// Evaluate call arguments left to right
    fn evaluate_arguments(&self, args: &[ExpressionNode], env: &Env) -> Result<Vec<EelValue>> {
        args.iter()
            .map(|arg| self.evaluate_node(arg, env).map(Scope::into_value))
            .collect()
    }

    /// An arrow function closes over the environment it is created in
    fn make_closure(&self, data: &Arc<ArrowFunctionData>, env: &Env) -> EelValue {
        let walker = *self;
        let data = Arc::clone(data);
        let env = env.clone();
        let names: Arc<[String]> = Arc::from(data.params.clone());
        EelValue::Function(EelFunction::new(move |args: &[EelValue]| {
            let _depth = CallDepthGuard::enter(walker.max_depth)?;
            let frame = env.with_frame(&names, args);
            walker
                .evaluate_node(&data.body, &frame)
                .map(Scope::into_value)
        }))
    }
}

pub(crate) fn literal_value(literal: &LiteralValue) -> EelValue {
    match literal {
        LiteralValue::Boolean(b) => EelValue::Boolean(*b),
        LiteralValue::Integer(i) => EelValue::Integer(*i),
        LiteralValue::Float(f) => EelValue::Float(*f),
        LiteralValue::String(s) => EelValue::String(s.clone()),
    }
}
