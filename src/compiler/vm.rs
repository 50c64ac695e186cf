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

//! Stack-based virtual machine executing compiled expressions
//!
//! The operand stack holds [`Scope`]s rather than bare values so that call
//! protection follows values through the program exactly as it does in the
//! tree-walking evaluator.

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::compiler::bytecode::{Bytecode, CompiledExpression, FunctionIndex, Instruction};
use crate::config::EelConfig;
use crate::core::error_code::EL0108;
use crate::core::{EelError, Result};
use crate::evaluator::operations::{evaluate_binary, evaluate_unary};
use crate::evaluator::scope::{CallDepthGuard, Env, Scope};
use crate::model::{Context, EelFunction, EelMap, EelValue, MapKey};
use log::trace;
use std::sync::Arc;

/// Executes [`CompiledExpression`]s against a context
#[derive(Debug, Clone, Copy)]
pub struct VirtualMachine {
    /// Maximum nesting of arrow-function invocations
    max_depth: usize,
}

impl VirtualMachine {
    pub fn new() -> Self {
        Self::with_config(&EelConfig::default())
    }

    pub fn with_config(config: &EelConfig) -> Self {
        Self {
            max_depth: config.max_recursion_depth,
        }
    }

    /// Run the main program and return the fully unwrapped result
    pub fn run(&self, program: &Arc<CompiledExpression>, context: &Context) -> Result<EelValue> {
        trace!("executing compiled expression: {}", program.source);
        let env = Env::new(context);
        let scope = self.execute(program, &program.main, &env)?;
        Ok(scope.into_value().unwrapped())
    }

    fn execute(
        &self,
        program: &Arc<CompiledExpression>,
        code: &Bytecode,
        env: &Env,
    ) -> Result<Scope> {
        let mut stack = Stack(Vec::with_capacity(code.max_stack_depth));
        let mut ip = 0usize;

        loop {
            let instruction = *code
                .instructions
                .get(ip)
                .ok_or_else(|| malformed(format!("instruction pointer {ip} out of range")))?;
            trace!("{ip:4}: {instruction}");
            let mut next = ip + 1;

            match instruction {
                Instruction::PushConstant(idx) => {
                    stack.push(env.value(code.constant(idx)?.clone()));
                }
                Instruction::Pop => {
                    stack.pop()?;
                }
                Instruction::LoadVariable(idx) => {
                    stack.push(env.lookup(code.name(idx)?));
                }
                Instruction::LoadProperty(idx) => {
                    let target = stack.pop()?;
                    stack.push(target.property(code.name(idx)?));
                }
                Instruction::IndexAccess => {
                    let key = stack.pop()?.into_value();
                    let target = stack.pop()?;
                    stack.push(target.index(&key));
                }
                Instruction::CallFunction(idx, arity) => {
                    let args = stack.pop_values(usize::from(arity))?;
                    stack.push(env.call_function(code.name(idx)?, &args)?);
                }
                Instruction::CallMethod(idx, arity) => {
                    let args = stack.pop_values(usize::from(arity))?;
                    let target = stack.pop()?;
                    let result = target.call(code.name(idx)?, &args)?;
                    stack.push(target.call_result(result));
                }
                Instruction::Add => self.binary(BinaryOperator::Add, &mut stack, env)?,
                Instruction::Subtract => self.binary(BinaryOperator::Subtract, &mut stack, env)?,
                Instruction::Multiply => self.binary(BinaryOperator::Multiply, &mut stack, env)?,
                Instruction::Divide => self.binary(BinaryOperator::Divide, &mut stack, env)?,
                Instruction::Modulo => self.binary(BinaryOperator::Modulo, &mut stack, env)?,
                Instruction::Equal => self.binary(BinaryOperator::Equal, &mut stack, env)?,
                Instruction::NotEqual => self.binary(BinaryOperator::NotEqual, &mut stack, env)?,
                Instruction::LessThan => self.binary(BinaryOperator::LessThan, &mut stack, env)?,
                Instruction::LessThanOrEqual => {
                    self.binary(BinaryOperator::LessThanOrEqual, &mut stack, env)?
                }
                Instruction::GreaterThan => {
                    self.binary(BinaryOperator::GreaterThan, &mut stack, env)?
                }
                Instruction::GreaterThanOrEqual => {
                    self.binary(BinaryOperator::GreaterThanOrEqual, &mut stack, env)?
                }
                Instruction::Not => {
                    let operand = stack.pop()?;
                    stack.push(env.value(evaluate_unary(UnaryOperator::Not, operand.value())));
                }
                Instruction::MakeArray(count) => {
                    let items = stack.pop_values(usize::from(count))?;
                    stack.push(env.value(EelValue::list(items)));
                }
                Instruction::MakeObject(count) => {
                    let parts = stack.pop_values(2 * usize::from(count))?;
                    let mut map = EelMap::with_capacity(usize::from(count));
                    for pair in parts.chunks_exact(2) {
                        let key = pair[0]
                            .as_str()
                            .ok_or_else(|| malformed("object key is not a string".to_string()))?;
                        map.insert(MapKey::from_text(key), pair[1].clone());
                    }
                    stack.push(env.value(EelValue::map(map)));
                }
                Instruction::MakeClosure(idx) => {
                    stack.push(env.value(self.make_closure(program, idx, env)));
                }
                Instruction::Jump(offset) => next = jump_target(ip, offset)?,
                Instruction::JumpIfFalse(offset) => {
                    if !stack.pop()?.value().is_truthy() {
                        next = jump_target(ip, offset)?;
                    }
                }
                Instruction::JumpIfFalseKeep(offset) => {
                    if stack.peek()?.value().is_truthy() {
                        stack.pop()?;
                    } else {
                        next = jump_target(ip, offset)?;
                    }
                }
                Instruction::JumpIfTrueKeep(offset) => {
                    if stack.peek()?.value().is_truthy() {
                        next = jump_target(ip, offset)?;
                    } else {
                        stack.pop()?;
                    }
                }
                Instruction::Return => return stack.pop(),
            }

            ip = next;
        }
    }

    fn binary(&self, op: BinaryOperator, stack: &mut Stack, env: &Env) -> Result<()> {
        let right = stack.pop()?;
        let left = stack.pop()?;
        let value = evaluate_binary(op, left.value(), right.value())?;
        stack.push(env.value(value));
        Ok(())
    }

    /// Closures keep the program alive and run their body in a new frame
    fn make_closure(
        &self,
        program: &Arc<CompiledExpression>,
        index: FunctionIndex,
        env: &Env,
    ) -> EelValue {
        let vm = *self;
        let program = Arc::clone(program);
        let env = env.clone();
        EelValue::Function(EelFunction::new(move |args: &[EelValue]| {
            let _depth = CallDepthGuard::enter(vm.max_depth)?;
            let function = program.function(index)?;
            trace!("invoking arrow function {index} with {} arguments", args.len());
            let frame = env.with_frame(&function.params, args);
            vm.execute(&program, &function.code, &frame)
                .map(Scope::into_value)
        }))
    }
}

impl Default for VirtualMachine {
    fn default() -> Self {
        Self::new()
    }
}

struct Stack(Vec<Scope>);

impl Stack {
    fn push(&mut self, scope: Scope) {
        self.0.push(scope);
    }

    fn pop(&mut self) -> Result<Scope> {
        self.0.pop().ok_or_else(|| malformed("stack underflow".to_string()))
    }

    fn peek(&self) -> Result<&Scope> {
        self.0.last().ok_or_else(|| malformed("stack underflow".to_string()))
    }

    /// Pop `count` values, returned in push order
    fn pop_values(&mut self, count: usize) -> Result<Vec<EelValue>> {
        let start = self
            .0
            .len()
            .checked_sub(count)
            .ok_or_else(|| malformed("stack underflow".to_string()))?;
        Ok(self.0.drain(start..).map(Scope::into_value).collect())
    }
}

fn jump_target(ip: usize, offset: i16) -> Result<usize> {
    ip.checked_add_signed(isize::from(offset))
        .ok_or_else(|| malformed(format!("jump from {ip} by {offset} out of range")))
}

fn malformed(message: String) -> EelError {
    EelError::evaluation_error(EL0108, format!("Malformed bytecode: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ExpressionCompiler;
    use crate::compiler::bytecode::BytecodeBuilder;
    use crate::core::error_code::{EL0104, EL0105};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(expression: &str, context: serde_json::Value) -> Result<EelValue> {
        let program = Arc::new(ExpressionCompiler::new().compile(expression)?);
        VirtualMachine::new().run(&program, &Context::new(context))
    }

    #[test]
    fn test_arithmetic_and_logic() {
        let ctx = json!({"a": 2, "b": 0, "s": "str"});
        assert_eq!(run("a * 3 + 1", ctx.clone()).unwrap(), EelValue::Integer(7));
        assert_eq!(run("b || s", ctx.clone()).unwrap(), EelValue::from("str"));
        assert_eq!(run("b && s", ctx.clone()).unwrap(), EelValue::Integer(0));
        assert_eq!(run("a > 1 ? 'big' : 'small'", ctx.clone()).unwrap(), EelValue::from("big"));
        assert_eq!(run("a / b", ctx).unwrap_err().error_code(), &EL0104);
    }

    #[test]
    fn test_literals() {
        let result = run("{foo: [1, a], 'bar': !a}", json!({"a": "x"})).unwrap();
        assert_eq!(result.to_json(), json!({"foo": [1, "x"], "bar": false}));
    }

    #[test]
    fn test_closures_capture_frames() {
        let ctx = Context::new(EelValue::from_iter([(
            "call",
            EelValue::function(|args: &[EelValue]| match args {
                [EelValue::Function(f), rest @ ..] => f.call(rest),
                _ => Ok(EelValue::Null),
            }),
        )]));
        let program = Arc::new(
            ExpressionCompiler::new()
                .compile("call((a) => call((b) => a + b, 2), 40)")
                .unwrap(),
        );
        let result = VirtualMachine::new().run(&program, &ctx).unwrap();
        assert_eq!(result, EelValue::Integer(42));
    }

    #[test]
    fn test_closure_recursion_is_bounded() {
        let ctx = Context::new(EelValue::from_iter([(
            "fix",
            EelValue::function(|args: &[EelValue]| match args {
                [EelValue::Function(f)] => f.call(args),
                _ => Ok(EelValue::Null),
            }),
        )]));
        let program = Arc::new(
            ExpressionCompiler::new()
                .compile("fix(self => self(self))")
                .unwrap(),
        );
        let err = VirtualMachine::new().run(&program, &ctx).unwrap_err();
        assert_eq!(err.error_code(), &EL0105);
    }

    #[test]
    fn test_malformed_program_is_an_error() {
        let mut builder = BytecodeBuilder::new();
        builder.emit(Instruction::Add);
        let program = Arc::new(CompiledExpression {
            source: String::new(),
            main: builder.finish(),
            functions: Vec::new(),
        });
        let err = VirtualMachine::new().run(&program, &Context::empty()).unwrap_err();
        assert_eq!(err.error_code(), &EL0108);
    }
}
