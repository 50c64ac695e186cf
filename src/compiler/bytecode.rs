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

//! Bytecode instruction set for Eel expressions
//!
//! A stack-based instruction set. Every compiled expression is a main
//! program plus one program per arrow function it contains.

use crate::core::error_code::EL0108;
use crate::core::{EelError, Result};
use crate::model::EelValue;
use std::fmt::{self, Write as _};
use std::sync::Arc;

/// Index into the constant pool
pub type ConstantIndex = u16;

/// Index into the name pool (identifiers, properties, methods)
pub type NameIndex = u16;

/// Index into the function table of a compiled expression
pub type FunctionIndex = u16;

/// Bytecode instruction
///
/// Jump offsets are relative to the position of the jump instruction itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    // === Stack Operations ===
    /// Push a constant value onto the stack
    /// Stack: [] -> [value]
    PushConstant(ConstantIndex),

    /// Discard the top of the stack
    /// Stack: [value] -> []
    Pop,

    // === Name Resolution ===
    /// Resolve a first-level identifier (arrow parameter or context entry)
    /// Stack: [] -> [value]
    LoadVariable(NameIndex),

    /// Property access
    /// Stack: [object] -> [property_value]
    LoadProperty(NameIndex),

    /// Offset access
    /// Stack: [object, key] -> [value]
    IndexAccess,

    // === Calls ===
    /// Call a first-level function with `arity` arguments
    /// Stack: [arg1, ..., argN] -> [result]
    CallFunction(NameIndex, u8),

    /// Call a method on an object with `arity` arguments
    /// Stack: [object, arg1, ..., argN] -> [result]
    CallMethod(NameIndex, u8),

    // === Arithmetic ===
    /// Stack: [left, right] -> [left + right]
    Add,
    /// Stack: [left, right] -> [left - right]
    Subtract,
    /// Stack: [left, right] -> [left * right]
    Multiply,
    /// Stack: [left, right] -> [left / right]
    Divide,
    /// Stack: [left, right] -> [left % right]
    Modulo,

    // === Comparison ===
    /// Stack: [left, right] -> [left == right]
    Equal,
    /// Stack: [left, right] -> [left != right]
    NotEqual,
    /// Stack: [left, right] -> [left < right]
    LessThan,
    /// Stack: [left, right] -> [left <= right]
    LessThanOrEqual,
    /// Stack: [left, right] -> [left > right]
    GreaterThan,
    /// Stack: [left, right] -> [left >= right]
    GreaterThanOrEqual,

    /// Logical negation
    /// Stack: [value] -> [!value]
    Not,

    // === Literals ===
    /// Build an array from the top `count` values
    /// Stack: [item1, ..., itemN] -> [array]
    MakeArray(u16),

    /// Build an ordered map from `count` key/value pairs
    /// Stack: [key1, value1, ..., keyN, valueN] -> [map]
    MakeObject(u16),

    /// Create a closure over the current environment
    /// Stack: [] -> [function]
    MakeClosure(FunctionIndex),

    // === Control Flow ===
    /// Unconditional jump
    Jump(i16),

    /// Jump if the popped value is falsy
    /// Stack: [condition] -> []
    JumpIfFalse(i16),

    /// Jump keeping the value if it is falsy, pop it otherwise (`&&`)
    /// Stack: [value] -> [value] | []
    JumpIfFalseKeep(i16),

    /// Jump keeping the value if it is truthy, pop it otherwise (`||`)
    /// Stack: [value] -> [value] | []
    JumpIfTrueKeep(i16),

    /// Return the top of the stack
    /// Stack: [result] -> [result] (VM stops)
    Return,
}

impl Instruction {
    /// Get the stack effect of this instruction (positive = pushes, negative = pops).
    /// The keeping jumps report the effect of the fall-through path.
    pub fn stack_effect(&self) -> i32 {
        match self {
            Self::PushConstant(_) | Self::LoadVariable(_) | Self::MakeClosure(_) => 1,

            Self::LoadProperty(_) | Self::Not | Self::Jump(_) | Self::Return => 0,

            Self::Pop
            | Self::IndexAccess
            | Self::Add
            | Self::Subtract
            | Self::Multiply
            | Self::Divide
            | Self::Modulo
            | Self::Equal
            | Self::NotEqual
            | Self::LessThan
            | Self::LessThanOrEqual
            | Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::JumpIfFalse(_)
            | Self::JumpIfFalseKeep(_)
            | Self::JumpIfTrueKeep(_) => -1,

            Self::CallFunction(_, arity) => 1 - i32::from(*arity),
            Self::CallMethod(_, arity) => -i32::from(*arity),
            Self::MakeArray(count) => 1 - i32::from(*count),
            Self::MakeObject(count) => 1 - 2 * i32::from(*count),
        }
    }

    /// Jump offset of control flow instructions
    pub fn jump_offset(&self) -> Option<i16> {
        match self {
            Self::Jump(offset)
            | Self::JumpIfFalse(offset)
            | Self::JumpIfFalseKeep(offset)
            | Self::JumpIfTrueKeep(offset) => Some(*offset),
            _ => None,
        }
    }

    fn with_offset(self, offset: i16) -> Self {
        match self {
            Self::Jump(_) => Self::Jump(offset),
            Self::JumpIfFalse(_) => Self::JumpIfFalse(offset),
            Self::JumpIfFalseKeep(_) => Self::JumpIfFalseKeep(offset),
            Self::JumpIfTrueKeep(_) => Self::JumpIfTrueKeep(offset),
            other => other,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PushConstant(idx) => write!(f, "PUSH_CONST {idx}"),
            Self::Pop => write!(f, "POP"),
            Self::LoadVariable(idx) => write!(f, "LOAD_VAR {idx}"),
            Self::LoadProperty(idx) => write!(f, "LOAD_PROP {idx}"),
            Self::IndexAccess => write!(f, "INDEX"),
            Self::CallFunction(idx, arity) => write!(f, "CALL {idx} {arity}"),
            Self::CallMethod(idx, arity) => write!(f, "CALL_METHOD {idx} {arity}"),
            Self::Add => write!(f, "ADD"),
            Self::Subtract => write!(f, "SUB"),
            Self::Multiply => write!(f, "MUL"),
            Self::Divide => write!(f, "DIV"),
            Self::Modulo => write!(f, "MOD"),
            Self::Equal => write!(f, "EQ"),
            Self::NotEqual => write!(f, "NE"),
            Self::LessThan => write!(f, "LT"),
            Self::LessThanOrEqual => write!(f, "LE"),
            Self::GreaterThan => write!(f, "GT"),
            Self::GreaterThanOrEqual => write!(f, "GE"),
            Self::Not => write!(f, "NOT"),
            Self::MakeArray(count) => write!(f, "MAKE_ARRAY {count}"),
            Self::MakeObject(count) => write!(f, "MAKE_OBJECT {count}"),
            Self::MakeClosure(idx) => write!(f, "MAKE_CLOSURE {idx}"),
            Self::Jump(offset) => write!(f, "JUMP {offset}"),
            Self::JumpIfFalse(offset) => write!(f, "JMP_FALSE {offset}"),
            Self::JumpIfFalseKeep(offset) => write!(f, "JMP_FALSE_KEEP {offset}"),
            Self::JumpIfTrueKeep(offset) => write!(f, "JMP_TRUE_KEEP {offset}"),
            Self::Return => write!(f, "RETURN"),
        }
    }
}

/// Bytecode program containing instructions and constant pools
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    /// Instruction sequence
    pub instructions: Vec<Instruction>,

    /// Constant value pool
    pub constants: Vec<EelValue>,

    /// Name pool (identifiers, property names, method names)
    pub names: Vec<String>,

    /// Maximum stack depth required for execution
    pub max_stack_depth: usize,
}

impl Bytecode {
    pub fn constant(&self, index: ConstantIndex) -> Result<&EelValue> {
        self.constants
            .get(usize::from(index))
            .ok_or_else(|| malformed(format!("invalid constant index {index}")))
    }

    pub fn name(&self, index: NameIndex) -> Result<&str> {
        self.names
            .get(usize::from(index))
            .map(String::as_str)
            .ok_or_else(|| malformed(format!("invalid name index {index}")))
    }

    /// Calculate the maximum stack depth along the fall-through path
    fn calculate_max_stack_depth(&mut self) {
        let mut current_depth = 0i32;
        let mut max_depth = 0i32;

        for instruction in &self.instructions {
            current_depth += instruction.stack_effect();
            max_depth = max_depth.max(current_depth);
        }

        self.max_stack_depth = max_depth.max(0) as usize;
    }

    /// Pretty print one program, annotating pool operands
    fn disassemble_into(&self, output: &mut String) -> fmt::Result {
        for (pos, instruction) in self.instructions.iter().enumerate() {
            write!(output, "{pos:4}: {instruction}")?;
            match instruction {
                Instruction::PushConstant(idx) => {
                    if let Some(value) = self.constants.get(usize::from(*idx)) {
                        write!(output, "    ; {value:?}")?;
                    }
                }
                Instruction::LoadVariable(idx)
                | Instruction::LoadProperty(idx)
                | Instruction::CallFunction(idx, _)
                | Instruction::CallMethod(idx, _) => {
                    if let Some(name) = self.names.get(usize::from(*idx)) {
                        write!(output, "    ; \"{name}\"")?;
                    }
                }
                other => {
                    if let Some(offset) = other.jump_offset() {
                        write!(output, "    ; -> {}", pos as i64 + i64::from(offset))?;
                    }
                }
            }
            output.push('\n');
        }
        Ok(())
    }
}

fn malformed(message: String) -> EelError {
    EelError::evaluation_error(EL0108, format!("Malformed bytecode: {message}"))
}

fn limit_exceeded(what: &str) -> EelError {
    EelError::evaluation_error(EL0108, format!("Expression has too many {what} to compile"))
}

/// Bytecode builder utility for constructing bytecode programs
#[derive(Debug, Default)]
pub struct BytecodeBuilder {
    bytecode: Bytecode,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit an instruction and return its position
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        self.bytecode.instructions.push(instruction);
        self.bytecode.instructions.len() - 1
    }

    /// Add a constant and emit PushConstant instruction
    pub fn push_constant(&mut self, value: EelValue) -> Result<()> {
        let index = self.add_constant(value)?;
        self.emit(Instruction::PushConstant(index));
        Ok(())
    }

    /// Add a constant to the pool and return its index.
    /// Floats are deduplicated by bit pattern so `-0.0` stays distinct.
    pub fn add_constant(&mut self, value: EelValue) -> Result<ConstantIndex> {
        let existing = self
            .bytecode
            .constants
            .iter()
            .position(|v| same_constant(v, &value));
        let index = match existing {
            Some(index) => index,
            None => {
                self.bytecode.constants.push(value);
                self.bytecode.constants.len() - 1
            }
        };
        ConstantIndex::try_from(index).map_err(|_| limit_exceeded("constants"))
    }

    /// Add a name to the pool and return its index
    pub fn add_name(&mut self, name: &str) -> Result<NameIndex> {
        let index = match self.bytecode.names.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                self.bytecode.names.push(name.to_string());
                self.bytecode.names.len() - 1
            }
        };
        NameIndex::try_from(index).map_err(|_| limit_exceeded("names"))
    }

    /// Emit a jump with a placeholder offset, to be patched later
    pub fn emit_jump(&mut self, jump: Instruction) -> usize {
        self.emit(jump.with_offset(0))
    }

    /// Point a previously emitted jump at the next instruction
    pub fn patch_jump(&mut self, position: usize) -> Result<()> {
        let target = self.bytecode.instructions.len();
        let offset =
            i16::try_from(target - position).map_err(|_| limit_exceeded("instructions"))?;
        let instruction = self
            .bytecode
            .instructions
            .get_mut(position)
            .ok_or_else(|| malformed(format!("no jump at {position}")))?;
        *instruction = instruction.with_offset(offset);
        Ok(())
    }

    /// Finalize the bytecode, calculating the stack depth
    pub fn finish(mut self) -> Bytecode {
        self.bytecode.calculate_max_stack_depth();
        self.bytecode
    }
}

fn same_constant(a: &EelValue, b: &EelValue) -> bool {
    match (a, b) {
        (EelValue::Float(x), EelValue::Float(y)) => x.to_bits() == y.to_bits(),
        (EelValue::Float(_), _) | (_, EelValue::Float(_)) => false,
        _ => a == b,
    }
}

/// Bytecode of one arrow function
#[derive(Debug, Clone)]
pub struct FunctionProto {
    pub params: Arc<[String]>,
    pub code: Bytecode,
}

/// The executable artifact of one expression: the main program plus the
/// bodies of every arrow function in it
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    pub source: String,
    pub main: Bytecode,
    pub functions: Vec<FunctionProto>,
}

impl CompiledExpression {
    pub fn function(&self, index: FunctionIndex) -> Result<&FunctionProto> {
        self.functions
            .get(usize::from(index))
            .ok_or_else(|| malformed(format!("invalid function index {index}")))
    }

    /// Textual listing of all programs
    pub fn disassemble(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut output = String::new();
        writeln!(output, "=== BYTECODE DISASSEMBLY ===")?;
        writeln!(output, "Source: {}", self.source)?;
        writeln!(output, "Max Stack Depth: {}", self.main.max_stack_depth)?;
        writeln!(output, "\n--- MAIN ---")?;
        self.main.disassemble_into(&mut output)?;
        for (i, function) in self.functions.iter().enumerate() {
            writeln!(output, "\n--- FUNCTION {i} ({}) ---", function.params.join(", "))?;
            function.code.disassemble_into(&mut output)?;
        }
        f.write_str(&output)
    }
}
