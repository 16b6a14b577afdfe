//! Linear stack-machine code shared by the code generator, the file format and
//! the VM.

use std::fmt;

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::runtime::{BuiltinFunction, Value};

pub mod compiler;
pub mod format;

pub use compiler::{CompileError, compile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    PushConstant(u32),
    Load(u32),
    Store(u32),
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Negate,
    Not,
    /// Absolute target offset.
    Jump(u32),
    /// Pops the condition; jumps to the absolute target when it is `false`.
    JumpIfFalse(u32),
    Print,
    Pop,
    CallBuiltin(BuiltinFunction),
    Halt,
}

impl Instruction {
    pub fn binary(op: BinaryOperator) -> Self {
        match op {
            BinaryOperator::Add => Instruction::Add,
            BinaryOperator::Subtract => Instruction::Subtract,
            BinaryOperator::Multiply => Instruction::Multiply,
            BinaryOperator::Divide => Instruction::Divide,
            BinaryOperator::Modulo => Instruction::Modulo,
            BinaryOperator::Equal => Instruction::Equal,
            BinaryOperator::NotEqual => Instruction::NotEqual,
            BinaryOperator::Less => Instruction::Less,
            BinaryOperator::LessEqual => Instruction::LessEqual,
            BinaryOperator::Greater => Instruction::Greater,
            BinaryOperator::GreaterEqual => Instruction::GreaterEqual,
            BinaryOperator::And => Instruction::And,
            BinaryOperator::Or => Instruction::Or,
        }
    }

    pub fn unary(op: UnaryOperator) -> Self {
        match op {
            UnaryOperator::Negate => Instruction::Negate,
            UnaryOperator::Not => Instruction::Not,
        }
    }

    /// Inverse of [`Instruction::binary`].
    pub fn binary_operator(self) -> Option<BinaryOperator> {
        let op = match self {
            Instruction::Add => BinaryOperator::Add,
            Instruction::Subtract => BinaryOperator::Subtract,
            Instruction::Multiply => BinaryOperator::Multiply,
            Instruction::Divide => BinaryOperator::Divide,
            Instruction::Modulo => BinaryOperator::Modulo,
            Instruction::Equal => BinaryOperator::Equal,
            Instruction::NotEqual => BinaryOperator::NotEqual,
            Instruction::Less => BinaryOperator::Less,
            Instruction::LessEqual => BinaryOperator::LessEqual,
            Instruction::Greater => BinaryOperator::Greater,
            Instruction::GreaterEqual => BinaryOperator::GreaterEqual,
            Instruction::And => BinaryOperator::And,
            Instruction::Or => BinaryOperator::Or,
            _ => return None,
        };
        Some(op)
    }

    /// Net change in operand stack depth.
    pub fn stack_effect(self) -> i32 {
        match self {
            Instruction::PushConstant(_) | Instruction::Load(_) => 1,
            Instruction::Store(_)
            | Instruction::JumpIfFalse(_)
            | Instruction::Print
            | Instruction::Pop => -1,
            Instruction::Negate | Instruction::Not | Instruction::Jump(_) | Instruction::Halt => 0,
            Instruction::CallBuiltin(builtin) => 1 - builtin.arity() as i32,
            binary => {
                debug_assert!(binary.binary_operator().is_some());
                -1
            }
        }
    }

    /// Operands popped before anything is pushed.
    pub fn pops(self) -> usize {
        match self {
            Instruction::Store(_)
            | Instruction::JumpIfFalse(_)
            | Instruction::Print
            | Instruction::Pop
            | Instruction::Negate
            | Instruction::Not => 1,
            Instruction::CallBuiltin(builtin) => builtin.arity(),
            other if other.binary_operator().is_some() => 2,
            _ => 0,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Instruction::PushConstant(_) => "PUSH_CONST",
            Instruction::Load(_) => "LOAD",
            Instruction::Store(_) => "STORE",
            Instruction::Add => "ADD",
            Instruction::Subtract => "SUB",
            Instruction::Multiply => "MUL",
            Instruction::Divide => "DIV",
            Instruction::Modulo => "MOD",
            Instruction::Equal => "EQ",
            Instruction::NotEqual => "NE",
            Instruction::Less => "LT",
            Instruction::LessEqual => "LE",
            Instruction::Greater => "GT",
            Instruction::GreaterEqual => "GE",
            Instruction::And => "AND",
            Instruction::Or => "OR",
            Instruction::Negate => "NEG",
            Instruction::Not => "NOT",
            Instruction::Jump(_) => "JUMP",
            Instruction::JumpIfFalse(_) => "JUMP_IF_FALSE",
            Instruction::Print => "PRINT",
            Instruction::Pop => "POP",
            Instruction::CallBuiltin(_) => "CALL_BUILTIN",
            Instruction::Halt => "HALT",
        }
    }
}

/// Output of the code generator and unit of the bytecode file format.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledProgram {
    pub constants: Vec<Value>,
    pub instructions: Vec<Instruction>,
    /// Slot index to source name.
    pub slot_names: Vec<String>,
}

impl CompiledProgram {
    pub fn slot_name(&self, slot: u32) -> Option<&str> {
        self.slot_names.get(slot as usize).map(String::as_str)
    }
}

impl fmt::Display for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== constants ({}) ==", self.constants.len())?;
        for (index, constant) in self.constants.iter().enumerate() {
            writeln!(f, "{index:>4}  {}", describe_constant(constant))?;
        }
        writeln!(f, "== slots ({}) ==", self.slot_names.len())?;
        for (slot, name) in self.slot_names.iter().enumerate() {
            writeln!(f, "{slot:>4}  {name}")?;
        }
        writeln!(f, "== code ({}) ==", self.instructions.len())?;
        for (offset, instruction) in self.instructions.iter().enumerate() {
            let mnemonic = instruction.mnemonic();
            match *instruction {
                Instruction::PushConstant(index) => {
                    let comment = self
                        .constants
                        .get(index as usize)
                        .map(describe_constant)
                        .unwrap_or_else(|| "?".to_string());
                    writeln!(f, "{offset:04}  {mnemonic:<14}{index:>4}  ; {comment}")?;
                }
                Instruction::Load(slot) | Instruction::Store(slot) => {
                    let name = self.slot_name(slot).unwrap_or("?");
                    writeln!(f, "{offset:04}  {mnemonic:<14}{slot:>4}  ; {name}")?;
                }
                Instruction::Jump(target) | Instruction::JumpIfFalse(target) => {
                    writeln!(f, "{offset:04}  {mnemonic:<14}{target:>4}")?;
                }
                Instruction::CallBuiltin(builtin) => {
                    writeln!(
                        f,
                        "{offset:04}  {mnemonic:<14}{:>4}  ; {}",
                        builtin.id(),
                        builtin.name()
                    )?;
                }
                _ => writeln!(f, "{offset:04}  {mnemonic}")?,
            }
        }
        Ok(())
    }
}

fn describe_constant(value: &Value) -> String {
    match value {
        Value::String(text) => format!("string {text:?}"),
        other => format!("{} {}", other.type_name(), other.to_output()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_mapping_round_trips() {
        let operators = [
            BinaryOperator::Or,
            BinaryOperator::And,
            BinaryOperator::Equal,
            BinaryOperator::NotEqual,
            BinaryOperator::Less,
            BinaryOperator::LessEqual,
            BinaryOperator::Greater,
            BinaryOperator::GreaterEqual,
            BinaryOperator::Add,
            BinaryOperator::Subtract,
            BinaryOperator::Multiply,
            BinaryOperator::Divide,
            BinaryOperator::Modulo,
        ];
        for op in operators {
            let instruction = Instruction::binary(op);
            assert_eq!(instruction.binary_operator(), Some(op));
            assert_eq!(instruction.stack_effect(), -1);
            assert_eq!(instruction.pops(), 2);
        }
    }

    #[test]
    fn stack_effects() {
        assert_eq!(Instruction::PushConstant(0).stack_effect(), 1);
        assert_eq!(Instruction::Store(0).stack_effect(), -1);
        assert_eq!(Instruction::Not.stack_effect(), 0);
        assert_eq!(Instruction::JumpIfFalse(3).stack_effect(), -1);
        assert_eq!(
            Instruction::CallBuiltin(BuiltinFunction::Read).stack_effect(),
            1
        );
        assert_eq!(Instruction::Halt.stack_effect(), 0);
        assert_eq!(
            Instruction::CallBuiltin(BuiltinFunction::PutChar).stack_effect(),
            0
        );
        assert_eq!(Instruction::CallBuiltin(BuiltinFunction::PutChar).pops(), 1);
    }

    #[test]
    fn disassembly_lists_constants_slots_and_code() {
        let program = CompiledProgram {
            constants: vec![Value::number(2.0), Value::String("hi".to_string())],
            instructions: vec![
                Instruction::PushConstant(0),
                Instruction::Store(0),
                Instruction::Load(0),
                Instruction::Print,
                Instruction::Jump(5),
                Instruction::Halt,
            ],
            slot_names: vec!["x".to_string()],
        };
        let listing = program.to_string();
        assert!(listing.contains("   0  number 2"));
        assert!(listing.contains("   1  string \"hi\""));
        assert!(listing.contains("0001  STORE            0  ; x"));
        assert!(listing.contains("0004  JUMP             5"));
        assert!(listing.contains("0005  HALT"));
    }
}
