use thiserror::Error;

use crate::runtime::OpError;

/// Faults raised while loading or running compiled bytecode.
///
/// Every fault except the step limit carries the program counter of the
/// instruction that caused it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("Stack underflow at pc {pc}")]
    StackUnderflow { pc: usize },
    #[error("Variable '{name}' (slot {slot}) read before assignment at pc {pc}")]
    UnsetSlot { pc: usize, slot: u32, name: String },
    #[error("Division by zero in '{operator}' at pc {pc}")]
    DivisionByZero { pc: usize, operator: &'static str },
    #[error("{source} at pc {pc}")]
    InvalidOperands { pc: usize, source: OpError },
    #[error("Jump condition must be a boolean, got {type_name} at pc {pc}")]
    NonBooleanCondition { pc: usize, type_name: &'static str },
    #[error("Invalid jump target {target} at pc {pc}")]
    InvalidJumpTarget { pc: usize, target: u32 },
    #[error("Invalid constant index {index} at pc {pc}")]
    InvalidConstant { pc: usize, index: u32 },
    #[error("Invalid slot {slot} at pc {pc}")]
    InvalidSlot { pc: usize, slot: u32 },
    #[error("Execution limit of {limit} steps exceeded")]
    ExecutionLimitExceeded { limit: u64 },
}

impl VmError {
    pub fn pc(&self) -> Option<usize> {
        match self {
            VmError::StackUnderflow { pc }
            | VmError::UnsetSlot { pc, .. }
            | VmError::DivisionByZero { pc, .. }
            | VmError::InvalidOperands { pc, .. }
            | VmError::NonBooleanCondition { pc, .. }
            | VmError::InvalidJumpTarget { pc, .. }
            | VmError::InvalidConstant { pc, .. }
            | VmError::InvalidSlot { pc, .. } => Some(*pc),
            VmError::ExecutionLimitExceeded { .. } => None,
        }
    }

    pub(super) fn from_op(pc: usize, error: OpError) -> Self {
        match error {
            OpError::DivisionByZero { operator } => VmError::DivisionByZero { pc, operator },
            source => VmError::InvalidOperands { pc, source },
        }
    }
}

pub type VmResult<T> = std::result::Result<T, VmError>;
