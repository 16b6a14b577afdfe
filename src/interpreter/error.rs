use thiserror::Error;

use crate::runtime::OpError;

/// Typed errors produced by the tree-walking interpreter backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterpreterError {
    #[error("Undefined variable '{name}'")]
    UndefinedVariable { name: String },
    #[error("Undefined function '{name}'")]
    UndefinedFunction { name: String },
    #[error("Function '{name}' expected {expected} arguments, got {found}")]
    FunctionArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Unsupported operand types for '{operator}': {left} and {right}")]
    UnsupportedOperands {
        operator: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("Unsupported operand type for '{operator}': {operand}")]
    UnsupportedOperand {
        operator: &'static str,
        operand: &'static str,
    },
    #[error("Condition must be a boolean, got {type_name}")]
    NonBooleanCondition { type_name: &'static str },
    #[error("Division by zero in '{operator}'")]
    DivisionByZero { operator: &'static str },
    #[error("Execution limit of {limit} steps exceeded")]
    ExecutionLimitExceeded { limit: u64 },
}

impl From<OpError> for InterpreterError {
    fn from(error: OpError) -> Self {
        match error {
            OpError::UnsupportedOperands {
                operator,
                left,
                right,
            } => InterpreterError::UnsupportedOperands {
                operator,
                left,
                right,
            },
            OpError::UnsupportedOperand { operator, operand } => {
                InterpreterError::UnsupportedOperand { operator, operand }
            }
            OpError::DivisionByZero { operator } => InterpreterError::DivisionByZero { operator },
        }
    }
}
