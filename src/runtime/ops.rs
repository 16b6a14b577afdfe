//! Operator semantics shared by the interpreter and the VM.

use thiserror::Error;

use crate::ast::{BinaryOperator, UnaryOperator};

use super::Value;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OpError {
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
    #[error("Division by zero in '{operator}'")]
    DivisionByZero { operator: &'static str },
}

pub fn binary(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, OpError> {
    let mismatch = || OpError::UnsupportedOperands {
        operator: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    };

    match op {
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => {
            let (Value::Number(a), Value::Number(b)) = (left, right) else {
                return Err(mismatch());
            };
            arithmetic(op, a.value, b.value).map(Value::number)
        }
        BinaryOperator::And | BinaryOperator::Or => {
            let (Value::Boolean(a), Value::Boolean(b)) = (left, right) else {
                return Err(mismatch());
            };
            let result = if op == BinaryOperator::And {
                *a && *b
            } else {
                *a || *b
            };
            Ok(Value::Boolean(result))
        }
        BinaryOperator::Equal | BinaryOperator::NotEqual => {
            if left.type_name() != right.type_name() {
                return Err(mismatch());
            }
            let equal = match (left, right) {
                (Value::Number(a), Value::Number(b)) => a.value == b.value,
                _ => left == right,
            };
            Ok(Value::Boolean(if op == BinaryOperator::Equal {
                equal
            } else {
                !equal
            }))
        }
        BinaryOperator::Less
        | BinaryOperator::LessEqual
        | BinaryOperator::Greater
        | BinaryOperator::GreaterEqual => {
            let ordering = match (left, right) {
                (Value::Number(a), Value::Number(b)) => a.value.partial_cmp(&b.value),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => return Err(mismatch()),
            };
            let result = ordering.is_some_and(|ordering| match op {
                BinaryOperator::Less => ordering.is_lt(),
                BinaryOperator::LessEqual => ordering.is_le(),
                BinaryOperator::Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            });
            Ok(Value::Boolean(result))
        }
    }
}

fn arithmetic(op: BinaryOperator, a: f64, b: f64) -> Result<f64, OpError> {
    match op {
        BinaryOperator::Add => Ok(a + b),
        BinaryOperator::Subtract => Ok(a - b),
        BinaryOperator::Multiply => Ok(a * b),
        BinaryOperator::Divide | BinaryOperator::Modulo if b == 0.0 => {
            Err(OpError::DivisionByZero {
                operator: op.symbol(),
            })
        }
        BinaryOperator::Divide => Ok(a / b),
        _ => Ok(floored_modulo(a, b)),
    }
}

/// `%` follows the sign of the divisor.
fn floored_modulo(a: f64, b: f64) -> f64 {
    let remainder = a % b;
    if remainder != 0.0 && (remainder < 0.0) != (b < 0.0) {
        remainder + b
    } else {
        remainder
    }
}

pub fn unary(op: UnaryOperator, operand: &Value) -> Result<Value, OpError> {
    match (op, operand) {
        (UnaryOperator::Negate, Value::Number(number)) => Ok(Value::Number(number.map(|v| -v))),
        (UnaryOperator::Not, Value::Boolean(value)) => Ok(Value::Boolean(!value)),
        _ => Err(OpError::UnsupportedOperand {
            operator: op.symbol(),
            operand: operand.type_name(),
        }),
    }
}
