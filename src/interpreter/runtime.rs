use rustc_hash::FxHashMap;

use crate::ast::{Block, Expression, Statement};
use crate::runtime::{BuiltinFunction, Io, StepBudget, Value, ops};

use super::InterpreterError;

type ExecResult<T> = std::result::Result<T, InterpreterError>;

/// Flat variable environment shared by every block of a program.
#[derive(Debug, Default)]
pub(super) struct Environment {
    variables: FxHashMap<String, Value>,
}

impl Environment {
    fn load(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    fn store(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.variables.get_mut(name) {
            *slot = value;
        } else {
            self.variables.insert(name.to_string(), value);
        }
    }
}

/// Runtime executor for interpreted statements and expressions.
pub(super) struct InterpreterRuntime<'a> {
    pub(super) io: &'a mut Io,
    pub(super) budget: StepBudget,
}

impl InterpreterRuntime<'_> {
    pub(super) fn exec_block(
        &mut self,
        block: &Block,
        environment: &mut Environment,
    ) -> ExecResult<()> {
        for statement in &block.statements {
            self.exec_statement(statement, environment)?;
        }
        Ok(())
    }

    fn exec_statement(
        &mut self,
        statement: &Statement,
        environment: &mut Environment,
    ) -> ExecResult<()> {
        self.step()?;
        match statement {
            Statement::Assign { name, value } => {
                let value = self.eval_expression(value, environment)?;
                environment.store(name, value);
            }
            Statement::If {
                condition,
                then_body,
                else_body,
            } => {
                if self.eval_condition(condition, environment)? {
                    self.exec_block(then_body, environment)?;
                } else if let Some(else_body) = else_body {
                    self.exec_block(else_body, environment)?;
                }
            }
            Statement::While { condition, body } => {
                while self.eval_condition(condition, environment)? {
                    self.exec_block(body, environment)?;
                    self.step()?;
                }
            }
            Statement::Print(value) => {
                let value = self.eval_expression(value, environment)?;
                self.io.output.push(&value.to_output());
            }
            Statement::Expr(value) => {
                self.eval_expression(value, environment)?;
            }
            Statement::Block(block) => self.exec_block(block, environment)?,
        }
        Ok(())
    }

    fn eval_condition(
        &mut self,
        condition: &Expression,
        environment: &mut Environment,
    ) -> ExecResult<bool> {
        let value = self.eval_expression(condition, environment)?;
        value
            .as_bool()
            .ok_or(InterpreterError::NonBooleanCondition {
                type_name: value.type_name(),
            })
    }

    pub(super) fn eval_expression(
        &mut self,
        expression: &Expression,
        environment: &mut Environment,
    ) -> ExecResult<Value> {
        match expression {
            Expression::Number(value) => Ok(Value::Number(*value)),
            Expression::Boolean(value) => Ok(Value::Boolean(*value)),
            Expression::String(value) => Ok(Value::String(value.clone())),
            Expression::Identifier(name) => environment.load(name).cloned().ok_or_else(|| {
                InterpreterError::UndefinedVariable {
                    name: name.to_string(),
                }
            }),
            Expression::Unary { op, operand } => {
                let operand = self.eval_expression(operand, environment)?;
                Ok(ops::unary(*op, &operand)?)
            }
            Expression::Binary { left, op, right } => {
                // Both sides are evaluated, matching the compiled code.
                let left = self.eval_expression(left, environment)?;
                let right = self.eval_expression(right, environment)?;
                Ok(ops::binary(*op, &left, &right)?)
            }
            Expression::Call { callee, args } => self.eval_call(callee, args, environment),
        }
    }

    fn eval_call(
        &mut self,
        callee: &str,
        args: &[Expression],
        environment: &mut Environment,
    ) -> ExecResult<Value> {
        let builtin = BuiltinFunction::from_name(callee).ok_or_else(|| {
            InterpreterError::UndefinedFunction {
                name: callee.to_string(),
            }
        })?;
        if args.len() != builtin.arity() {
            return Err(InterpreterError::FunctionArityMismatch {
                name: callee.to_string(),
                expected: builtin.arity(),
                found: args.len(),
            });
        }
        let args = args
            .iter()
            .map(|arg| self.eval_expression(arg, environment))
            .collect::<ExecResult<Vec<_>>>()?;
        Ok(builtin.call(&args, self.io)?)
    }

    fn step(&mut self) -> ExecResult<()> {
        self.budget
            .tick()
            .map_err(|limit| InterpreterError::ExecutionLimitExceeded { limit })
    }
}
