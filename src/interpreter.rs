use tracing::debug;

use crate::ast::Program;
use crate::backend::{Backend, PreparedBackend};
use crate::error::Error;
use crate::runtime::{ExecutionLimits, Io, StepBudget};

mod error;
mod runtime;

pub use error::InterpreterError;
use runtime::{Environment, InterpreterRuntime};

/// AST-walking backend that executes programs directly without compilation.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    limits: ExecutionLimits,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: ExecutionLimits) -> Self {
        Self { limits }
    }
}

/// Prepared executable program for the tree-walking interpreter.
pub struct PreparedInterpreter {
    program: Program,
    limits: ExecutionLimits,
}

impl PreparedInterpreter {
    /// Runs the program once against `io`; output printed before a failure
    /// stays in `io.output`.
    pub fn run_with_io(&self, io: &mut Io) -> Result<(), InterpreterError> {
        let mut environment = Environment::default();
        let mut runtime = InterpreterRuntime {
            io,
            budget: StepBudget::new(self.limits),
        };
        let result = runtime.exec_block(&self.program.body, &mut environment);
        debug!(
            steps = runtime.budget.taken(),
            ok = result.is_ok(),
            "interpreter run finished"
        );
        result
    }
}

impl PreparedBackend for PreparedInterpreter {
    fn execute(&self, io: &mut Io) -> Result<(), Error> {
        Ok(self.run_with_io(io)?)
    }
}

impl Backend for Interpreter {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>, Error> {
        Ok(Box::new(PreparedInterpreter {
            program: program.clone(),
            limits: self.limits,
        }))
    }
}
