//! One-call entry points chaining the stages together.

use thiserror::Error;

use crate::ast::Program;
use crate::backend::Backend;
use crate::bytecode::{self, CompiledProgram};
use crate::error::Error;
use crate::interpreter::Interpreter;
use crate::runtime::{Io, Output};
use crate::vm::VM;
use crate::{lexer, parser};

/// A failed run together with whatever it printed before failing.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{error}")]
pub struct RunFailure {
    pub error: Error,
    pub output: Output,
}

impl RunFailure {
    fn before_output(error: Error) -> Self {
        Self {
            error,
            output: Output::new(),
        }
    }
}

pub fn parse_source(source: &str) -> Result<Program, Error> {
    let tokens = lexer::tokenize(source)?;
    Ok(parser::parse_tokens(tokens)?)
}

pub fn compile_source(source: &str) -> Result<CompiledProgram, Error> {
    let program = parse_source(source)?;
    Ok(bytecode::compile(&program)?)
}

/// Runs `source` through `backend`, feeding it `input`.
pub fn run_with_backend(
    backend: &dyn Backend,
    source: &str,
    input: &str,
) -> Result<Output, RunFailure> {
    let program = parse_source(source).map_err(RunFailure::before_output)?;
    let prepared = backend
        .prepare(&program)
        .map_err(RunFailure::before_output)?;
    let mut io = Io::new(input);
    match prepared.execute(&mut io) {
        Ok(()) => Ok(io.output),
        Err(error) => Err(RunFailure {
            error,
            output: io.output,
        }),
    }
}

/// Path A: tree-walking interpretation.
pub fn interpret(source: &str, input: &str) -> Result<Output, RunFailure> {
    run_with_backend(&Interpreter::new(), source, input)
}

/// Path B: compile to bytecode, then run on the VM.
pub fn compile_and_run(source: &str, input: &str) -> Result<Output, RunFailure> {
    run_with_backend(&VM::new(), source, input)
}
