use std::fmt;

use thiserror::Error;

use crate::bytecode::CompileError;
use crate::bytecode::format::DecodeError;
use crate::interpreter::InterpreterError;
use crate::lexer::LexError;
use crate::parser::ParseError;
use crate::vm::VmError;

/// Diagnostic class of a failed run, as reported to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    LexicalError,
    SyntaxError,
    TypeError,
    NameError,
    CompileTimeNameError,
    /// Code generation ran out of operand space or lost a jump target.
    CompileError,
    ArithmeticError,
    VmError,
    ExecutionLimitExceeded,
    BytecodeFormatError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::LexicalError => "LexicalError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::NameError => "NameError",
            ErrorKind::CompileTimeNameError => "CompileTimeNameError",
            ErrorKind::CompileError => "CompileError",
            ErrorKind::ArithmeticError => "ArithmeticError",
            ErrorKind::VmError => "VMError",
            ErrorKind::ExecutionLimitExceeded => "ExecutionLimitExceeded",
            ErrorKind::BytecodeFormatError => "BytecodeFormatError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Source { line: usize, column: usize },
    Instruction(usize),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Source { line, column } => write!(f, "line {line}, column {column}"),
            Location::Instruction(pc) => write!(f, "pc {pc}"),
        }
    }
}

/// Any failure of the toolchain, wrapping the stage error unchanged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Vm(#[from] VmError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Lex(_) => ErrorKind::LexicalError,
            Error::Parse(_) => ErrorKind::SyntaxError,
            Error::Interpreter(error) => match error {
                InterpreterError::UndefinedVariable { .. }
                | InterpreterError::UndefinedFunction { .. } => ErrorKind::NameError,
                InterpreterError::FunctionArityMismatch { .. }
                | InterpreterError::UnsupportedOperands { .. }
                | InterpreterError::UnsupportedOperand { .. }
                | InterpreterError::NonBooleanCondition { .. } => ErrorKind::TypeError,
                InterpreterError::DivisionByZero { .. } => ErrorKind::ArithmeticError,
                InterpreterError::ExecutionLimitExceeded { .. } => {
                    ErrorKind::ExecutionLimitExceeded
                }
            },
            Error::Compile(error) => match error {
                CompileError::UndefinedVariable { .. } | CompileError::UndefinedFunction { .. } => {
                    ErrorKind::CompileTimeNameError
                }
                CompileError::FunctionArityMismatch { .. } => ErrorKind::TypeError,
                CompileError::TooLarge { .. } | CompileError::UnboundLabel { .. } => {
                    ErrorKind::CompileError
                }
            },
            Error::Vm(VmError::ExecutionLimitExceeded { .. }) => ErrorKind::ExecutionLimitExceeded,
            Error::Vm(_) => ErrorKind::VmError,
            Error::Decode(_) => ErrorKind::BytecodeFormatError,
        }
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            Error::Lex(error) => {
                let (line, column) = error.position();
                Some(Location::Source { line, column })
            }
            Error::Parse(error) => {
                let (line, column) = error.position();
                Some(Location::Source { line, column })
            }
            Error::Vm(error) => error.pc().map(Location::Instruction),
            Error::Interpreter(_) | Error::Compile(_) | Error::Decode(_) => None,
        }
    }

    /// `Kind: message`, the form printed by the command-line front end.
    pub fn report(&self) -> String {
        format!("{}: {self}", self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline;

    fn interpreter_error(source: &str) -> Error {
        pipeline::interpret(source, "").expect_err("expected failure").error
    }

    fn vm_error(source: &str) -> Error {
        pipeline::compile_and_run(source, "").expect_err("expected failure").error
    }

    #[test]
    fn classifies_front_end_errors() {
        let lexical = interpreter_error("x = 1 $ 2;");
        assert_eq!(lexical.kind(), ErrorKind::LexicalError);
        assert_eq!(lexical.location(), Some(Location::Source { line: 1, column: 7 }));

        let syntax = interpreter_error("1 +");
        assert_eq!(syntax.kind(), ErrorKind::SyntaxError);
        assert_eq!(syntax.location(), Some(Location::Source { line: 1, column: 4 }));
    }

    #[test]
    fn maps_error_classes_across_paths() {
        let cases = [
            ("print y;", ErrorKind::NameError, ErrorKind::CompileTimeNameError),
            ("if false { z = 1; } print z;", ErrorKind::NameError, ErrorKind::VmError),
            ("print 1 + true;", ErrorKind::TypeError, ErrorKind::VmError),
            ("print 5 % 0;", ErrorKind::ArithmeticError, ErrorKind::VmError),
            ("print nope();", ErrorKind::NameError, ErrorKind::CompileTimeNameError),
            ("print read(1);", ErrorKind::TypeError, ErrorKind::TypeError),
        ];
        for (source, interpreted, compiled) in cases {
            assert_eq!(interpreter_error(source).kind(), interpreted, "{source}");
            assert_eq!(vm_error(source).kind(), compiled, "{source}");
        }
    }

    #[test]
    fn code_generator_limits_are_not_vm_faults() {
        let too_large = Error::from(CompileError::TooLarge {
            what: "constant",
            limit: u32::MAX,
        });
        assert_eq!(too_large.kind(), ErrorKind::CompileError);
        assert_eq!(too_large.location(), None);
        assert_eq!(
            too_large.report(),
            format!("CompileError: Program exceeds the constant limit of {}", u32::MAX)
        );

        let unbound = Error::from(CompileError::UnboundLabel { label: 4 });
        assert_eq!(unbound.kind(), ErrorKind::CompileError);
    }

    #[test]
    fn nesting_limit_is_a_syntax_error_on_both_paths() {
        let source = format!("print 1{};", " + 1".repeat(200_000));
        for error in [interpreter_error(&source), vm_error(&source)] {
            assert_eq!(error.kind(), ErrorKind::SyntaxError);
            assert!(error.report().starts_with("SyntaxError: Nesting deeper than"));
        }
    }

    #[test]
    fn vm_faults_carry_instruction_location() {
        let error = vm_error("x = 1 / 0;");
        assert_eq!(error.location(), Some(Location::Instruction(2)));
        assert_eq!(
            error.report(),
            "VMError: Division by zero in '/' at pc 2"
        );
    }
}
