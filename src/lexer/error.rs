use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character '{character}' at line {line}, column {column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string literal at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },
    #[error("Unsupported escape sequence '\\{escape}' at line {line}, column {column}")]
    InvalidEscape {
        escape: char,
        line: usize,
        column: usize,
    },
    #[error("Malformed character literal at line {line}, column {column}")]
    InvalidCharacterLiteral { line: usize, column: usize },
    #[error("Invalid number literal '{literal}' at line {line}, column {column}")]
    InvalidNumberLiteral {
        literal: String,
        line: usize,
        column: usize,
    },
}

impl LexError {
    /// Line and column the error was raised at.
    pub fn position(&self) -> (usize, usize) {
        match self {
            LexError::UnexpectedCharacter { line, column, .. }
            | LexError::UnterminatedString { line, column }
            | LexError::InvalidEscape { line, column, .. }
            | LexError::InvalidCharacterLiteral { line, column }
            | LexError::InvalidNumberLiteral { line, column, .. } => (*line, *column),
        }
    }
}

pub type LexResult<T> = Result<T, LexError>;
