use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Expected {expected}, found {found} at line {line}, column {column}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },
    #[error("Expected assignment target, found expression at line {line}, column {column}")]
    InvalidAssignmentTarget { line: usize, column: usize },
    #[error("Nesting deeper than {limit} levels at line {line}, column {column}")]
    NestingTooDeep {
        limit: usize,
        line: usize,
        column: usize,
    },
}

impl ParseError {
    pub fn position(&self) -> (usize, usize) {
        match self {
            ParseError::UnexpectedToken { line, column, .. }
            | ParseError::InvalidAssignmentTarget { line, column }
            | ParseError::NestingTooDeep { line, column, .. } => (*line, *column),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
