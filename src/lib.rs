pub mod ast;
pub mod backend;
pub mod bytecode;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod runtime;
pub mod token;
pub mod vm;

pub use error::{Error, ErrorKind, Location};
