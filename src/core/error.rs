use std::collections::TryReserveError;

use thiserror::Error;

pub type FdResult<T> = Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Out of memory")]
    OutOfMemory(#[from] TryReserveError),
    #[error("Key not found")]
    KeyNotFound,
    #[error("No such symbol: {0}")]
    SymbolNotFound(String),
    #[error("Invalid symbol name: '{0}'")]
    InvalidName(String),
    #[error("No such option: {0}")]
    UnknownOption(String),
    #[error("Can't parse value for option {0}: {1}")]
    BadOption(String, String),
    #[error("Scripts nested too deeply: {0}")]
    ScriptDepth(String),
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Insufficient arguments")]
    InsufficientArguments,
    #[error("Too many arguments")]
    TooManyArguments,
    #[error("Bad expression: {0}")]
    Expression(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Malformed listing at line {line}: {text}")]
    BadListing { line: usize, text: String },
    #[error("{file}:{line}: {source}")]
    Script {
        file: String,
        line: usize,
        source: Box<Error>,
    },
    #[error(transparent)]
    Regex(#[from] regex::Error),
    #[cfg(feature = "cli")]
    #[error(transparent)]
    ShellWords(#[from] shell_words::ParseError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
