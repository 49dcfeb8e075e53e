//! Error types for the Embers interpreter.

use embers_parser::ParseError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Failure raised while evaluating scriptlet or expression code.
    #[error("{0}")]
    Runtime(String),

    #[error("Filter '{name}' failed: {message}")]
    Filter { name: String, message: String },

    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl Error {
    pub fn runtime(message: impl Into<String>) -> Self {
        Error::Runtime(message.into())
    }
}
