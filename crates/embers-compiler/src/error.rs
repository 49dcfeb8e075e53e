/// Error types for the Embers compiler

use thiserror::Error;

use crate::loader::LoadError;

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("{}", located(path.as_deref(), *line, message))]
    Syntax {
        message: String,
        path: Option<String>,
        line: Option<usize>,
    },

    #[error("Could not find include \"{path}\" (included from {from})")]
    IncludeNotFound {
        path: String,
        from: String,
        #[source]
        source: LoadError,
    },

    #[error("`include` on line {line} needs the `filename` option to resolve relative paths")]
    MissingSourcePath { line: usize },

    #[error("Circular include: {}", chain.join(" -> "))]
    CircularInclude { chain: Vec<String> },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl CompileError {
    pub fn syntax(message: impl Into<String>, path: Option<&str>, line: Option<usize>) -> Self {
        CompileError::Syntax {
            message: message.into(),
            path: path.map(str::to_string),
            line,
        }
    }
}

/// `path:line: message`, `path: message`, or the bare message without a path.
fn located(path: Option<&str>, line: Option<usize>, message: &str) -> String {
    match (path, line) {
        (Some(path), Some(line)) => format!("{path}:{line}: {message}"),
        (Some(path), None) => format!("{path}: {message}"),
        (None, _) => message.to_string(),
    }
}

/// A failure raised while invoking a compiled template.
///
/// `path`, `line` and `context` are only filled in for templates compiled in
/// debug mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}{}", .context.as_ref().map(|c| format!("\n{c}")).unwrap_or_default())]
pub struct RuntimeError {
    pub message: String,
    pub path: Option<String>,
    pub line: Option<usize>,
    pub context: Option<String>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            line: None,
            context: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("Locals must serialize to an object: {0}")]
    Locals(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_display() {
        let bare = CompileError::syntax("Could not find matching close tag \"%>\".", None, Some(3));
        assert_eq!(bare.to_string(), "Could not find matching close tag \"%>\".");

        let with_path = CompileError::syntax("oops", Some("views/a.ejs"), None);
        assert_eq!(with_path.to_string(), "views/a.ejs: oops");

        let with_line = CompileError::syntax("oops", Some("views/a.ejs"), Some(4));
        assert_eq!(with_line.to_string(), "views/a.ejs:4: oops");
    }

    #[test]
    fn test_runtime_display() {
        let mut err = RuntimeError::new("x is not defined");
        assert_eq!(err.to_string(), "x is not defined");
        err.context = Some(" >> 1| <%= x %>".to_string());
        assert_eq!(err.to_string(), "x is not defined\n >> 1| <%= x %>");
    }

    #[test]
    fn test_circular_display() {
        let err = CompileError::CircularInclude {
            chain: vec!["a.ejs".into(), "b.ejs".into(), "a.ejs".into()],
        };
        assert_eq!(err.to_string(), "Circular include: a.ejs -> b.ejs -> a.ejs");
    }
}
