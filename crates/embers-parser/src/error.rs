/// Error types for scanning templates and parsing scriptlet programs

use embers_lexer::LexError;
use thiserror::Error;

use crate::token::ParserToken;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Could not find matching close tag \"{close}\".")]
    UnterminatedTag { close: String, line: usize },

    #[error("Missing expression before filter pipeline")]
    EmptyExpression { line: usize },

    #[error("Empty filter name in filter pipeline")]
    EmptyFilterName { line: usize },

    #[error("Unsupported argument `{argument}` for filter '{filter}'")]
    InvalidFilterArgument {
        filter: String,
        argument: String,
        line: usize,
    },

    #[error("Include directive is missing a path")]
    InvalidInclude { line: usize },

    #[error("Invalid delimiters: {0}")]
    InvalidDelimiters(String),
}

impl ScanError {
    /// Source line the error was found on, when known.
    pub fn line(&self) -> Option<usize> {
        match self {
            ScanError::UnterminatedTag { line, .. }
            | ScanError::EmptyExpression { line }
            | ScanError::EmptyFilterName { line }
            | ScanError::InvalidFilterArgument { line, .. }
            | ScanError::InvalidInclude { line } => Some(*line),
            ScanError::InvalidDelimiters(_) => None,
        }
    }
}

/// Error raised while parsing a scriptlet program.
///
/// Lines refer to the program text being parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{message}")]
    Syntax { message: String, line: usize },

    #[error(transparent)]
    Lexer(#[from] LexError),
}

/// Error type of the generated parser.
pub(crate) type GrammarError<'input> = lalrpop_util::ParseError<usize, ParserToken<'input>, ParseError>;

/// Expected-token lists longer than this are left out of messages.
const MAX_EXPECTED: usize = 3;

impl ParseError {
    pub fn syntax(message: impl Into<String>, line: usize) -> Self {
        ParseError::Syntax {
            message: message.into(),
            line,
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Syntax { line, .. } => Some(*line),
            ParseError::Lexer(e) => e.line(),
        }
    }

    /// Describe a failure of the generated parser over `input`.
    pub(crate) fn from_grammar(error: GrammarError<'_>, input: &str) -> Self {
        use lalrpop_util::ParseError as Grammar;

        match error {
            Grammar::User { error } => error,
            Grammar::InvalidToken { location } => ParseError::syntax("Invalid token", line_at(input, location)),
            Grammar::UnrecognizedEof { location, expected } => ParseError::syntax(
                with_expected("Unexpected end of input".to_string(), &expected),
                line_at(input, location),
            ),
            Grammar::UnrecognizedToken {
                token: (start, token, end),
                expected,
            } => ParseError::syntax(
                with_expected(unexpected(&token, input.get(start..end).unwrap_or_default()), &expected),
                line_at(input, start),
            ),
            Grammar::ExtraToken {
                token: (start, token, end),
            } => ParseError::syntax(
                unexpected(&token, input.get(start..end).unwrap_or_default()),
                line_at(input, start),
            ),
        }
    }
}

/// 1-based line containing byte `offset`.
fn line_at(input: &str, offset: usize) -> usize {
    let end = offset.min(input.len());
    input.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

fn unexpected(token: &ParserToken<'_>, text: &str) -> String {
    match token {
        ParserToken::Newline => "Unexpected end of line".to_string(),
        _ => format!("Unexpected token '{}'", text),
    }
}

fn with_expected(message: String, expected: &[String]) -> String {
    let names: Vec<String> = expected.iter().map(|t| terminal_name(t)).collect();
    match names.as_slice() {
        [] => message,
        [only] => format!("{message}, expected {only}"),
        [rest @ .., last] if names.len() <= MAX_EXPECTED => {
            format!("{message}, expected {} or {last}", rest.join(", "))
        }
        _ => message,
    }
}

/// Readable name for a terminal as the grammar spells it (`"}"`, `"identifier"`).
fn terminal_name(terminal: &str) -> String {
    match terminal.trim_matches('"') {
        "newline" => "end of line".to_string(),
        name @ ("identifier" | "number" | "string") => name.to_string(),
        symbol => format!("'{symbol}'"),
    }
}
