//! Front end of the Embers template compiler.
//!
//! Two inputs pass through this crate:
//!
//! - template text, which [`scan`] splits into [`Segment`]s using the
//!   configured delimiters, and
//! - scriptlet-language programs (the generated code), which [`parse`] turns
//!   into a [`Program`] for the interpreter. The grammar lives in
//!   `embers.lalrpop`; [`LexerAdapter`] feeds it tokens from `embers-lexer`.

pub mod adapter;
pub mod ast;
pub mod error;
pub mod scanner;
pub mod segment;
pub mod token;

// Include generated parser code from lalrpop
#[allow(clippy::all)]
mod embers {
    include!(concat!(env!("OUT_DIR"), "/embers.rs"));
}

pub use adapter::LexerAdapter;
pub use ast::*;
pub use error::{ParseError, ScanError};
pub use scanner::scan;
pub use segment::{Delimiters, FilterStage, IncludeDirective, Segment, SegmentKind, LITERAL_ESCAPE};
pub use token::ParserToken;

use embers_lexer::lex_str;

/// Parse a scriptlet program from a string
///
/// Statements are separated by newlines or `;`. Inside parentheses, brackets
/// and object literals newlines are insignificant, so an expression spliced
/// from a multi-line tag still parses as one expression.
pub fn parse(input: &str) -> Result<Program, ParseError> {
    let lexer = lex_str(input)?;
    let adapter = LexerAdapter::new(input, lexer);

    embers::ProgramParser::new()
        .parse(input, adapter)
        .map_err(|e| ParseError::from_grammar(e, input))
}
