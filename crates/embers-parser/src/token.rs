/// Parser token with lifetime-carrying string slices
///
/// Produced by [`crate::adapter::LexerAdapter`] from lexer rules. Literal
/// values are decoded here so the grammar actions stay infallible.
#[derive(Debug, Clone, PartialEq)]
pub enum ParserToken<'input> {
    /// Statement break; only emitted where a newline ends a statement
    Newline,

    // Literals
    Identifier(&'input str),
    Number(f64),
    String(String),

    // Keywords
    Var,
    Let,
    If,
    Else,
    For,
    In,
    True,
    False,
    Null,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Semicolon,
    Question,

    // Operators
    Assign,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    AndAnd,
    OrOr,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
}
