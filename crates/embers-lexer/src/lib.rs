//! Tokenizer for the Embers scriptlet language.
//!
//! Tokens are described by a table of regular expressions compiled once into
//! a single anchored pattern. The lexer yields [`Token`]s carrying byte spans
//! and the 1-based line they start on. Whitespace, newlines and `//` comments
//! are produced as tokens so that the parser can decide which of them matter.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use try_next::TryNextWithContext;

/// Byte range of a token inside the lexed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Token kinds recognized by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Whitespace,
    Newline,
    Comment,
    Identifier,
    Number,
    String,
    Var,
    Let,
    If,
    Else,
    For,
    In,
    True,
    False,
    Null,
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
    End,
}

/// Token produced by the Embers lexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub rule: Rule,
    pub span: Span,
    /// 1-based line on which the token starts.
    pub line: usize,
}

impl Token {
    pub fn new(rule: Rule, span: Span, line: usize) -> Self {
        Self { rule, span, line }
    }

    /// The slice of `input` covered by this token.
    pub fn text<'a>(&self, input: &'a str) -> &'a str {
        &input[self.span.start..self.span.end]
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unterminated string literal")]
    UnterminatedString { line: usize },

    #[error("Unexpected character '{ch}'")]
    UnexpectedChar { ch: char, line: usize },

    #[error("Invalid token table: {0}")]
    Table(String),
}

impl LexError {
    /// Line of the lexed input the error was found on.
    pub fn line(&self) -> Option<usize> {
        match self {
            LexError::UnterminatedString { line } | LexError::UnexpectedChar { line, .. } => Some(*line),
            LexError::Table(_) => None,
        }
    }
}

/// What a matched table entry produces.
#[derive(Debug, Clone, Copy)]
enum Action {
    Emit(Rule),
    /// Identifier, or the keyword it spells
    Word,
    Unterminated,
    Stray,
}

/// Token table. Entries are tried in order at each position and the first
/// one that matches wins, so longer operators come before their prefixes.
const TABLE: &[(Action, &str)] = &[
    (Action::Emit(Rule::Newline), r"\r?\n"),
    (Action::Emit(Rule::Whitespace), r"[^\S\n]+"),
    (Action::Emit(Rule::Comment), r"//[^\n]*"),
    (Action::Emit(Rule::String), r#""(?:[^"\\\n]|\\[\s\S])*""#),
    (Action::Emit(Rule::String), r"'(?:[^'\\\n]|\\[\s\S])*'"),
    (Action::Unterminated, r#"["'][^\n]*"#),
    (Action::Emit(Rule::Number), r"[0-9]+(?:\.[0-9]+)?"),
    (Action::Word, r"[A-Za-z_$][A-Za-z0-9_$]*"),
    (Action::Emit(Rule::Eq), r"===?"),
    (Action::Emit(Rule::Neq), r"!==?"),
    (Action::Emit(Rule::Lte), r"<="),
    (Action::Emit(Rule::Gte), r">="),
    (Action::Emit(Rule::AndAnd), r"&&"),
    (Action::Emit(Rule::OrOr), r"\|\|"),
    (Action::Emit(Rule::Assign), r"="),
    (Action::Emit(Rule::Bang), r"!"),
    (Action::Emit(Rule::Lt), r"<"),
    (Action::Emit(Rule::Gt), r">"),
    (Action::Emit(Rule::Plus), r"\+"),
    (Action::Emit(Rule::Minus), r"-"),
    (Action::Emit(Rule::Star), r"\*"),
    (Action::Emit(Rule::Slash), r"/"),
    (Action::Emit(Rule::Percent), r"%"),
    (Action::Emit(Rule::LParen), r"\("),
    (Action::Emit(Rule::RParen), r"\)"),
    (Action::Emit(Rule::LBracket), r"\["),
    (Action::Emit(Rule::RBracket), r"\]"),
    (Action::Emit(Rule::LBrace), r"\{"),
    (Action::Emit(Rule::RBrace), r"\}"),
    (Action::Emit(Rule::Comma), r","),
    (Action::Emit(Rule::Colon), r":"),
    (Action::Emit(Rule::Dot), r"\."),
    (Action::Emit(Rule::Semicolon), r";"),
    (Action::Emit(Rule::Question), r"\?"),
    (Action::Stray, r"[\s\S]"),
];

/// The table compiled into one anchored alternation, one group per entry.
static TOKEN_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    let alternatives: Vec<String> = TABLE.iter().map(|(_, pattern)| format!("({pattern})")).collect();
    Regex::new(&format!("^(?:{})", alternatives.join("|")))
});

/// Streaming lexer over a string slice.
pub struct Lexer<'input> {
    input: &'input str,
    pattern: &'static Regex,
    pos: usize,
    line: usize,
    finished: bool,
}

impl<'input> Lexer<'input> {
    pub fn try_new(input: &'input str) -> Result<Self, LexError> {
        let pattern = TOKEN_PATTERN
            .as_ref()
            .map_err(|e| LexError::Table(e.to_string()))?;
        Ok(Self {
            input,
            pattern,
            pos: 0,
            line: 1,
            finished: false,
        })
    }

    /// Produce the next token, `Rule::End` once, then `None`.
    pub fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        if self.finished {
            return Ok(None);
        }

        let start = self.pos;
        let line = self.line;
        let rest = &self.input[start..];
        if rest.is_empty() {
            self.finished = true;
            return Ok(Some(Token::new(Rule::End, Span { start, end: start }, line)));
        }

        let matched = self.pattern.captures(rest).and_then(|captures| {
            (1..captures.len()).find_map(|group| captures.get(group).map(|m| (group - 1, m.end())))
        });
        let Some((entry, len)) = matched else {
            self.finished = true;
            let ch = rest.chars().next().unwrap_or_default();
            return Err(LexError::UnexpectedChar { ch, line });
        };

        let text = &rest[..len];
        let rule = match TABLE[entry].0 {
            Action::Emit(rule) => rule,
            Action::Word => keyword(text).unwrap_or(Rule::Identifier),
            Action::Unterminated => {
                self.finished = true;
                return Err(LexError::UnterminatedString { line });
            }
            Action::Stray => {
                self.finished = true;
                let ch = text.chars().next().unwrap_or_default();
                return Err(LexError::UnexpectedChar { ch, line });
            }
        };

        self.pos = start + len;
        self.line += text.matches('\n').count();
        Ok(Some(Token::new(rule, Span { start, end: self.pos }, line)))
    }
}

fn keyword(text: &str) -> Option<Rule> {
    Some(match text {
        "var" => Rule::Var,
        "let" => Rule::Let,
        "if" => Rule::If,
        "else" => Rule::Else,
        "for" => Rule::For,
        "in" => Rule::In,
        "true" => Rule::True,
        "false" => Rule::False,
        "null" => Rule::Null,
        _ => return None,
    })
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

impl TryNextWithContext<()> for Lexer<'_> {
    type Item = Token;
    type Error = LexError;

    fn try_next_with_context(&mut self, _context: &mut ()) -> Result<Option<Self::Item>, Self::Error> {
        self.next_token()
    }
}

/// Create a new lexer from a string
pub fn lex_str(input: &str) -> Result<Lexer<'_>, LexError> {
    Lexer::try_new(input)
}

/// Lex the whole input, ending with a single `Rule::End` token.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    lex_str(input)?.collect()
}

/// Decode the contents of a quoted string token (quotes included).
///
/// Unknown escapes are kept as-is, backslash included.
pub fn string_value(token_text: &str) -> String {
    let inner = &token_text[1..token_text.len().saturating_sub(1).max(1)];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to collect all significant tokens from input
    fn collect_tokens(input: &str) -> Result<Vec<Rule>, LexError> {
        let mut lexer = lex_str(input)?;
        let mut context = ();
        let mut tokens = Vec::new();

        while let Some(token) = lexer.try_next_with_context(&mut context)? {
            tokens.push(token.rule);
        }

        Ok(tokens)
    }

    #[test]
    fn test_empty_input() -> Result<(), LexError> {
        let tokens = collect_tokens("")?;
        assert_eq!(tokens, vec![Rule::End]);
        Ok(())
    }

    #[test]
    fn test_keywords() -> Result<(), LexError> {
        let tokens = collect_tokens("var let if else for in")?;
        assert_eq!(
            tokens,
            vec![
                Rule::Var, Rule::Whitespace,
                Rule::Let, Rule::Whitespace,
                Rule::If, Rule::Whitespace,
                Rule::Else, Rule::Whitespace,
                Rule::For, Rule::Whitespace,
                Rule::In,
                Rule::End,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_keywords_vs_identifiers() -> Result<(), LexError> {
        let tokens = collect_tokens("variable iffy __out $x")?;
        assert_eq!(
            tokens,
            vec![
                Rule::Identifier, Rule::Whitespace,
                Rule::Identifier, Rule::Whitespace,
                Rule::Identifier, Rule::Whitespace,
                Rule::Identifier,
                Rule::End,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_operators() -> Result<(), LexError> {
        let tokens = collect_tokens("= == === != !== <= >= && || !")?;
        let significant: Vec<Rule> = tokens.into_iter().filter(|r| *r != Rule::Whitespace).collect();
        assert_eq!(
            significant,
            vec![
                Rule::Assign, Rule::Eq, Rule::Eq, Rule::Neq, Rule::Neq,
                Rule::Lte, Rule::Gte, Rule::AndAnd, Rule::OrOr, Rule::Bang,
                Rule::End,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_numbers_and_member_access() -> Result<(), LexError> {
        let tokens = collect_tokens("3.14 items.length 2.x")?;
        let significant: Vec<Rule> = tokens.into_iter().filter(|r| *r != Rule::Whitespace).collect();
        assert_eq!(
            significant,
            vec![
                Rule::Number,
                Rule::Identifier, Rule::Dot, Rule::Identifier,
                Rule::Number, Rule::Dot, Rule::Identifier,
                Rule::End,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_strings_with_escapes() -> Result<(), LexError> {
        let input = r#""say \"hi\"" 'it\'s'"#;
        let tokens = tokenize(input)?;
        assert_eq!(tokens[0].rule, Rule::String);
        assert_eq!(string_value(tokens[0].text(input)), "say \"hi\"");
        assert_eq!(tokens[2].rule, Rule::String);
        assert_eq!(string_value(tokens[2].text(input)), "it's");
        Ok(())
    }

    #[test]
    fn test_line_tracking() -> Result<(), LexError> {
        let tokens = tokenize("a\nb\r\n// note\nc")?;
        let lines: Vec<(Rule, usize)> = tokens.iter().map(|t| (t.rule, t.line)).collect();
        assert_eq!(
            lines,
            vec![
                (Rule::Identifier, 1), (Rule::Newline, 1),
                (Rule::Identifier, 2), (Rule::Newline, 2),
                (Rule::Comment, 3), (Rule::Newline, 3),
                (Rule::Identifier, 4),
                (Rule::End, 4),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("x = \"open").unwrap_err();
        assert_eq!(err, LexError::UnterminatedString { line: 1 });
    }

    #[test]
    fn test_error_messages_leave_line_to_caller() {
        let err = tokenize("a\nb\n__out(\"abc)").unwrap_err();
        assert_eq!(err.line(), Some(3));
        assert_eq!(err.to_string(), "Unterminated string literal");

        let err = tokenize("a\n#").unwrap_err();
        assert_eq!(err.to_string(), "Unexpected character '#'");
    }

    #[test]
    fn test_non_ascii_strings_and_words() -> Result<(), LexError> {
        let input = "__out(\"caf\u{e9} \u{2014} \u{1f525}\") var$x";
        let tokens = tokenize(input)?;
        assert_eq!(tokens[2].rule, Rule::String);
        assert_eq!(string_value(tokens[2].text(input)), "caf\u{e9} \u{2014} \u{1f525}");
        assert_eq!(tokens[5].rule, Rule::Identifier);
        assert_eq!(tokens[5].text(input), "var$x");
        Ok(())
    }

    #[test]
    fn test_unexpected_char() {
        let err = tokenize("a\n#").unwrap_err();
        assert_eq!(err, LexError::UnexpectedChar { ch: '#', line: 2 });
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_string_value_unknown_escape() {
        assert_eq!(string_value(r#""a\qb""#), "a\\qb");
        assert_eq!(string_value(r#""line\nbreak""#), "line\nbreak");
    }
}
