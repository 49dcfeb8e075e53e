use embers_lexer::{string_value, LexError, Rule, Token};
use try_next::TryNextWithContext;

use crate::error::ParseError;
use crate::token::ParserToken;

/// A token with its byte span, as the generated parser consumes it.
pub type Spanned<'input> = (usize, ParserToken<'input>, usize);

/// Kind of an open bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    /// `(`, `[` or an object literal `{`: newlines inside are insignificant
    Expression,
    /// `{` opening a statement block
    Block,
}

/// Adapter that wraps an Embers lexer and produces tokens in lalrpop format
///
/// Implements `Iterator<Item = Result<Spanned, ParseError>>`. Whitespace and
/// comments are dropped. Newlines are collapsed into a single statement
/// break, dropped inside expression brackets, and dropped before `else` so
/// that `}` and `else` may sit on different lines.
pub struct LexerAdapter<'input, L>
where
    L: TryNextWithContext<(), Item = Token, Error = LexError>,
{
    input: &'input str,
    lexer: L,
    brackets: Vec<Bracket>,
    /// Rule of the last token handed to the parser
    previous: Option<Rule>,
    /// Span of a statement break not emitted yet
    pending_break: Option<(usize, usize)>,
    /// Token held back while the pending break goes out first
    queued: Option<Spanned<'input>>,
    done: bool,
}

impl<'input, L> LexerAdapter<'input, L>
where
    L: TryNextWithContext<(), Item = Token, Error = LexError>,
{
    pub fn new(input: &'input str, lexer: L) -> Self {
        Self {
            input,
            lexer,
            brackets: Vec::new(),
            previous: None,
            pending_break: None,
            queued: None,
            done: false,
        }
    }

    fn in_expression(&self) -> bool {
        self.brackets.last() == Some(&Bracket::Expression)
    }

    /// Convert a significant lexer token to a parser token.
    fn convert_token(&self, token: &Token) -> Result<ParserToken<'input>, ParseError> {
        let text = token.text(self.input);

        Ok(match token.rule {
            Rule::Identifier => ParserToken::Identifier(text),
            Rule::Number => ParserToken::Number(
                text.parse()
                    .map_err(|_| ParseError::syntax(format!("Invalid number: {text}"), token.line))?,
            ),
            Rule::String => ParserToken::String(string_value(text)),
            Rule::Var => ParserToken::Var,
            Rule::Let => ParserToken::Let,
            Rule::If => ParserToken::If,
            Rule::Else => ParserToken::Else,
            Rule::For => ParserToken::For,
            Rule::In => ParserToken::In,
            Rule::True => ParserToken::True,
            Rule::False => ParserToken::False,
            Rule::Null => ParserToken::Null,
            Rule::LParen => ParserToken::LParen,
            Rule::RParen => ParserToken::RParen,
            Rule::LBracket => ParserToken::LBracket,
            Rule::RBracket => ParserToken::RBracket,
            Rule::LBrace => ParserToken::LBrace,
            Rule::RBrace => ParserToken::RBrace,
            Rule::Comma => ParserToken::Comma,
            Rule::Colon => ParserToken::Colon,
            Rule::Dot => ParserToken::Dot,
            Rule::Semicolon => ParserToken::Semicolon,
            Rule::Question => ParserToken::Question,
            Rule::Assign => ParserToken::Assign,
            Rule::Eq => ParserToken::Eq,
            Rule::Neq => ParserToken::Neq,
            Rule::Lt => ParserToken::Lt,
            Rule::Lte => ParserToken::Lte,
            Rule::Gt => ParserToken::Gt,
            Rule::Gte => ParserToken::Gte,
            Rule::AndAnd => ParserToken::AndAnd,
            Rule::OrOr => ParserToken::OrOr,
            Rule::Plus => ParserToken::Plus,
            Rule::Minus => ParserToken::Minus,
            Rule::Star => ParserToken::Star,
            Rule::Slash => ParserToken::Slash,
            Rule::Percent => ParserToken::Percent,
            Rule::Bang => ParserToken::Bang,
            Rule::Whitespace | Rule::Newline | Rule::Comment | Rule::End => {
                return Err(ParseError::syntax(format!("Unexpected {:?} token", token.rule), token.line));
            }
        })
    }

    /// Update the bracket stack for the token about to be emitted.
    ///
    /// A `{` right after an operand or `else` opens a block; anywhere else it
    /// starts an object literal.
    fn track(&mut self, rule: Rule, after_break: bool) {
        match rule {
            Rule::LParen | Rule::LBracket => self.brackets.push(Bracket::Expression),
            Rule::LBrace => {
                let block = !after_break && self.previous.is_some_and(ends_operand);
                self.brackets.push(if block { Bracket::Block } else { Bracket::Expression });
            }
            Rule::RParen | Rule::RBracket | Rule::RBrace => {
                self.brackets.pop();
            }
            _ => {}
        }
        self.previous = Some(rule);
    }
}

fn ends_operand(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::Identifier
            | Rule::Number
            | Rule::String
            | Rule::True
            | Rule::False
            | Rule::Null
            | Rule::RParen
            | Rule::RBracket
            | Rule::Else
    )
}

impl<'input, L> Iterator for LexerAdapter<'input, L>
where
    L: TryNextWithContext<(), Item = Token, Error = LexError>,
{
    type Item = Result<Spanned<'input>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(token) = self.queued.take() {
            return Some(Ok(token));
        }

        loop {
            if self.done {
                return None;
            }

            let token = match self.lexer.try_next_with_context(&mut ()) {
                Ok(Some(token)) => token,
                Ok(None) => {
                    self.done = true;
                    continue;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };

            match token.rule {
                Rule::Whitespace | Rule::Comment => continue,
                Rule::Newline => {
                    if !self.in_expression() && self.pending_break.is_none() {
                        self.pending_break = Some((token.span.start, token.span.end));
                    }
                    continue;
                }
                Rule::End => {
                    self.done = true;
                    return self
                        .pending_break
                        .take()
                        .map(|(start, end)| Ok((start, ParserToken::Newline, end)));
                }
                _ => {}
            }

            let parser_token = match self.convert_token(&token) {
                Ok(parser_token) => parser_token,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let spanned = (token.span.start, parser_token, token.span.end);

            let pending = self.pending_break.take();
            self.track(token.rule, pending.is_some());

            return match pending {
                Some((start, end)) if token.rule != Rule::Else => {
                    self.queued = Some(spanned);
                    Some(Ok((start, ParserToken::Newline, end)))
                }
                _ => Some(Ok(spanned)),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embers_lexer::lex_str;

    fn adapt(input: &str) -> Vec<ParserToken<'_>> {
        let lexer = lex_str(input).expect("lexer setup failed");
        LexerAdapter::new(input, lexer)
            .map(|t| t.map(|(_, token, _)| token))
            .collect::<Result<_, _>>()
            .expect("adapter failed")
    }

    #[test]
    fn test_newlines_collapse_into_one_break() {
        assert_eq!(
            adapt("a\n\n  // note\nb"),
            vec![ParserToken::Identifier("a"), ParserToken::Newline, ParserToken::Identifier("b")]
        );
    }

    #[test]
    fn test_newlines_inside_brackets_are_dropped() {
        assert_eq!(
            adapt("f(\n1,\n[2\n]\n)"),
            vec![
                ParserToken::Identifier("f"),
                ParserToken::LParen,
                ParserToken::Number(1.0),
                ParserToken::Comma,
                ParserToken::LBracket,
                ParserToken::Number(2.0),
                ParserToken::RBracket,
                ParserToken::RParen,
            ]
        );
    }

    #[test]
    fn test_block_keeps_newlines_object_drops_them() {
        let tokens = adapt("if a {\nx = {\nk: 1\n}\n}");
        assert_eq!(
            tokens,
            vec![
                ParserToken::If,
                ParserToken::Identifier("a"),
                ParserToken::LBrace,
                ParserToken::Newline,
                ParserToken::Identifier("x"),
                ParserToken::Assign,
                ParserToken::LBrace,
                ParserToken::Identifier("k"),
                ParserToken::Colon,
                ParserToken::Number(1.0),
                ParserToken::RBrace,
                ParserToken::Newline,
                ParserToken::RBrace,
            ]
        );
    }

    #[test]
    fn test_else_on_next_line_joins_the_if() {
        let tokens = adapt("}\nelse {");
        assert_eq!(tokens, vec![ParserToken::RBrace, ParserToken::Else, ParserToken::LBrace]);
    }

    #[test]
    fn test_trailing_newline_becomes_break() {
        let tokens = adapt("x\n");
        assert_eq!(tokens, vec![ParserToken::Identifier("x"), ParserToken::Newline]);
    }

    #[test]
    fn test_string_literals_are_decoded() {
        assert_eq!(adapt(r#"'it\'s'"#), vec![ParserToken::String("it's".to_string())]);
    }

    #[test]
    fn test_lexer_errors_pass_through() {
        let input = "a\n@";
        let lexer = lex_str(input).unwrap();
        let result: Result<Vec<_>, _> = LexerAdapter::new(input, lexer).collect();
        assert!(matches!(result, Err(ParseError::Lexer(LexError::UnexpectedChar { ch: '@', line: 2 }))));
    }
}
