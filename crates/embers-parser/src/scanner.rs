/// Template scanner
///
/// Splits template text into literal and tag segments. The scanner knows
/// nothing about the scriptlet language beyond the tag markers; tag bodies are
/// handed on as text.

use crate::error::ScanError;
use crate::segment::{Delimiters, DEFAULT_OPEN, FilterStage, IncludeDirective, Segment, SegmentKind, LITERAL_ESCAPE};

/// Scan `source` into an ordered list of segments.
pub fn scan(source: &str, delimiters: &Delimiters) -> Result<Vec<Segment>, ScanError> {
    delimiters.validate()?;

    let open = delimiters.open.as_str();
    let close = delimiters.close.as_str();
    let percent_escape = open == DEFAULT_OPEN;

    let mut segments = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    while let Some(offset) = source[pos..].find(open) {
        let tag_start = pos + offset;
        if tag_start > pos {
            let text = &source[pos..tag_start];
            segments.push(Segment::new(SegmentKind::Literal(text.to_string()), line));
            line += count_newlines(text);
        }

        let after_open = tag_start + open.len();
        let rest = &source[after_open..];

        let escaped_percent = percent_escape && rest.starts_with(LITERAL_ESCAPE);
        if escaped_percent || rest.starts_with(open) {
            let marker_len = if escaped_percent { LITERAL_ESCAPE.len() } else { open.len() };
            segments.push(Segment::new(SegmentKind::DelimiterEscape, line));
            pos = after_open + marker_len;
            continue;
        }

        let (marker, marker_len) = tag_marker(rest);
        let body_start = after_open + marker_len;
        let Some(close_offset) = source[body_start..].find(close) else {
            return Err(ScanError::UnterminatedTag {
                close: close.to_string(),
                line,
            });
        };
        let close_start = body_start + close_offset;

        let mut body = &source[body_start..close_start];
        let mut trim_trailing_newline = false;
        if let Some(stripped) = body.strip_suffix('-') {
            body = stripped;
            trim_trailing_newline = true;
        }

        let kind = build_kind(marker, body, line)?;
        segments.push(Segment {
            kind,
            line,
            trim_trailing_newline,
        });

        let tag_end = close_start + close.len();
        line += count_newlines(&source[tag_start..tag_end]);
        pos = tag_end;
    }

    if pos < source.len() {
        segments.push(Segment::new(SegmentKind::Literal(source[pos..].to_string()), line));
    }

    Ok(segments)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Escaped,
    Pipeline,
    Raw,
    Comment,
    Code,
}

fn tag_marker(rest: &str) -> (Marker, usize) {
    if rest.starts_with("=:") {
        (Marker::Pipeline, 2)
    } else if rest.starts_with('=') {
        (Marker::Escaped, 1)
    } else if rest.starts_with('-') {
        (Marker::Raw, 1)
    } else if rest.starts_with('#') {
        (Marker::Comment, 1)
    } else {
        (Marker::Code, 0)
    }
}

fn build_kind(marker: Marker, body: &str, line: usize) -> Result<SegmentKind, ScanError> {
    Ok(match marker {
        Marker::Escaped => SegmentKind::EscapedOutput(body.trim().to_string()),
        Marker::Raw => SegmentKind::RawOutput(body.trim().to_string()),
        Marker::Comment => SegmentKind::Comment(body.to_string()),
        Marker::Pipeline => parse_pipeline(body, line)?,
        Marker::Code => match include_directive(body, line)? {
            Some(directive) => SegmentKind::Include(directive),
            None => SegmentKind::Scriptlet(body.to_string()),
        },
    })
}

/// Recognize `include path` / `include raw path` scriptlets.
fn include_directive(body: &str, line: usize) -> Result<Option<IncludeDirective>, ScanError> {
    let trimmed = body.trim();
    let Some(rest) = trimmed.strip_prefix("include") else {
        return Ok(None);
    };
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Ok(None);
    }

    let mut rest = rest.trim();
    let mut raw = false;
    if let Some(after) = rest.strip_prefix("raw") {
        if after.starts_with(char::is_whitespace) {
            raw = true;
            rest = after.trim_start();
        }
    }

    let path = unquote(rest).unwrap_or(rest);
    if path.is_empty() {
        return Err(ScanError::InvalidInclude { line });
    }

    Ok(Some(IncludeDirective {
        path: path.to_string(),
        raw,
    }))
}

fn unquote(text: &str) -> Option<&str> {
    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    if text.len() >= 2 && text.ends_with(quote) {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

/// Parse `expr | name | name:arg1,arg2` into a filter pipeline segment.
fn parse_pipeline(body: &str, line: usize) -> Result<SegmentKind, ScanError> {
    let mut parts = split_top_level(body, '|').into_iter();

    let expr = parts.next().unwrap_or_default().trim().to_string();
    if expr.is_empty() {
        return Err(ScanError::EmptyExpression { line });
    }

    let mut stages = Vec::new();
    for part in parts {
        let (name, args_text) = match split_top_level_once(part, ':') {
            Some((name, args)) => (name.trim(), Some(args)),
            None => (part.trim(), None),
        };
        if name.is_empty() {
            return Err(ScanError::EmptyFilterName { line });
        }

        let mut args = Vec::new();
        if let Some(args_text) = args_text.filter(|a| !a.trim().is_empty()) {
            for arg in split_top_level(args_text, ',') {
                let arg = arg.trim();
                if !is_filter_argument(arg) {
                    return Err(ScanError::InvalidFilterArgument {
                        filter: name.to_string(),
                        argument: arg.to_string(),
                        line,
                    });
                }
                args.push(arg.to_string());
            }
        }

        stages.push(FilterStage {
            name: name.to_string(),
            args,
        });
    }

    Ok(SegmentKind::FilterPipeline { expr, stages })
}

/// Split on `sep` outside quoted strings. A doubled `||` is never a separator.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' {
                    chars.next();
                } else if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                } else if c == sep {
                    if sep == '|' && chars.peek().map(|(_, n)| *n) == Some('|') {
                        chars.next();
                        continue;
                    }
                    parts.push(&text[start..i]);
                    start = i + c.len_utf8();
                }
            }
        }
    }

    parts.push(&text[start..]);
    parts
}

fn split_top_level_once(text: &str, sep: char) -> Option<(&str, &str)> {
    let parts = split_top_level(text, sep);
    if parts.len() < 2 {
        return None;
    }
    let head = parts[0];
    Some((head, &text[head.len() + sep.len_utf8()..]))
}

/// Quoted strings, numbers, `true`/`false`/`null` and identifier paths.
fn is_filter_argument(arg: &str) -> bool {
    if unquote(arg).is_some() {
        return true;
    }
    if is_number(arg) {
        return true;
    }
    !arg.is_empty()
        && arg.split('.').all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}

fn is_number(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    !int.is_empty()
        && int.chars().all(|c| c.is_ascii_digit())
        && frac.is_none_or(|f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()))
}

fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<SegmentKind> {
        scan(source, &Delimiters::default())
            .expect("scan failed")
            .into_iter()
            .map(|s| s.kind)
            .collect()
    }

    fn lit(text: &str) -> SegmentKind {
        SegmentKind::Literal(text.to_string())
    }

    #[test]
    fn test_plain_text_is_one_literal() {
        assert_eq!(kinds("<p>yay</p>\n"), vec![lit("<p>yay</p>\n")]);
        assert_eq!(kinds(""), vec![]);
    }

    #[test]
    fn test_tag_kinds() {
        assert_eq!(
            kinds("a<%= x %>b<%- y %><%# note %><% z = 1 %>"),
            vec![
                lit("a"),
                SegmentKind::EscapedOutput("x".to_string()),
                lit("b"),
                SegmentKind::RawOutput("y".to_string()),
                SegmentKind::Comment(" note ".to_string()),
                SegmentKind::Scriptlet(" z = 1 ".to_string()),
            ]
        );
    }

    #[test]
    fn test_literal_escape() {
        assert_eq!(
            kinds("<%%- \"foo\" %>"),
            vec![SegmentKind::DelimiterEscape, lit("- \"foo\" %>")]
        );
        assert_eq!(kinds("<%<%"), vec![SegmentKind::DelimiterEscape]);
    }

    #[test]
    fn test_percent_escape_needs_default_delimiters() {
        let braces = Delimiters::new("{", "}");
        let segments = scan("a{%x}b", &braces).unwrap();
        let kinds: Vec<_> = segments.into_iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![lit("a"), SegmentKind::Scriptlet("%x".to_string()), lit("b")]);

        let segments = scan("a{{b", &braces).unwrap();
        let kinds: Vec<_> = segments.into_iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![lit("a"), SegmentKind::DelimiterEscape, lit("b")]);
    }

    #[test]
    fn test_unterminated_tag() {
        let err = scan("<h1>oops</h1><%- name ->", &Delimiters::default()).unwrap_err();
        assert_eq!(err.to_string(), "Could not find matching close tag \"%>\".");

        let err = scan("{= name", &Delimiters::new("{", "}")).unwrap_err();
        assert_eq!(err.to_string(), "Could not find matching close tag \"}\".");
    }

    #[test]
    fn test_custom_delimiters() {
        for (open, close, source) in [
            ("{", "}", "<p>{= name }</p>"),
            ("::", "::", "<p>::= name ::</p>"),
            ("(", ")", "<p>(= name )</p>"),
            ("|", "|", "<p>|= name |</p>"),
        ] {
            let segments = scan(source, &Delimiters::new(open, close)).unwrap();
            let kinds: Vec<_> = segments.into_iter().map(|s| s.kind).collect();
            assert_eq!(
                kinds,
                vec![lit("<p>"), SegmentKind::EscapedOutput("name".to_string()), lit("</p>")],
                "delimiters {} {}",
                open,
                close
            );
        }
    }

    #[test]
    fn test_trim_marker() {
        let segments = scan("<% x -%>\nafter", &Delimiters::default()).unwrap();
        assert_eq!(segments[0].kind, SegmentKind::Scriptlet(" x ".to_string()));
        assert!(segments[0].trim_trailing_newline);
        assert_eq!(segments[1].kind, lit("\nafter"));
        assert!(!segments[1].trim_trailing_newline);
    }

    #[test]
    fn test_line_numbers() {
        let segments = scan("one\ntwo <% if x {\n %>\nthree<%= y %>", &Delimiters::default()).unwrap();
        let lines: Vec<usize> = segments.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_include_directives() {
        assert_eq!(
            kinds("<% include user/show %>"),
            vec![SegmentKind::Include(IncludeDirective {
                path: "user/show".to_string(),
                raw: false,
            })]
        );
        assert_eq!(
            kinds("<% include raw \"style.css\" %>"),
            vec![SegmentKind::Include(IncludeDirective {
                path: "style.css".to_string(),
                raw: true,
            })]
        );
        assert_eq!(
            kinds("<% included = true %>"),
            vec![SegmentKind::Scriptlet(" included = true ".to_string())]
        );
        assert!(matches!(
            scan("<% include %>", &Delimiters::default()),
            Err(ScanError::InvalidInclude { line: 1 })
        ));
    }

    #[test]
    fn test_filter_pipeline() {
        assert_eq!(
            kinds("<%=: users | map:\"name\" | join:\"::\" %>"),
            vec![SegmentKind::FilterPipeline {
                expr: "users".to_string(),
                stages: vec![
                    FilterStage { name: "map".to_string(), args: vec!["\"name\"".to_string()] },
                    FilterStage { name: "join".to_string(), args: vec!["\"::\"".to_string()] },
                ],
            }]
        );
    }

    #[test]
    fn test_filter_arguments() {
        assert_eq!(
            kinds("<%=: word | truncate: 2,\"...\" | join:\"|\" %>"),
            vec![SegmentKind::FilterPipeline {
                expr: "word".to_string(),
                stages: vec![
                    FilterStage {
                        name: "truncate".to_string(),
                        args: vec!["2".to_string(), "\"...\"".to_string()],
                    },
                    FilterStage { name: "join".to_string(), args: vec!["\"|\"".to_string()] },
                ],
            }]
        );
    }

    #[test]
    fn test_pipeline_keeps_logical_or() {
        assert_eq!(
            kinds("<%=: a || b | upcase %>"),
            vec![SegmentKind::FilterPipeline {
                expr: "a || b".to_string(),
                stages: vec![FilterStage { name: "upcase".to_string(), args: vec![] }],
            }]
        );
    }

    #[test]
    fn test_pipeline_errors() {
        let d = Delimiters::default();
        assert!(matches!(scan("<%=: | upcase %>", &d), Err(ScanError::EmptyExpression { .. })));
        assert!(matches!(scan("<%=: x | %>", &d), Err(ScanError::EmptyFilterName { .. })));
        assert!(matches!(
            scan("<%=: x | join:a+b %>", &d),
            Err(ScanError::InvalidFilterArgument { .. })
        ));
    }

    #[test]
    fn test_filter_argument_grammar() {
        assert!(is_filter_argument("\"a,b\""));
        assert!(is_filter_argument("'x'"));
        assert!(is_filter_argument("-3.5"));
        assert!(is_filter_argument("user.name"));
        assert!(!is_filter_argument("1."));
        assert!(!is_filter_argument("f(x)"));
        assert!(!is_filter_argument(""));
    }
}
