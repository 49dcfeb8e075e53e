/// Template segments produced by the scanner
///
/// A template is a flat sequence of segments. Each segment remembers the
/// 1-based source line its text starts on.

use crate::error::ScanError;

/// Marker that, placed right after the default open delimiter, turns it
/// into literal text (`<%%` renders as `<%`).
///
/// Custom delimiters only escape by doubling the open delimiter (`{{`).
pub const LITERAL_ESCAPE: &str = "%";

pub const DEFAULT_OPEN: &str = "<%";
pub const DEFAULT_CLOSE: &str = "%>";

/// Open/close delimiter pair used to find tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub open: String,
    pub close: String,
}

impl Delimiters {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Check that both delimiters are usable.
    ///
    /// Open and close may be equal (`::` / `::`), but neither may be empty or
    /// the literal-escape marker.
    pub fn validate(&self) -> Result<(), ScanError> {
        for (which, value) in [("open", &self.open), ("close", &self.close)] {
            if value.is_empty() {
                return Err(ScanError::InvalidDelimiters(format!("{} delimiter must not be empty", which)));
            }
            if value == LITERAL_ESCAPE {
                return Err(ScanError::InvalidDelimiters(format!(
                    "{} delimiter must not be the literal escape marker \"{}\"",
                    which, LITERAL_ESCAPE
                )));
            }
        }
        Ok(())
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new(DEFAULT_OPEN, DEFAULT_CLOSE)
    }
}

/// One `name:arg1,arg2` stage of a filter pipeline.
///
/// Arguments are kept as source text; they are valid scriptlet expressions
/// (quoted strings, numbers, keywords or identifier paths).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStage {
    pub name: String,
    pub args: Vec<String>,
}

/// Target of an `include` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    /// Path as written, quotes removed.
    pub path: String,
    /// Inline the file as literal text without scanning it.
    pub raw: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Literal text, byte-for-byte.
    Literal(String),
    /// Scriptlet code spliced verbatim into the generated program.
    Scriptlet(String),
    /// `<%= expr %>`
    EscapedOutput(String),
    /// `<%- expr %>`
    RawOutput(String),
    /// `<%# text %>`, dropped by code generation.
    Comment(String),
    /// `<%%`, renders one literal open delimiter.
    DelimiterEscape,
    /// `<% include path %>`
    Include(IncludeDirective),
    /// `<%=: expr | name:args | ... %>`
    FilterPipeline { expr: String, stages: Vec<FilterStage> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    /// 1-based source line where the segment starts.
    pub line: usize,
    /// Tag was closed with `-%>`: drop one newline right after it.
    pub trim_trailing_newline: bool,
}

impl Segment {
    pub fn new(kind: SegmentKind, line: usize) -> Self {
        Self {
            kind,
            line,
            trim_trailing_newline: false,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, SegmentKind::Literal(_))
    }
}
