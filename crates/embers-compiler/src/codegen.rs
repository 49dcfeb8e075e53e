/// Code generation module
///
/// Transforms template segments into a scriptlet program that builds the
/// output buffer. Every statement sits on its own line; scriptlet code is
/// spliced in verbatim.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use embers_eval::FilterRegistry;
use embers_parser::{scan, FilterStage, IncludeDirective, Segment, SegmentKind};

use crate::error::{CompileError, Result};
use crate::include::{IncludeResolver, Resolved};
use crate::options::CompileOptions;

/// Template position a generated line came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    /// 1-based line in the generated program
    pub generated: usize,
    pub file: Option<String>,
    /// 1-based line in the template
    pub line: usize,
}

/// Ordered mapping from generated lines back to template lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineTable {
    entries: Vec<LineEntry>,
}

impl LineTable {
    pub fn record(&mut self, generated: usize, file: Option<&str>, line: usize) {
        self.entries.push(LineEntry {
            generated,
            file: file.map(str::to_string),
            line,
        });
    }

    /// The entry covering `generated`: the last one starting at or before it.
    pub fn lookup(&self, generated: usize) -> Option<&LineEntry> {
        let idx = self.entries.partition_point(|e| e.generated <= generated);
        idx.checked_sub(1).map(|i| &self.entries[i])
    }

    /// Shift every entry down by `lines` generated lines.
    pub fn offset(&mut self, lines: usize) {
        for entry in &mut self.entries {
            entry.generated += lines;
        }
    }

    pub fn entries(&self) -> &[LineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Output of the code generator.
#[derive(Debug, Clone, Default)]
pub struct Generated {
    pub code: String,
    /// Present only in debug mode.
    pub line_table: Option<LineTable>,
    /// Texts of the root template and every compiled include, keyed by path.
    /// Only collected in debug mode.
    pub sources: BTreeMap<Option<String>, String>,
}

/// Scriptlet program generator
pub struct CodeGenerator<'a> {
    options: &'a CompileOptions,
    filters: &'a FilterRegistry,
    resolver: IncludeResolver<'a>,
    output: String,
    /// Generated lines written so far
    lines: usize,
    table: LineTable,
    sources: BTreeMap<Option<String>, String>,
    /// Drop one newline from the start of the next literal
    trim_next: bool,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(options: &'a CompileOptions, filters: &'a FilterRegistry, resolver: IncludeResolver<'a>) -> Self {
        Self {
            options,
            filters,
            resolver,
            output: String::new(),
            lines: 0,
            table: LineTable::default(),
            sources: BTreeMap::new(),
            trim_next: false,
        }
    }

    /// Generate the program for a root template.
    pub fn generate(mut self, source: &str) -> Result<Generated> {
        let options = self.options;
        let file = options.filename.as_deref();

        if let Some(path) = file {
            self.resolver.enter(path)?;
        }
        if options.compile_debug {
            self.sources.insert(file.map(str::to_string), source.to_string());
            if let Some(path) = file {
                self.emit(&format!("__file({})", quote(path)));
            }
        }

        self.template(source, file)?;

        let debug = options.compile_debug;
        Ok(Generated {
            code: self.output,
            line_table: debug.then_some(self.table),
            sources: self.sources,
        })
    }

    fn template(&mut self, source: &str, file: Option<&str>) -> Result<()> {
        let segments = scan(source, &self.options.delimiters())
            .map_err(|e| CompileError::syntax(e.to_string(), file, e.line()))?;

        for segment in &segments {
            self.segment(segment, file)?;
        }
        Ok(())
    }

    fn segment(&mut self, segment: &Segment, file: Option<&str>) -> Result<()> {
        let line = segment.line;

        match &segment.kind {
            SegmentKind::Literal(text) => {
                let text = if self.trim_next { strip_leading_newline(text) } else { text };
                if !text.is_empty() {
                    self.mark(file, line);
                    self.emit(&format!("__out({})", quote(text)));
                }
            }
            SegmentKind::Comment(_) => {}
            SegmentKind::DelimiterEscape => {
                self.emit(&format!("__out({})", quote(&self.options.open)));
            }
            SegmentKind::Scriptlet(code) => {
                self.mark(file, line);
                // Scriptlet lines map one to one onto template lines
                if self.options.compile_debug {
                    for i in 1..code.matches('\n').count() + 1 {
                        self.table.record(self.lines + 1 + i, file, line + i);
                    }
                }
                self.emit(code);
            }
            SegmentKind::EscapedOutput(expr) => {
                self.mark(file, line);
                self.emit(&format!("__out(__escape({}))", expr.trim()));
            }
            SegmentKind::RawOutput(expr) => {
                self.mark(file, line);
                self.emit(&format!("__out({})", expr.trim()));
            }
            SegmentKind::FilterPipeline { expr, stages } => {
                let call = self.pipeline(expr.trim(), stages, file, line)?;
                self.mark(file, line);
                self.emit(&format!("__out(__escape({call}))"));
            }
            SegmentKind::Include(directive) => self.include(directive, file, line)?,
        }

        self.trim_next = segment.trim_trailing_newline;
        Ok(())
    }

    /// Nest one `__filter` call per stage, first stage innermost.
    fn pipeline(&self, expr: &str, stages: &[FilterStage], file: Option<&str>, line: usize) -> Result<String> {
        let mut call = expr.to_string();
        for stage in stages {
            if !self.filters.contains(&stage.name) {
                return Err(CompileError::syntax(
                    format!("Unknown filter '{}'", stage.name),
                    file,
                    Some(line),
                ));
            }
            let mut next = format!("__filter({}, {}", quote(&stage.name), call);
            for arg in &stage.args {
                let _ = write!(next, ", {arg}");
            }
            next.push(')');
            call = next;
        }
        Ok(call)
    }

    fn include(&mut self, directive: &IncludeDirective, file: Option<&str>, line: usize) -> Result<()> {
        match self.resolver.resolve(directive, file, line)? {
            Resolved::Raw { text, .. } => {
                if !text.is_empty() {
                    self.mark(file, line);
                    self.emit(&format!("__out({})", quote(&text)));
                }
            }
            Resolved::Template { path, text } => {
                self.resolver.enter(&path)?;
                let debug = self.options.compile_debug;
                if debug {
                    self.sources.insert(Some(path.clone()), text.clone());
                    self.emit(&format!("__file({})", quote(&path)));
                }

                self.trim_next = false;
                self.template(&text, Some(&path))?;

                if debug {
                    let back = file.map(quote).unwrap_or_else(|| "null".to_string());
                    self.emit(&format!("__file({back})"));
                }
                self.resolver.leave();
            }
        }
        Ok(())
    }

    /// In debug mode, record the segment's position and emit `__line`.
    fn mark(&mut self, file: Option<&str>, line: usize) {
        if self.options.compile_debug {
            self.emit(&format!("__line({line})"));
            self.table.record(self.lines + 1, file, line);
        }
    }

    fn emit(&mut self, statement: &str) {
        self.output.push_str(statement);
        self.output.push('\n');
        self.lines += 1 + statement.matches('\n').count();
    }
}

fn strip_leading_newline(text: &str) -> &str {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text)
}

/// Quote `text` as a scriptlet string literal.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
