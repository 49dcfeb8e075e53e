//! Maps failures back to template source lines.

use std::collections::{BTreeMap, HashMap};

use embers_eval::Failure;
use embers_parser::ParseError;

use crate::codegen::LineTable;
use crate::error::{CompileError, RuntimeError};

/// Lines shown on each side of the failing line.
const CONTEXT_LINES: usize = 3;

/// Render the numbered source excerpt around `line`.
///
/// The failing line is marked with ` >> `, the others are indented by four
/// spaces. Numbers are right-aligned to the widest one shown.
pub fn context_block(source: &str, line: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let start = line.saturating_sub(CONTEXT_LINES).max(1);
    let end = (line + CONTEXT_LINES).min(lines.len());
    let width = end.max(line).to_string().len();

    (start..=end.max(start))
        .filter_map(|n| {
            let text = lines.get(n - 1)?;
            let marker = if n == line { " >> " } else { "    " };
            Some(format!("{marker}{n:>width$}| {text}"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turn an interpreter failure into a [`RuntimeError`].
///
/// Position and context are only known when the program carried line
/// tracking; otherwise just the message survives.
pub fn map_runtime_failure(failure: Failure, sources: &BTreeMap<Option<String>, String>) -> RuntimeError {
    let mut error = RuntimeError::new(failure.error.to_string());
    let Some(location) = failure.location else {
        return error;
    };

    let text = lookup_source(&failure.sources, sources, &location.file);
    error.context = text.map(|text| context_block(text, location.line));
    error.path = location.file;
    error.line = Some(location.line);
    error
}

fn lookup_source<'s>(
    registered: &'s HashMap<Option<String>, String>,
    compiled: &'s BTreeMap<Option<String>, String>,
    file: &Option<String>,
) -> Option<&'s str> {
    registered
        .get(file)
        .or_else(|| compiled.get(file))
        .map(String::as_str)
}

/// Map a parse error in the generated program to the template it came from.
///
/// Without a line table the error is attributed to `filename` only. When
/// the template has no filename the line is folded into the message.
pub fn map_parse_error(error: ParseError, table: Option<&LineTable>, filename: Option<&str>) -> CompileError {
    let message = error.to_string();
    let entry = table.zip(error.line()).and_then(|(table, line)| table.lookup(line));
    match (entry, filename) {
        (Some(entry), _) if entry.file.is_some() => CompileError::Syntax {
            message,
            path: entry.file.clone(),
            line: Some(entry.line),
        },
        (Some(entry), _) => CompileError::Syntax {
            message: format!("line {}: {message}", entry.line),
            path: None,
            line: Some(entry.line),
        },
        (None, Some(path)) => CompileError::syntax(message, Some(path), None),
        (None, None) => CompileError::syntax(format!("{message} while compiling template"), None, None),
    }
}
