//! Compiled templates.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use embers_eval::{Interpreter, Value};
use embers_parser::Program;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::trace;

use crate::diagnostics::{map_parse_error, map_runtime_failure};
use crate::error::{CompileError, RenderError, RuntimeError};
use crate::options::{CompileOptions, TargetMode};

/// A compiled template: call [`Template::render`] with locals to get output.
///
/// Cheap to clone; clones share the parsed program. Rendering never mutates
/// the template, so one instance can serve concurrent callers.
#[derive(Clone)]
pub struct Template {
    inner: Arc<Inner>,
}

struct Inner {
    program: Program,
    code: String,
    interpreter: Interpreter,
    target: TargetMode,
    filename: Option<String>,
    /// Template texts for diagnostics; empty unless compiled with debug on.
    sources: BTreeMap<Option<String>, String>,
}

impl Template {
    pub(crate) fn new(
        program: Program,
        code: String,
        options: &CompileOptions,
        sources: BTreeMap<Option<String>, String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                program,
                code,
                interpreter: interpreter_for(options),
                target: options.target,
                filename: options.filename.clone(),
                sources,
            }),
        }
    }

    /// Rebuild a template from the text returned by [`Template::portable_source`],
    /// using the built-in filters and HTML escaping.
    pub fn from_portable(code: &str) -> Result<Template, CompileError> {
        Self::from_portable_with(code, &CompileOptions::new().target(TargetMode::Portable))
    }

    /// Like [`Template::from_portable`], taking filters, escaper and strictness
    /// from `options`.
    pub fn from_portable_with(code: &str, options: &CompileOptions) -> Result<Template, CompileError> {
        let program = embers_parser::parse(code).map_err(|e| map_parse_error(e, None, None))?;
        let options = options.clone().target(TargetMode::Portable);
        Ok(Self::new(program, code.to_string(), &options, BTreeMap::new()))
    }

    /// Render with any locals that serialize to a JSON object.
    ///
    /// `()` and other values serializing to `null` count as no locals.
    pub fn render<S: Serialize + ?Sized>(&self, locals: &S) -> Result<String, RenderError> {
        let json = serde_json::to_value(locals).map_err(|e| RenderError::Locals(e.to_string()))?;
        let locals = match json {
            JsonValue::Object(_) => Value::from(json),
            JsonValue::Null => Value::Object(BTreeMap::new()),
            other => {
                return Err(RenderError::Locals(format!(
                    "expected an object, got {}",
                    Value::from(other).type_name()
                )));
            }
        };
        Ok(self.render_value(locals)?)
    }

    /// Render with locals that are already a [`Value`].
    pub fn render_value(&self, locals: Value) -> Result<String, RuntimeError> {
        let inner = &self.inner;
        trace!(filename = ?inner.filename, "rendering template");
        inner
            .interpreter
            .execute(&inner.program, locals)
            .map_err(|failure| map_runtime_failure(failure, &inner.sources))
    }

    /// The generated program text.
    pub fn code(&self) -> &str {
        &self.inner.code
    }

    /// Self-contained program text, for templates compiled in portable mode.
    pub fn portable_source(&self) -> Option<&str> {
        match self.inner.target {
            TargetMode::Portable => Some(&self.inner.code),
            TargetMode::Server => None,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        self.inner.filename.as_deref()
    }

    pub fn target(&self) -> TargetMode {
        self.inner.target
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("filename", &self.inner.filename)
            .field("target", &self.inner.target)
            .field("code_len", &self.inner.code.len())
            .finish_non_exhaustive()
    }
}

fn interpreter_for(options: &CompileOptions) -> Interpreter {
    Interpreter::new()
        .with_filters(options.filter_registry())
        .with_escaper(options.escaper())
        .with_strict(options.strict)
}
