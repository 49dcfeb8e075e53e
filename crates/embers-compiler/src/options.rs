//! Compile-time configuration.

use std::fmt;
use std::sync::Arc;

use embers_eval::{default_escaper, Escaper, FilterRegistry};
use embers_parser::{Delimiters, ScanError};

use crate::error::{CompileError, Result};

/// How the compiled unit is packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetMode {
    /// The unit runs in this process.
    #[default]
    Server,
    /// The unit also exposes a self-contained program text that can be
    /// shipped and rebuilt with `Template::from_portable`.
    Portable,
}

/// Options for compilation
///
/// Built with chained setters:
///
/// ```
/// use embers_compiler::CompileOptions;
///
/// let options = CompileOptions::new().open("{{").close("}}").compile_debug(false);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct CompileOptions {
    pub open: String,
    pub close: String,
    /// Source path, used to resolve includes and in diagnostics
    pub filename: Option<String>,
    /// Emit line tracking so runtime failures point at the template
    pub compile_debug: bool,
    pub target: TargetMode,
    /// Missing properties and out-of-range indexes fail instead of yielding null
    pub strict: bool,
    pub escape: Option<Escaper>,
    pub filters: Option<Arc<FilterRegistry>>,
    /// Extension of files compiled as templates when included
    pub template_extension: String,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self {
            open: "<%".to_string(),
            close: "%>".to_string(),
            filename: None,
            compile_debug: true,
            target: TargetMode::Server,
            strict: false,
            escape: None,
            filters: None,
            template_extension: "ejs".to_string(),
        }
    }

    pub fn open(mut self, open: impl Into<String>) -> Self {
        self.open = open.into();
        self
    }

    pub fn close(mut self, close: impl Into<String>) -> Self {
        self.close = close.into();
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn compile_debug(mut self, compile_debug: bool) -> Self {
        self.compile_debug = compile_debug;
        self
    }

    pub fn target(mut self, target: TargetMode) -> Self {
        self.target = target;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn escape<F>(mut self, escape: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.escape = Some(Arc::new(escape));
        self
    }

    pub fn filters(mut self, filters: impl Into<Arc<FilterRegistry>>) -> Self {
        self.filters = Some(filters.into());
        self
    }

    pub fn template_extension(mut self, extension: impl Into<String>) -> Self {
        self.template_extension = extension.into();
        self
    }

    pub fn delimiters(&self) -> Delimiters {
        Delimiters::new(self.open.clone(), self.close.clone())
    }

    /// The configured filter registry, or the shared built-in one.
    pub fn filter_registry(&self) -> Arc<FilterRegistry> {
        self.filters.clone().unwrap_or_else(FilterRegistry::builtin)
    }

    /// The configured escaper, or HTML escaping.
    pub fn escaper(&self) -> Escaper {
        self.escape.clone().unwrap_or_else(default_escaper)
    }

    pub fn validate(&self) -> Result<()> {
        self.delimiters().validate().map_err(|e| match e {
            ScanError::InvalidDelimiters(message) => CompileError::Config(message),
            other => CompileError::Config(other.to_string()),
        })?;
        if self.template_extension.contains('/') {
            return Err(CompileError::Config(format!(
                "template extension \"{}\" must not contain '/'",
                self.template_extension
            )));
        }
        Ok(())
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOptions")
            .field("open", &self.open)
            .field("close", &self.close)
            .field("filename", &self.filename)
            .field("compile_debug", &self.compile_debug)
            .field("target", &self.target)
            .field("strict", &self.strict)
            .field("escape", &self.escape.as_ref().map(|_| "<fn>"))
            .field("filters", &self.filters)
            .field("template_extension", &self.template_extension)
            .finish()
    }
}
