/// Include resolution for nested templates
///
/// Turns an include directive into the text to inline, and tracks the chain of
/// templates currently being expanded so that cycles are reported instead of
/// recursing forever.

use embers_parser::IncludeDirective;
use tracing::debug;

use crate::error::{CompileError, Result};
use crate::loader::{extension_of, normalize_path, resolve_include_path, ContentLoader};

/// A loaded include, ready to inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Scan and compile the text as a template.
    Template { path: String, text: String },
    /// Inline the text as literal output.
    Raw { path: String, text: String },
}

pub struct IncludeResolver<'a> {
    loader: &'a dyn ContentLoader,
    extension: String,
    /// Templates being expanded, outermost first (for cycle detection)
    stack: Vec<String>,
}

impl<'a> IncludeResolver<'a> {
    pub fn new(loader: &'a dyn ContentLoader, extension: impl Into<String>) -> Self {
        Self {
            loader,
            extension: extension.into(),
            stack: Vec::new(),
        }
    }

    /// Load the target of `directive`, included from `caller` on `line`.
    pub fn resolve(&self, directive: &IncludeDirective, caller: Option<&str>, line: usize) -> Result<Resolved> {
        let caller = caller.ok_or(CompileError::MissingSourcePath { line })?;
        let path = resolve_include_path(caller, &directive.path, &self.extension);
        let raw = directive.raw || extension_of(&path) != Some(self.extension.as_str());
        if !raw {
            self.check_cycle(&path)?;
        }

        let text = self
            .loader
            .load(&path)
            .map_err(|source| CompileError::IncludeNotFound {
                path: path.clone(),
                from: caller.to_string(),
                source,
            })?;

        debug!(path = %path, raw, from = %caller, "resolved include");

        Ok(if raw {
            Resolved::Raw { path, text }
        } else {
            Resolved::Template { path, text }
        })
    }

    /// Start expanding `path`; fails if it is already being expanded.
    pub fn enter(&mut self, path: &str) -> Result<()> {
        let path = normalize_path(path);
        self.check_cycle(&path)?;
        self.stack.push(path);
        Ok(())
    }

    fn check_cycle(&self, path: &str) -> Result<()> {
        if self.stack.iter().any(|p| p == path) {
            let mut chain = self.stack.clone();
            chain.push(path.to_string());
            return Err(CompileError::CircularInclude { chain });
        }
        Ok(())
    }

    pub fn leave(&mut self) {
        self.stack.pop();
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
