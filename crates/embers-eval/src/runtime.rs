//! Runtime environment for the Embers interpreter.

use std::collections::HashMap;

use crate::value::Value;

/// Where in the template source execution currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Source path of the template being executed, if it has one.
    pub file: Option<String>,
    /// 1-based line in that template.
    pub line: usize,
}

/// The state of one template invocation.
///
/// Holds variable bindings, the output buffer and the position markers set by
/// `__line`/`__file`. A fresh runtime is created per invocation.
#[derive(Debug)]
pub struct Runtime {
    /// Variable bindings, organized as a stack of scopes.
    /// The last entry is the innermost scope.
    scopes: Vec<HashMap<String, Value>>,
    output: String,
    current_line: Option<usize>,
    current_file: Option<String>,
    /// Template texts registered by `__source`, keyed by path.
    sources: HashMap<Option<String>, String>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            output: String::new(),
            current_line: None,
            current_file: None,
            sources: HashMap::new(),
        }
    }

    /// Create a runtime whose root scope holds `locals`.
    ///
    /// Every key of an object becomes a variable, and the whole object is
    /// bound as `locals`. Non-object values are only bound as `locals`.
    pub fn with_locals(locals: Value) -> Self {
        let mut runtime = Self::new();
        if let Value::Object(map) = &locals {
            for (name, value) in map {
                runtime.define_var(name, value.clone());
            }
        }
        runtime.define_var("locals", locals);
        runtime
    }

    /// Push a new scope onto the scope stack (entering a block).
    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the current scope from the stack (leaving a block).
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Define a variable in the current scope, replacing any previous binding
    /// of the same name in that scope.
    pub fn define_var(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    /// Get the value of a variable, searching from innermost to outermost scope.
    pub fn get_var(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Set the value of an existing variable.
    ///
    /// Returns an error if no scope defines it.
    pub fn set_var(&mut self, name: &str, value: Value) -> Result<(), String> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        Err(format!("{} is not defined", name))
    }

    /// Append text to the output buffer.
    pub fn append(&mut self, text: &str) {
        self.output.push_str(text);
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Take the accumulated output, leaving the buffer empty.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn set_line(&mut self, line: usize) {
        self.current_line = Some(line);
    }

    /// Switch to another template file. The line marker is reset until the
    /// next `__line`.
    pub fn set_file(&mut self, file: Option<String>) {
        self.current_file = file;
        self.current_line = None;
    }

    pub fn register_source(&mut self, file: Option<String>, text: String) {
        self.sources.insert(file, text);
    }

    pub fn sources(&self) -> &HashMap<Option<String>, String> {
        &self.sources
    }

    pub fn take_sources(&mut self) -> HashMap<Option<String>, String> {
        std::mem::take(&mut self.sources)
    }

    /// Current position, known only once a `__line` marker has run.
    pub fn location(&self) -> Option<Location> {
        self.current_line.map(|line| Location {
            file: self.current_file.clone(),
            line,
        })
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_define_and_get_var() {
        let mut rt = Runtime::default();
        rt.define_var("x", Value::Number(42.0));
        assert_eq!(rt.get_var("x"), Some(&Value::Number(42.0)));
    }

    #[test]
    fn test_undefined_var() {
        let rt = Runtime::default();
        assert_eq!(rt.get_var("x"), None);
    }

    #[test]
    fn test_redefine_in_same_scope() {
        let mut rt = Runtime::default();
        rt.define_var("x", Value::Number(1.0));
        rt.define_var("x", Value::Number(2.0));
        assert_eq!(rt.get_var("x"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn test_set_var() {
        let mut rt = Runtime::default();
        rt.define_var("x", Value::Number(1.0));
        rt.push_scope();
        rt.set_var("x", Value::Number(2.0)).unwrap();
        rt.pop_scope();
        assert_eq!(rt.get_var("x"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn test_set_undefined_var_fails() {
        let mut rt = Runtime::default();
        let result = rt.set_var("x", Value::Number(1.0));
        assert_eq!(result, Err("x is not defined".to_string()));
    }

    #[test]
    fn test_scope_shadowing() {
        let mut rt = Runtime::default();
        rt.define_var("x", Value::Number(1.0));

        rt.push_scope();
        rt.define_var("x", Value::Number(2.0));
        assert_eq!(rt.get_var("x"), Some(&Value::Number(2.0)));

        rt.pop_scope();
        assert_eq!(rt.get_var("x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_root_scope_survives_pop() {
        let mut rt = Runtime::default();
        rt.define_var("x", Value::Null);
        rt.pop_scope();
        assert!(rt.get_var("x").is_some());
    }

    #[test]
    fn test_with_locals_binds_keys_and_object() {
        let locals = Value::from(json!({"name": "tobi"}));
        let rt = Runtime::with_locals(locals.clone());
        assert_eq!(rt.get_var("name"), Some(&Value::from("tobi")));
        assert_eq!(rt.get_var("locals"), Some(&locals));
    }

    #[test]
    fn test_location_tracking() {
        let mut rt = Runtime::default();
        assert_eq!(rt.location(), None);
        rt.set_line(3);
        assert_eq!(rt.location(), Some(Location { file: None, line: 3 }));
        rt.set_file(Some("a.ejs".to_string()));
        assert_eq!(rt.location(), None);
        rt.set_line(1);
        assert_eq!(
            rt.location(),
            Some(Location { file: Some("a.ejs".to_string()), line: 1 })
        );
    }

    #[test]
    fn test_output_buffer() {
        let mut rt = Runtime::default();
        rt.append("a");
        rt.append("b");
        assert_eq!(rt.output(), "ab");
        assert_eq!(rt.take_output(), "ab");
        assert_eq!(rt.output(), "");
    }
}
