//! The Embers interpreter.
//!
//! Runs a parsed program against a set of locals. Each call gets its own
//! [`Runtime`], so one interpreter can be shared across threads.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use embers_parser::ast::Program;

use crate::error::Error;
use crate::escape::{default_escaper, Escaper};
use crate::eval::{self, EvalContext};
use crate::filters::FilterRegistry;
use crate::runtime::{Location, Runtime};
use crate::value::Value;

/// A failed invocation: the error plus where execution stood when it happened.
#[derive(Debug, Clone)]
pub struct Failure {
    pub error: Error,
    /// Last position recorded by `__line`/`__file`, if any.
    pub location: Option<Location>,
    /// Template texts the program registered with `__source`.
    pub sources: HashMap<Option<String>, String>,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// The Embers interpreter.
#[derive(Clone)]
pub struct Interpreter {
    filters: Arc<FilterRegistry>,
    escaper: Escaper,
    strict: bool,
}

impl Interpreter {
    /// An interpreter with the built-in filters and the HTML escaper.
    pub fn new() -> Self {
        Self {
            filters: FilterRegistry::builtin(),
            escaper: default_escaper(),
            strict: false,
        }
    }

    pub fn with_filters(mut self, filters: Arc<FilterRegistry>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_escaper(mut self, escaper: Escaper) -> Self {
        self.escaper = escaper;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    fn context(&self) -> EvalContext<'_> {
        EvalContext {
            filters: &self.filters,
            escaper: &self.escaper,
            strict: self.strict,
        }
    }

    /// Run a program and return its output buffer.
    ///
    /// Output is only returned when the whole program succeeds.
    pub fn execute(&self, program: &Program, locals: Value) -> Result<String, Failure> {
        let mut runtime = Runtime::with_locals(locals);
        match eval::eval_program(program, &mut runtime, self.context()) {
            Ok(_) => Ok(runtime.take_output()),
            Err(error) => Err(Failure {
                error,
                location: runtime.location(),
                sources: runtime.take_sources(),
            }),
        }
    }

    /// Parse and evaluate scriptlet code, returning the value of the last
    /// statement. Output written with `__out` is discarded.
    pub fn eval(&self, code: &str, locals: Value) -> crate::Result<Value> {
        let program = embers_parser::parse(code)?;
        let mut runtime = Runtime::with_locals(locals);
        eval::eval_program(&program, &mut runtime, self.context())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("filters", &self.filters)
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn locals(value: serde_json::Value) -> Value {
        Value::from(value)
    }

    #[test]
    fn test_eval_empty_program() {
        let interp = Interpreter::new();
        let result = interp.eval("", Value::Null);
        assert_eq!(result, Ok(Value::Null));
    }

    #[test]
    fn test_eval_block_with_var() {
        let interp = Interpreter::new();
        let code = r#"
            var x = 42
            x
        "#;
        assert_eq!(interp.eval(code, Value::Null), Ok(Value::Number(42.0)));
    }

    #[test]
    fn test_eval_if_else() {
        let interp = Interpreter::new();
        let code = r#"
            var label = "small"
            if x > 5 {
                label = "big"
            } else {
                label = "tiny"
            }
            label
        "#;
        let result = interp.eval(code, locals(json!({"x": 10})));
        assert_eq!(result, Ok(Value::from("big")));
    }

    #[test]
    fn test_execute_collects_output() {
        let interp = Interpreter::new();
        let program = embers_parser::parse(
            "__out(\"<ul>\")\nfor var u in users {\n__out(\"<li>\" + __escape(u) + \"</li>\")\n}\n__out(\"</ul>\")",
        )
        .unwrap();
        let out = interp.execute(&program, locals(json!({"users": ["a&b", "c"]}))).unwrap();
        assert_eq!(out, "<ul><li>a&amp;b</li><li>c</li></ul>");
    }

    #[test]
    fn test_failure_carries_location_and_sources() {
        let interp = Interpreter::new();
        let program = embers_parser::parse(
            "__source(null, \"one\\ntwo\")\n__line(1)\n__out(\"ok\")\n__line(2)\n__out(boom)",
        )
        .unwrap();
        let failure = interp.execute(&program, Value::Null).unwrap_err();
        assert_eq!(failure.to_string(), "boom is not defined");
        assert_eq!(failure.location, Some(Location { file: None, line: 2 }));
        assert_eq!(failure.sources.get(&None).map(String::as_str), Some("one\ntwo"));
    }

    #[test]
    fn test_custom_escaper_and_strict() {
        let interp = Interpreter::new()
            .with_escaper(Arc::new(|s: &str| s.to_uppercase()))
            .with_strict(true);
        let program = embers_parser::parse("__out(__escape(name))").unwrap();
        assert_eq!(interp.execute(&program, locals(json!({"name": "tobi"}))).unwrap(), "TOBI");

        let program = embers_parser::parse("__out(user.age)").unwrap();
        let failure = interp.execute(&program, locals(json!({"user": {}}))).unwrap_err();
        assert_eq!(failure.location, None);
    }

    #[test]
    fn test_custom_filters() {
        let mut registry = FilterRegistry::with_builtins();
        registry.register("double", |v, _| Ok(Value::Number(v.to_number() * 2.0)));
        let interp = Interpreter::new().with_filters(Arc::new(registry));
        assert_eq!(interp.eval("double(21)", Value::Null), Ok(Value::Number(42.0)));
    }
}
