//! Filter registry and the built-in filters.
//!
//! A filter takes the piped value plus the stage arguments and returns a new
//! value. Filters never mutate their input. The built-in registry is built once
//! per process and shared read-only; callers wanting extra filters clone it and
//! register their own.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::error::Error;
use crate::escape::escape_html;
use crate::value::Value;

/// Signature of a filter: `(value, args) -> value`.
pub type FilterFn = dyn Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync;

static BUILTIN: LazyLock<Arc<FilterRegistry>> = LazyLock::new(|| Arc::new(FilterRegistry::with_builtins()));

/// Mapping from filter name to transform.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Arc<FilterFn>>,
}

impl FilterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared, process-wide registry of built-in filters.
    pub fn builtin() -> Arc<FilterRegistry> {
        Arc::clone(&BUILTIN)
    }

    /// A fresh registry holding the built-in filters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("first", |v, _| Ok(first(v)));
        registry.register("last", |v, _| Ok(last(v)));
        registry.register("capitalize", |v, _| Ok(Value::String(capitalize(&v.to_string_value()))));
        registry.register("downcase", |v, _| Ok(Value::String(v.to_string_value().to_lowercase())));
        registry.register("upcase", |v, _| Ok(Value::String(v.to_string_value().to_uppercase())));
        registry.register("sort", |v, _| sort(v));
        registry.register("sort_by", sort_by);
        registry.register("size", |v, _| Ok(length(v)));
        registry.register("length", |v, _| Ok(length(v)));
        registry.register("plus", |v, args| arithmetic(v, args, |a, b| a + b));
        registry.register("minus", |v, args| arithmetic(v, args, |a, b| a - b));
        registry.register("times", |v, args| arithmetic(v, args, |a, b| a * b));
        registry.register("divided_by", |v, args| arithmetic(v, args, |a, b| a / b));
        registry.register("join", join);
        registry.register("truncate", truncate);
        registry.register("truncate_words", truncate_words);
        registry.register("replace", replace);
        registry.register("prepend", prepend);
        registry.register("append", append);
        registry.register("map", map);
        registry.register("reverse", |v, _| Ok(reverse(v)));
        registry.register("get", |v, args| Ok(get(v, required(args, 0)?)));
        registry.register("json", |v, _| Ok(Value::String(v.to_json())));
        registry.register("escape", |v, _| Ok(Value::String(escape_html(&v.to_output()))));
        registry
    }

    /// Register (or replace) a filter.
    pub fn register<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FilterFn>> {
        self.filters.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Registered filter names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run filter `name` over `value`.
    pub fn apply(&self, name: &str, value: &Value, args: &[Value]) -> Result<Value, Error> {
        let filter = self.get(name).ok_or_else(|| Error::UnknownFilter(name.to_string()))?;
        filter(value, args).map_err(|message| Error::Filter {
            name: name.to_string(),
            message,
        })
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry").field("filters", &self.names()).finish()
    }
}

fn required(args: &[Value], index: usize) -> Result<&Value, String> {
    args.get(index)
        .ok_or_else(|| format!("expected at least {} argument(s)", index + 1))
}

fn expect_array(value: &Value) -> Result<&Vec<Value>, String> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(format!("expected an array, got {}", other.type_name())),
    }
}

fn first(value: &Value) -> Value {
    match value {
        Value::Array(items) => items.first().cloned().unwrap_or_default(),
        Value::String(s) => s.chars().next().map(|c| Value::String(c.to_string())).unwrap_or_default(),
        _ => Value::Null,
    }
}

fn last(value: &Value) -> Value {
    match value {
        Value::Array(items) => items.last().cloned().unwrap_or_default(),
        Value::String(s) => s.chars().last().map(|c| Value::String(c.to_string())).unwrap_or_default(),
        _ => Value::Null,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn ordering(a: &Value, b: &Value) -> Ordering {
    a.compare(b)
        .unwrap_or_else(|| a.to_string_value().cmp(&b.to_string_value()))
}

fn sort(value: &Value) -> Result<Value, String> {
    let mut items = expect_array(value)?.clone();
    items.sort_by(ordering);
    Ok(Value::Array(items))
}

fn sort_by(value: &Value, args: &[Value]) -> Result<Value, String> {
    let prop = required(args, 0)?;
    let mut items = expect_array(value)?.clone();
    items.sort_by(|a, b| ordering(&get(a, prop), &get(b, prop)));
    Ok(Value::Array(items))
}

fn length(value: &Value) -> Value {
    value
        .length()
        .map(|n| Value::Number(n as f64))
        .unwrap_or_default()
}

/// Both operands go through integer parsing before the operation.
fn arithmetic(value: &Value, args: &[Value], op: impl Fn(f64, f64) -> f64) -> Result<Value, String> {
    let a = value.to_number().trunc();
    let b = required(args, 0)?.to_number().trunc();
    Ok(Value::Number(op(a, b)))
}

fn join(value: &Value, args: &[Value]) -> Result<Value, String> {
    let separator = args
        .first()
        .map(Value::to_string_value)
        .unwrap_or_else(|| ", ".to_string());
    let parts: Vec<String> = expect_array(value)?.iter().map(Value::to_output).collect();
    Ok(Value::String(parts.join(&separator)))
}

fn truncate(value: &Value, args: &[Value]) -> Result<Value, String> {
    let text = value.to_string_value();
    let len = required(args, 0)?.to_number();
    let len = if len.is_nan() || len < 0.0 { 0 } else { len as usize };
    if text.chars().count() <= len {
        return Ok(Value::String(text));
    }
    let mut truncated: String = text.chars().take(len).collect();
    if let Some(suffix) = args.get(1) {
        truncated.push_str(&suffix.to_output());
    }
    Ok(Value::String(truncated))
}

fn truncate_words(value: &Value, args: &[Value]) -> Result<Value, String> {
    let text = value.to_string_value();
    let n = required(args, 0)?.to_number();
    let n = if n.is_nan() || n < 0.0 { 0 } else { n as usize };
    let words: Vec<&str> = text.split(' ').filter(|w| !w.is_empty()).take(n).collect();
    Ok(Value::String(words.join(" ")))
}

fn replace(value: &Value, args: &[Value]) -> Result<Value, String> {
    let text = value.to_string_value();
    let pattern = required(args, 0)?.to_string_value();
    let substitution = args.get(1).map(Value::to_output).unwrap_or_default();
    Ok(Value::String(text.replacen(&pattern, &substitution, 1)))
}

fn prepend(value: &Value, args: &[Value]) -> Result<Value, String> {
    let item = required(args, 0)?;
    Ok(match value {
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len() + 1);
            out.push(item.clone());
            out.extend(items.iter().cloned());
            Value::Array(out)
        }
        other => Value::String(item.to_string_value() + &other.to_string_value()),
    })
}

fn append(value: &Value, args: &[Value]) -> Result<Value, String> {
    let item = required(args, 0)?;
    Ok(match value {
        Value::Array(items) => {
            let mut out = items.clone();
            match item {
                Value::Array(more) => out.extend(more.iter().cloned()),
                single => out.push(single.clone()),
            }
            Value::Array(out)
        }
        other => Value::String(other.to_string_value() + &item.to_string_value()),
    })
}

fn map(value: &Value, args: &[Value]) -> Result<Value, String> {
    let prop = required(args, 0)?;
    let items = expect_array(value)?;
    Ok(Value::Array(items.iter().map(|item| get(item, prop)).collect()))
}

fn reverse(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().rev().cloned().collect()),
        other => Value::String(other.to_string_value().chars().rev().collect()),
    }
}

fn get(value: &Value, prop: &Value) -> Value {
    match (value, prop) {
        (Value::Object(obj), key) => obj.get(&key.to_string_value()).cloned().unwrap_or_default(),
        (Value::Array(items), Value::Number(n)) if *n >= 0.0 => items.get(*n as usize).cloned().unwrap_or_default(),
        (Value::Array(_) | Value::String(_), Value::String(key)) if key == "length" => length(value),
        _ => Value::Null,
    }
}
