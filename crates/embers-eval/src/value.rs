//! Runtime values for the Embers interpreter.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value as JsonValue;

/// A runtime value in the scriptlet language.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The null value.
    #[default]
    Null,
    /// A string value.
    String(String),
    /// A numeric value (always f64, like JavaScript).
    Number(f64),
    /// A boolean value.
    Boolean(bool),
    /// An array of values.
    Array(Vec<Value>),
    /// An object with string keys, iterated in key order.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Coerce this value to a string.
    pub fn to_string_value(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            Value::Array(arr) => {
                // null elements join as empty strings
                let items: Vec<String> = arr.iter().map(|v| v.to_output()).collect();
                items.join(",")
            }
            Value::Object(_) => "[object Object]".to_string(),
        }
    }

    /// Text written to the output buffer; null renders as nothing.
    pub fn to_output(&self) -> String {
        match self {
            Value::Null => String::new(),
            other => other.to_string_value(),
        }
    }

    /// Coerce this value to a boolean.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Boolean(b) => *b,
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// Coerce this value to a number; unparseable input gives NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Number(n) => *n,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(_) | Value::Object(_) => f64::NAN,
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Length of strings (in characters), arrays and objects.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(arr) => Some(arr.len()),
            Value::Object(obj) => Some(obj.len()),
            _ => None,
        }
    }

    /// Equality with numbers compared numerically.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (a, b) => a == b,
        }
    }

    /// Ordering used by comparisons and sorting filters.
    ///
    /// Strings compare lexicographically, everything else numerically. `None`
    /// when either side is NaN after coercion.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (a, b) => a.to_number().partial_cmp(&b.to_number()),
        }
    }

    /// Parse a JSON string into a Value.
    pub fn from_json(s: &str) -> Result<Value, String> {
        let json: JsonValue = serde_json::from_str(s).map_err(|e| format!("JSON parse error: {}", e))?;
        Ok(Value::from_json_value(json))
    }

    /// Convert a serde_json Value to our Value type.
    pub fn from_json_value(json: JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(b),
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(arr) => Value::Array(arr.into_iter().map(Value::from_json_value).collect()),
            JsonValue::Object(obj) => {
                let map = obj.into_iter().map(|(k, v)| (k, Value::from_json_value(v))).collect();
                Value::Object(map)
            }
        }
    }

    /// Convert this Value to a compact JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.to_json_value()).unwrap_or_else(|_| "null".to_string())
    }

    /// Convert this Value to a serde_json Value.
    pub fn to_json_value(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    JsonValue::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n).map(JsonValue::Number).unwrap_or(JsonValue::Null)
                }
            }
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Array(arr) => JsonValue::Array(arr.iter().map(|v| v.to_json_value()).collect()),
            Value::Object(obj) => {
                let map: serde_json::Map<String, JsonValue> =
                    obj.iter().map(|(k, v)| (k.clone(), v.to_json_value())).collect();
                JsonValue::Object(map)
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        // Integer-like numbers without decimal point
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_value())
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        Value::from_json_value(json)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}
