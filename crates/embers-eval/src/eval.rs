//! Expression and statement evaluation for the Embers interpreter.
//!
//! Evaluation is synchronous and every function returns `Result<Value, Error>`.
//! Generated template code talks to the runtime through a handful of
//! intrinsics (`__out`, `__escape`, `__filter`, `__line`, `__file`,
//! `__source`); any other call names a registered filter.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use embers_parser::ast::{BinOp, Block, Expr, Program, Statement, UnOp};

use crate::error::Error;
use crate::escape::Escaper;
use crate::filters::FilterRegistry;
use crate::runtime::Runtime;
use crate::value::Value;

/// Everything evaluation needs besides the mutable runtime.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub filters: &'a FilterRegistry,
    pub escaper: &'a Escaper,
    /// Missing properties and out-of-range indexes are errors instead of null.
    pub strict: bool,
}

/// Evaluate a complete program in the root scope.
///
/// Returns the value of the last statement.
pub fn eval_program(program: &Program, runtime: &mut Runtime, ctx: EvalContext<'_>) -> Result<Value, Error> {
    let mut result = Value::Null;
    for stmt in &program.statements {
        result = eval_statement(stmt, runtime, ctx)?;
    }
    Ok(result)
}

/// Evaluate a block of statements in its own scope.
pub fn eval_block(block: &Block, runtime: &mut Runtime, ctx: EvalContext<'_>) -> Result<Value, Error> {
    runtime.push_scope();
    let mut result = Value::Null;

    for stmt in &block.statements {
        result = eval_statement(stmt, runtime, ctx)?;
    }

    runtime.pop_scope();
    Ok(result)
}

/// Evaluate a single statement.
pub fn eval_statement(stmt: &Statement, runtime: &mut Runtime, ctx: EvalContext<'_>) -> Result<Value, Error> {
    match stmt {
        Statement::VarDecl { name, init } => {
            let value = match init {
                Some(expr) => eval_expr(expr, runtime, ctx)?,
                None => Value::Null,
            };
            runtime.define_var(name, value);
            Ok(Value::Null)
        }

        Statement::Assign { name, value } => {
            let value = eval_expr(value, runtime, ctx)?;
            runtime.set_var(name, value.clone()).map_err(Error::Runtime)?;
            Ok(value)
        }

        Statement::Expr(expr) => eval_expr(expr, runtime, ctx),

        Statement::If { condition, then_block, else_block } => {
            let cond_value = eval_expr(condition, runtime, ctx)?;

            if cond_value.to_bool() {
                eval_block(then_block, runtime, ctx)
            } else if let Some(else_blk) = else_block {
                eval_block(else_blk, runtime, ctx)
            } else {
                Ok(Value::Null)
            }
        }

        Statement::ForIn { var, index, iter, body } => {
            let iter_value = eval_expr(iter, runtime, ctx)?;

            // (bound to `var`, bound to `index`)
            let pairs: Vec<(Value, Value)> = match iter_value {
                Value::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| (item, Value::Number(i as f64)))
                    .collect(),
                Value::Object(map) => map.into_iter().map(|(k, v)| (Value::String(k), v)).collect(),
                Value::String(s) => s
                    .chars()
                    .enumerate()
                    .map(|(i, c)| (Value::String(c.to_string()), Value::Number(i as f64)))
                    .collect(),
                other => {
                    return Err(Error::Runtime(format!("Cannot iterate over {}", other.type_name())));
                }
            };

            let mut result = Value::Null;
            for (item, position) in pairs {
                runtime.push_scope();
                runtime.define_var(var, item);
                if let Some(index) = index {
                    runtime.define_var(index, position);
                }
                result = eval_block(body, runtime, ctx)?;
                runtime.pop_scope();
            }

            Ok(result)
        }
    }
}

/// Evaluate an expression.
pub fn eval_expr(expr: &Expr, runtime: &mut Runtime, ctx: EvalContext<'_>) -> Result<Value, Error> {
    match expr {
        Expr::Identifier(name) => runtime
            .get_var(name)
            .cloned()
            .ok_or_else(|| Error::Runtime(format!("{} is not defined", name))),

        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::True => Ok(Value::Boolean(true)),
        Expr::False => Ok(Value::Boolean(false)),
        Expr::Null => Ok(Value::Null),

        Expr::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expr(item, runtime, ctx)?);
            }
            Ok(Value::Array(values))
        }

        Expr::Object(fields) => {
            let mut map = BTreeMap::new();
            for (key, value) in fields {
                map.insert(key.clone(), eval_expr(value, runtime, ctx)?);
            }
            Ok(Value::Object(map))
        }

        Expr::Binary { op, left, right } => eval_binary(*op, left, right, runtime, ctx),

        Expr::Unary { op, operand } => {
            let value = eval_expr(operand, runtime, ctx)?;
            Ok(match op {
                UnOp::Not => Value::Boolean(!value.to_bool()),
                UnOp::Neg => Value::Number(-value.to_number()),
            })
        }

        Expr::Call { callee, args } => {
            let values = eval_args(args, runtime, ctx)?;
            eval_call(callee, values, runtime, ctx)
        }

        Expr::MethodCall { receiver, method, args } => {
            let receiver = eval_expr(receiver, runtime, ctx)?;
            let values = eval_args(args, runtime, ctx)?;
            if !ctx.filters.contains(method) {
                return Err(Error::Runtime(format!("{} is not a function", method)));
            }
            ctx.filters.apply(method, &receiver, &values)
        }

        Expr::Member { object, field } => {
            let obj_value = eval_expr(object, runtime, ctx)?;
            read_property(&obj_value, field, ctx.strict)
        }

        Expr::Index { object, index } => {
            let obj_value = eval_expr(object, runtime, ctx)?;
            let idx_value = eval_expr(index, runtime, ctx)?;
            read_index(&obj_value, &idx_value, ctx.strict)
        }

        Expr::Conditional { condition, then_expr, else_expr } => {
            if eval_expr(condition, runtime, ctx)?.to_bool() {
                eval_expr(then_expr, runtime, ctx)
            } else {
                eval_expr(else_expr, runtime, ctx)
            }
        }
    }
}

fn eval_args(args: &[Expr], runtime: &mut Runtime, ctx: EvalContext<'_>) -> Result<Vec<Value>, Error> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval_expr(arg, runtime, ctx)?);
    }
    Ok(values)
}

/// Evaluate an intrinsic or a filter invoked by name.
fn eval_call(name: &str, args: Vec<Value>, runtime: &mut Runtime, ctx: EvalContext<'_>) -> Result<Value, Error> {
    let mut args = args.into_iter();
    let mut next = || args.next().unwrap_or_default();

    match name {
        "__out" => {
            runtime.append(&next().to_output());
            Ok(Value::Null)
        }
        "__escape" => Ok(Value::String((ctx.escaper)(&next().to_output()))),
        "__filter" => {
            let filter = next().to_string_value();
            let value = next();
            let rest: Vec<Value> = args.collect();
            ctx.filters.apply(&filter, &value, &rest)
        }
        "__line" => {
            let line = next().to_number();
            if line.is_finite() && line >= 1.0 {
                runtime.set_line(line as usize);
            }
            Ok(Value::Null)
        }
        "__file" => {
            runtime.set_file(optional_path(next()));
            Ok(Value::Null)
        }
        "__source" => {
            let path = optional_path(next());
            let text = next().to_string_value();
            runtime.register_source(path, text);
            Ok(Value::Null)
        }
        _ if ctx.filters.contains(name) => {
            let value = next();
            let rest: Vec<Value> = args.collect();
            ctx.filters.apply(name, &value, &rest)
        }
        _ => Err(Error::Runtime(format!("{} is not a function", name))),
    }
}

fn optional_path(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(other.to_string_value()),
    }
}

fn read_property(object: &Value, field: &str, strict: bool) -> Result<Value, Error> {
    let missing = || {
        if strict {
            Err(Error::Runtime(format!("Property '{}' is not defined", field)))
        } else {
            Ok(Value::Null)
        }
    };

    match object {
        Value::Object(map) => match map.get(field) {
            Some(value) => Ok(value.clone()),
            None if field == "length" => Ok(Value::Number(map.len() as f64)),
            None => missing(),
        },
        Value::Array(_) | Value::String(_) => match (field, object.length()) {
            ("length", Some(n)) => Ok(Value::Number(n as f64)),
            _ => missing(),
        },
        other => Err(Error::Runtime(format!(
            "Cannot read property '{}' of {}",
            field,
            other.type_name()
        ))),
    }
}

fn read_index(object: &Value, index: &Value, strict: bool) -> Result<Value, Error> {
    let position = match index {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
        _ => None,
    };

    let found = match (object, position) {
        (Value::Array(items), Some(i)) => items.get(i).cloned(),
        (Value::String(s), Some(i)) => s.chars().nth(i).map(|c| Value::String(c.to_string())),
        (Value::Object(_), _) | (Value::Array(_), None) | (Value::String(_), None) => {
            return read_property(object, &index.to_string_value(), strict);
        }
        (other, _) => {
            return Err(Error::Runtime(format!(
                "Cannot read property '{}' of {}",
                index.to_string_value(),
                other.type_name()
            )));
        }
    };

    match found {
        Some(value) => Ok(value),
        None if strict => Err(Error::Runtime(format!(
            "Index {} is out of range",
            index.to_string_value()
        ))),
        None => Ok(Value::Null),
    }
}

/// Evaluate a binary operation.
fn eval_binary(op: BinOp, left: &Expr, right: &Expr, runtime: &mut Runtime, ctx: EvalContext<'_>) -> Result<Value, Error> {
    let left_val = eval_expr(left, runtime, ctx)?;

    // Logical operators short-circuit and yield an operand, not a boolean.
    match op {
        BinOp::And if !left_val.to_bool() => return Ok(left_val),
        BinOp::Or if left_val.to_bool() => return Ok(left_val),
        BinOp::And | BinOp::Or => return eval_expr(right, runtime, ctx),
        _ => {}
    }

    let right_val = eval_expr(right, runtime, ctx)?;

    let result = match op {
        BinOp::Add => add(&left_val, &right_val),
        BinOp::Sub => Value::Number(left_val.to_number() - right_val.to_number()),
        BinOp::Mul => Value::Number(left_val.to_number() * right_val.to_number()),
        BinOp::Div => Value::Number(left_val.to_number() / right_val.to_number()),
        BinOp::Rem => Value::Number(left_val.to_number() % right_val.to_number()),
        BinOp::Eq => Value::Boolean(left_val.loosely_equals(&right_val)),
        BinOp::Neq => Value::Boolean(!left_val.loosely_equals(&right_val)),
        BinOp::Lt => compare(&left_val, &right_val, Ordering::is_lt),
        BinOp::Lte => compare(&left_val, &right_val, Ordering::is_le),
        BinOp::Gt => compare(&left_val, &right_val, Ordering::is_gt),
        BinOp::Gte => compare(&left_val, &right_val, Ordering::is_ge),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    };

    Ok(result)
}

/// `+` concatenates as soon as either side is a string, array or object.
fn add(left: &Value, right: &Value) -> Value {
    let textual = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
    if textual(left) || textual(right) {
        Value::String(left.to_string_value() + &right.to_string_value())
    } else {
        Value::Number(left.to_number() + right.to_number())
    }
}

fn compare(a: &Value, b: &Value, pred: fn(Ordering) -> bool) -> Value {
    Value::Boolean(a.compare(b).is_some_and(pred))
}
