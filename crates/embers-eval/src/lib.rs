//! Embers scriptlet interpreter.
//!
//! This crate executes programs produced by the template code generator.
//! Evaluation is synchronous; every function returns `Result<_, Error>` and
//! failures propagate with `?`. Output accumulates in the [`Runtime`] buffer
//! and is only handed back when the whole program succeeds.

mod error;
mod escape;
mod eval;
mod filters;
mod interpreter;
mod runtime;
mod value;

pub use error::Error;
pub use escape::{default_escaper, escape_html, Escaper};
pub use eval::{eval_block, eval_expr, eval_program, eval_statement, EvalContext};
pub use filters::{FilterFn, FilterRegistry};
pub use interpreter::{Failure, Interpreter};
pub use runtime::{Location, Runtime};
pub use value::Value;

/// Result type for interpreter operations.
pub type Result<T> = std::result::Result<T, Error>;
