//! Quill: a small dynamically typed scripting language.
//!
//! Source text flows through [`lexer::tokenize`], [`parser::Parser`] and
//! [`interpreter::Interpreter`]. [`run`] wires the three together.

pub mod ast;
pub mod config;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod natives;
pub mod parser;
pub mod value;

use log::trace;

pub use config::{Config, ElifPolicy, ErrorMode};
pub use error::{LangError, LangResult};
pub use interpreter::Interpreter;
pub use value::Value;

/// Runs `source` in a fresh interpreter writing to stdout and returns the
/// value of its last statement.
pub fn run(source: &str, config: Config) -> LangResult<Value> {
    trace!("running {} byte(s) of source with {:?}", source.len(), config);
    let interpreter = Interpreter::new(config);
    let value = interpreter.run(source)?;
    trace!("program finished with {:?}", value);
    Ok(value)
}
