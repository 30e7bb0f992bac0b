//! Core types for the ROS interpreter.
//!
//! This crate holds the leaf vocabulary shared by the evaluator and the
//! execution engine:
//!
//! - [`Value`] and [`Kind`]: the runtime value union and its
//!   classification tags
//! - [`tokenize`]: the statement tokenizer (quote- and bracket-aware,
//!   comment-stripping)
//! - [`SourceBuffer`] / [`SourceSet`]: named, line-indexed program text
//! - [`ExecError`]: the error taxonomy
//!
//! Nothing here executes code; the engine lives in `ros-vm` and the
//! expression evaluator in `ros-eval`.

mod error;
mod source;
mod token;
mod value;

pub use error::ExecError;
pub use source::{SourceBuffer, SourceSet};
pub use token::{strip_comment, tokenize, Tokens};
pub use value::{format_number, Kind, Value};

/// Result alias used across the interpreter crates.
pub type ExecResult<T> = Result<T, ExecError>;
