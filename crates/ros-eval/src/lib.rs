//! Arithmetic expression evaluation for ROS.
//!
//! The pipeline is scan -> parse -> eval: [`scan::scan`] splits an
//! expression string into operator and operand tokens, [`parse::parse`]
//! builds an AST with shunting-yard precedence handling, and
//! [`eval::eval_expr`] walks the tree bottom-up, handing every operator
//! application to a caller-supplied [`Dispatch`] implementation. The crate
//! knows grammar, not meaning: what `+` does to two operands is entirely
//! the dispatcher's business.

use ros_core::ExecError;
use thiserror::Error;

pub mod eval;
pub mod parse;
pub mod scan;

pub use eval::{eval_expr, eval_node, Dispatch, Operand};
pub use parse::{parse, Node};
pub use scan::scan;

/// Errors from expression evaluation.
///
/// Syntax errors carry no source location; the caller knows which line it
/// was evaluating and attaches the position itself. Dispatch errors arrive
/// fully located from the operator implementation.
#[derive(Clone, PartialEq, Debug, Error)]
pub enum EvalError {
    #[error("{0}")]
    Syntax(String),
    #[error(transparent)]
    Dispatch(#[from] ExecError),
}
