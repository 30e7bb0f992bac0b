//! Bottom-up AST evaluation over a pluggable operator dispatcher.
//!
//! The evaluator never resolves a token itself. Leaves travel to the
//! dispatcher as raw text and computed subtrees travel as finished values,
//! so a string result is never re-scanned as source text on its way up the
//! tree.

use ros_core::{ExecResult, Value};

use crate::parse::{parse, Node};
use crate::scan::scan;
use crate::EvalError;

/// One side of an operator application.
///
/// `Token` is unresolved leaf text the dispatcher must look up; `Value` is
/// the already-computed result of an inner expression.
#[derive(Clone, PartialEq, Debug)]
pub enum Operand<'a> {
    Token(&'a str),
    Value(Value),
}

/// Operator semantics, supplied by the caller.
///
/// The dispatcher owns token resolution and the meaning of every operator.
/// It is `&mut self` because resolving a token may consult mutable
/// interpreter state.
pub trait Dispatch {
    fn binary(&mut self, left: Operand<'_>, op: &str, right: Operand<'_>) -> ExecResult<Value>;
    fn unary(&mut self, op: &str, operand: Operand<'_>) -> ExecResult<Value>;
}

fn eval_operand<'a, D: Dispatch>(node: &Node<'a>, dispatch: &mut D) -> ExecResult<Operand<'a>> {
    match node {
        Node::Leaf(token) => Ok(Operand::Token(token)),
        other => Ok(Operand::Value(eval_node(other, dispatch)?)),
    }
}

/// Evaluate a parsed tree.
pub fn eval_node<D: Dispatch>(node: &Node<'_>, dispatch: &mut D) -> ExecResult<Value> {
    match node {
        // A bare leaf at the root only happens for trees built by hand;
        // parse() normalizes a lone token to `token * 1`. Route it through
        // the same multiply so resolution still happens in the dispatcher.
        Node::Leaf(token) => dispatch.binary(
            Operand::Token(token),
            "*",
            Operand::Value(Value::Number(1.0)),
        ),
        Node::Unary { op, operand } => {
            let operand = eval_operand(operand, dispatch)?;
            dispatch.unary(op, operand)
        }
        Node::Binary { left, op, right } => {
            let left = eval_operand(left, dispatch)?;
            let right = eval_operand(right, dispatch)?;
            dispatch.binary(left, op, right)
        }
    }
}

/// Scan, parse, and evaluate an expression string.
pub fn eval_expr<D: Dispatch>(expr: &str, dispatch: &mut D) -> Result<Value, EvalError> {
    let tokens = scan(expr)?;
    let ast = parse(tokens)?;
    eval_node(&ast, dispatch).map_err(EvalError::Dispatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ros_core::ExecError;

    /// Minimal numeric/string dispatcher for exercising the pipeline.
    struct MiniOps;

    impl MiniOps {
        fn resolve(&self, operand: Operand<'_>) -> ExecResult<Value> {
            match operand {
                Operand::Value(v) => Ok(v),
                Operand::Token(t) => {
                    if let Ok(n) = t.parse::<f64>() {
                        return Ok(Value::Number(n));
                    }
                    let bytes = t.as_bytes();
                    if t.len() >= 2
                        && (bytes[0] == b'\'' || bytes[0] == b'"')
                        && bytes[bytes.len() - 1] == bytes[0]
                    {
                        return Ok(Value::Str(t[1..t.len() - 1].to_string()));
                    }
                    Err(ExecError::UnresolvedValue {
                        token: t.to_string(),
                        line: 0,
                        source: "test".to_string(),
                    })
                }
            }
        }
    }

    impl Dispatch for MiniOps {
        fn binary(
            &mut self,
            left: Operand<'_>,
            op: &str,
            right: Operand<'_>,
        ) -> ExecResult<Value> {
            let a = self.resolve(left)?;
            let b = self.resolve(right)?;
            let v = match (a, op, b) {
                (Value::Number(x), "+", Value::Number(y)) => Value::Number(x + y),
                (Value::Number(x), "-", Value::Number(y)) => Value::Number(x - y),
                (Value::Number(x), "*", Value::Number(y)) => Value::Number(x * y),
                (Value::Number(x), "/", Value::Number(y)) => Value::Number(x / y),
                (Value::Str(s), "*", Value::Number(n)) => {
                    Value::Str(s.repeat(n.max(0.0) as usize))
                }
                (Value::Str(s), "+", Value::Str(t)) => Value::Str(s + &t),
                (Value::Str(s), "index", Value::Number(n)) => {
                    let ch = s
                        .chars()
                        .nth(n as usize)
                        .map(|c| c.to_string())
                        .unwrap_or_default();
                    Value::Str(ch)
                }
                (a, op, b) => {
                    return Err(ExecError::UnsupportedOperator {
                        op: op.to_string(),
                        operands: format!("{} {}", a.type_name(), b.type_name()),
                        line: 0,
                        source: "test".to_string(),
                    })
                }
            };
            Ok(v)
        }

        fn unary(&mut self, op: &str, operand: Operand<'_>) -> ExecResult<Value> {
            let a = self.resolve(operand)?;
            let v = match (op, a) {
                ("-", Value::Number(x)) => Value::Number(-x),
                ("sqrt", Value::Number(x)) => Value::Number(x.sqrt()),
                ("len", Value::Str(s)) => Value::Number(s.chars().count() as f64),
                (op, a) => {
                    return Err(ExecError::UnsupportedOperator {
                        op: op.to_string(),
                        operands: a.type_name().to_string(),
                        line: 0,
                        source: "test".to_string(),
                    })
                }
            };
            Ok(v)
        }
    }

    fn eval(expr: &str) -> Value {
        eval_expr(expr, &mut MiniOps).unwrap()
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("3 + 4 * 2"), Value::Number(11.0));
        assert_eq!(eval("(3 + 4) * 2"), Value::Number(14.0));
    }

    #[test]
    fn single_token_resolves() {
        assert_eq!(eval("5"), Value::Number(5.0));
        assert_eq!(eval("'hi'"), Value::Str("hi".to_string()));
    }

    #[test]
    fn unary_chain() {
        assert_eq!(eval("sqrt(16) + 1"), Value::Number(5.0));
        assert_eq!(eval("-3 + 4"), Value::Number(1.0));
    }

    #[test]
    fn string_repetition() {
        assert_eq!(eval("'hi' * 3"), Value::Str("hihihi".to_string()));
    }

    #[test]
    fn string_indexing() {
        assert_eq!(eval("'hello' index 1"), Value::Str("e".to_string()));
    }

    #[test]
    fn string_result_feeds_next_operator_without_rescan() {
        // ('a' + 'b') * 2 computes Str("ab") in the inner node; the outer
        // multiply must receive it as a value, not re-scan "ab" as tokens.
        assert_eq!(eval("('a' + 'b') * 2"), Value::Str("abab".to_string()));
    }

    #[test]
    fn unresolved_token_surfaces_dispatch_error() {
        let err = eval_expr("nosuch + 1", &mut MiniOps).unwrap_err();
        match err {
            EvalError::Dispatch(ExecError::UnresolvedValue { token, .. }) => {
                assert_eq!(token, "nosuch");
            }
            other => panic!("expected unresolved value, got {:?}", other),
        }
    }

    #[test]
    fn syntax_error_reported_before_dispatch() {
        let err = eval_expr("(1 + 2", &mut MiniOps).unwrap_err();
        assert!(matches!(err, EvalError::Syntax(_)));
    }

    #[test]
    fn bare_leaf_routes_through_multiply() {
        let v = eval_node(&Node::Leaf("7"), &mut MiniOps).unwrap();
        assert_eq!(v, Value::Number(7.0));
    }
}
