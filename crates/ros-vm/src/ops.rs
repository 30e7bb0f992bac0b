//! Operator dispatch: the meaning of every operator, keyed on operand type
//! classes.
//!
//! `MathOps` is the [`Dispatch`] implementation the engine hands to the
//! expression evaluator. Token operands are resolved against the live scope
//! and function registry; computed operands pass through untouched. Dispatch
//! is on value type class only, so a literal and a variable of the same
//! class behave identically.

use ros_core::{ExecResult, Kind, Value};
use ros_eval::{Dispatch, Operand};

use crate::registry::FunctionRegistry;
use crate::scope::{resolve, Scope};

/// Operator semantics bound to interpreter state.
pub struct MathOps<'a> {
    pub scope: &'a Scope,
    pub registry: &'a FunctionRegistry,
}

fn bool01(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Bitwise operators work on the integer part of the operands.
fn as_i64(n: f64) -> i64 {
    n.trunc() as i64
}

/// Repetition counts must be integral; negative counts repeat zero times.
fn repeat_count(n: f64, scope: &Scope) -> ExecResult<usize> {
    if !n.is_finite() || n.fract() != 0.0 {
        return Err(scope.type_error("repetition count must be an integer"));
    }
    Ok(if n < 0.0 { 0 } else { n as usize })
}

/// Check and normalize a position into `0..len`, counting negative
/// positions from the end.
pub(crate) fn normalize_index(
    n: f64,
    len: usize,
    what: &str,
    scope: &Scope,
) -> ExecResult<usize> {
    if !n.is_finite() || n.fract() != 0.0 {
        return Err(scope.type_error(format!("{} index must be an integer", what)));
    }
    let mut idx = n as i64;
    if idx < 0 {
        idx += len as i64;
    }
    if idx < 0 || idx as usize >= len {
        return Err(scope.index_error(format!("{} index out of range", what)));
    }
    Ok(idx as usize)
}

impl<'a> MathOps<'a> {
    pub fn new(scope: &'a Scope, registry: &'a FunctionRegistry) -> Self {
        Self { scope, registry }
    }

    fn operand(&self, operand: Operand<'_>) -> ExecResult<(Value, Kind)> {
        match operand {
            Operand::Token(token) => resolve(token, self.scope, self.registry),
            Operand::Value(value) => {
                let kind = value.kind(false);
                Ok((value, kind))
            }
        }
    }

    fn numeric_binary(&self, a: f64, op: &str, b: f64) -> ExecResult<Value> {
        let n = match op {
            "+" => a + b,
            "-" => a - b,
            "*" => a * b,
            "/" => {
                if b == 0.0 {
                    return Err(self.scope.runtime("division by zero"));
                }
                a / b
            }
            "//" => {
                if b == 0.0 {
                    return Err(self.scope.runtime("division by zero"));
                }
                (a / b).floor()
            }
            "**" => a.powf(b),
            "^" => (as_i64(a) ^ as_i64(b)) as f64,
            "|" => (as_i64(a) | as_i64(b)) as f64,
            "&" => (as_i64(a) & as_i64(b)) as f64,
            "==" => bool01(a == b),
            "!=" => bool01(a != b),
            ">=" => bool01(a >= b),
            "<=" => bool01(a <= b),
            ">" => bool01(a > b),
            "<" => bool01(a < b),
            "and" => bool01(a != 0.0 && b != 0.0),
            "or" => bool01(a != 0.0 || b != 0.0),
            _ => return Err(self.scope.unsupported(op, "two numbers")),
        };
        Ok(Value::Number(n))
    }

    fn string_binary(&self, a: &str, op: &str, b: &str) -> ExecResult<Value> {
        match op {
            "+" => Ok(Value::Str(format!("{}{}", a, b))),
            "==" => Ok(Value::Number(bool01(a == b))),
            "!=" => Ok(Value::Number(bool01(a != b))),
            // `a in b` asks whether a occurs inside b.
            "in" => Ok(Value::Number(bool01(b.contains(a)))),
            _ => Err(self
                .scope
                .type_error(format!("can not apply '{}' to string and string", op))),
        }
    }

    fn string_numeric(&self, a: &str, op: &str, b: f64) -> ExecResult<Value> {
        match op {
            "index" => {
                let chars: Vec<char> = a.chars().collect();
                let idx = normalize_index(b, chars.len(), "string", self.scope)?;
                Ok(Value::Str(chars[idx].to_string()))
            }
            "pop" => {
                let mut chars: Vec<char> = a.chars().collect();
                let idx = normalize_index(b, chars.len(), "pop", self.scope)?;
                chars.remove(idx);
                Ok(Value::Str(chars.into_iter().collect()))
            }
            "*" => Ok(Value::Str(a.repeat(repeat_count(b, self.scope)?))),
            _ => Err(self.scope.unsupported(op, "a string and a number")),
        }
    }

    fn list_numeric(&self, items: &[Value], op: &str, b: f64) -> ExecResult<Value> {
        match op {
            "index" => {
                let idx = normalize_index(b, items.len(), "list", self.scope)?;
                Ok(items[idx].clone())
            }
            "*" => {
                let count = repeat_count(b, self.scope)?;
                let mut out = Vec::with_capacity(items.len() * count);
                for _ in 0..count {
                    out.extend_from_slice(items);
                }
                Ok(Value::List(out))
            }
            _ => Err(self.scope.unsupported(op, "a list and a number")),
        }
    }
}

impl Dispatch for MathOps<'_> {
    fn binary(&mut self, left: Operand<'_>, op: &str, right: Operand<'_>) -> ExecResult<Value> {
        let (a, _) = self.operand(left)?;
        let (b, _) = self.operand(right)?;
        match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => self.numeric_binary(*x, op, *y),
            (Value::Str(x), Value::Str(y)) => self.string_binary(x, op, y),
            (Value::Str(x), Value::Number(y)) => self.string_numeric(x, op, *y),
            (Value::List(items), Value::Number(y)) => self.list_numeric(items, op, *y),
            _ => Err(self.scope.type_error(format!(
                "can not apply '{}' to {} and {}",
                op,
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    fn unary(&mut self, op: &str, operand: Operand<'_>) -> ExecResult<Value> {
        let (a, _) = self.operand(operand)?;
        match &a {
            Value::Number(n) => {
                let x = *n;
                let value = match op {
                    "-" => -x,
                    "not" => bool01(x == 0.0),
                    "~" => !as_i64(x) as f64,
                    "sqrt" => {
                        if x < 0.0 {
                            return Err(self.scope.runtime("math domain error"));
                        }
                        x.sqrt()
                    }
                    "cbrt" => x.cbrt(),
                    "sin" => x.sin(),
                    "cos" => x.cos(),
                    "tan" => x.tan(),
                    _ => return Err(self.scope.unsupported(op, "a number")),
                };
                Ok(Value::Number(value))
            }
            Value::Str(s) => match op {
                "len" => Ok(Value::Number(s.chars().count() as f64)),
                "not" => Ok(Value::Number(bool01(s.is_empty()))),
                _ => Err(self.scope.unsupported(op, "a string")),
            },
            Value::List(items) => match op {
                "len" => Ok(Value::Number(items.len() as f64)),
                "not" => Ok(Value::Number(bool01(items.is_empty()))),
                _ => Err(self.scope.unsupported(op, "a list")),
            },
            Value::FuncRef { .. } => Err(self
                .scope
                .type_error(format!("can not apply '{}' to a function", op))),
        }
    }
}
