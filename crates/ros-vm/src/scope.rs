//! The flat variable namespace and the token resolver.
//!
//! There is one `Scope` per interpreter instance and no lexical nesting:
//! function calls share the caller's variables, with `arg1..argN` as the
//! only call-boundary convention. The scope also tracks the line and source
//! currently executing so that errors raised anywhere in the engine carry
//! their position.

use std::collections::BTreeMap;

use ros_core::{tokenize, ExecError, ExecResult, Kind, Value};

use crate::registry::FunctionRegistry;

/// The variable table plus the current execution position.
#[derive(Clone, Debug)]
pub struct Scope {
    vars: BTreeMap<String, Value>,
    /// Line index of the statement being executed.
    pub line: usize,
    /// Key of the source buffer being executed.
    pub source: String,
}

impl Scope {
    /// Fresh scope with the `return` slot initialized to zero.
    pub fn new() -> Self {
        let mut vars = BTreeMap::new();
        vars.insert("return".to_string(), Value::Number(0.0));
        Self {
            vars,
            line: 0,
            source: "main".to_string(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Mutable access to a list-typed variable's elements.
    pub fn get_list_mut(&mut self, name: &str) -> Option<&mut Vec<Value>> {
        match self.vars.get_mut(name) {
            Some(Value::List(items)) => Some(items),
            _ => None,
        }
    }

    /// Variables in name order (deterministic for state snapshots).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn syntax(&self, message: impl Into<String>) -> ExecError {
        ExecError::Syntax {
            message: message.into(),
            line: self.line,
            source: self.source.clone(),
        }
    }

    pub fn name_error(&self, message: impl Into<String>) -> ExecError {
        ExecError::Name {
            message: message.into(),
            line: self.line,
            source: self.source.clone(),
        }
    }

    pub fn type_error(&self, message: impl Into<String>) -> ExecError {
        ExecError::Type {
            message: message.into(),
            line: self.line,
            source: self.source.clone(),
        }
    }

    pub fn index_error(&self, message: impl Into<String>) -> ExecError {
        ExecError::Index {
            message: message.into(),
            line: self.line,
            source: self.source.clone(),
        }
    }

    pub fn runtime(&self, message: impl Into<String>) -> ExecError {
        ExecError::Runtime {
            message: message.into(),
            line: self.line,
            source: self.source.clone(),
        }
    }

    pub fn unresolved(&self, token: &str) -> ExecError {
        ExecError::UnresolvedValue {
            token: token.to_string(),
            line: self.line,
            source: self.source.clone(),
        }
    }

    pub fn unsupported(&self, op: &str, operands: impl Into<String>) -> ExecError {
        ExecError::UnsupportedOperator {
            op: op.to_string(),
            operands: operands.into(),
            line: self.line,
            source: self.source.clone(),
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

/// The quoted-string form accepted by the resolver: at least two characters,
/// same quote kind on both ends.
fn quoted_inner(token: &str) -> Option<&str> {
    let bytes = token.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        Some(&token[1..token.len() - 1])
    } else {
        None
    }
}

fn bracketed_inner(token: &str) -> Option<&str> {
    if token.len() >= 2 && token.starts_with('[') && token.ends_with(']') {
        Some(&token[1..token.len() - 1])
    } else {
        None
    }
}

/// Classify a raw token into a `(Value, Kind)` pair.
///
/// Classification order: keyword literals, then variable lookup, then quoted
/// string, then number, then bracketed list (elements resolved recursively),
/// then function-name search across all sources in registration order.
/// Variables shadow literals on purpose; a keyword can never be shadowed.
pub fn resolve(token: &str, scope: &Scope, registry: &FunctionRegistry) -> ExecResult<(Value, Kind)> {
    if token.eq_ignore_ascii_case("null")
        || token.eq_ignore_ascii_case("none")
        || token.eq_ignore_ascii_case("nil")
    {
        return Ok((Value::Number(0.0), Kind::LiteralNumber));
    }
    if token.eq_ignore_ascii_case("true") {
        return Ok((Value::Number(1.0), Kind::LiteralNumber));
    }

    if let Some(value) = scope.get(token) {
        let kind = value.kind(true);
        return Ok((value.clone(), kind));
    }

    if let Some(inner) = quoted_inner(token) {
        return Ok((Value::Str(inner.to_string()), Kind::LiteralString));
    }

    if let Ok(n) = token.parse::<f64>() {
        return Ok((Value::Number(n), Kind::LiteralNumber));
    }

    if let Some(inner) = bracketed_inner(token) {
        let mut items = Vec::new();
        for element in tokenize(inner) {
            let (value, _) = resolve(element, scope, registry)?;
            items.push(value);
        }
        return Ok((Value::List(items), Kind::LiteralList));
    }

    if let Some((source, _)) = registry.find(token) {
        return Ok((Value::func_ref(source, token), Kind::FunctionRef));
    }

    Err(scope.unresolved(token))
}
