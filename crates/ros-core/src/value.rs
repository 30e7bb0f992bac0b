//! Runtime values and their classification tags.

use std::fmt;

/// A runtime value.
///
/// Numbers use a single f64 representation; integer-valued numbers display
/// without a fractional part. Lists are ordered and mutable. A `FuncRef`
/// names a registered function together with the source buffer that owns it.
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Number(f64),
    Str(String),
    List(Vec<Value>),
    FuncRef { source: String, name: String },
}

/// How a token was classified by the value resolver.
///
/// `Var*` kinds mean the token named a bound variable; `Literal*` kinds mean
/// it parsed as a literal. Operator dispatch only cares about the type class,
/// so the grouping accessors below are the main consumers.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Kind {
    LiteralNumber,
    LiteralString,
    LiteralList,
    VarNumber,
    VarString,
    VarList,
    FunctionRef,
}

impl Kind {
    /// Numeric class, variable or literal.
    pub fn is_number(self) -> bool {
        matches!(self, Kind::LiteralNumber | Kind::VarNumber)
    }

    /// String class, variable or literal.
    pub fn is_string(self) -> bool {
        matches!(self, Kind::LiteralString | Kind::VarString)
    }

    /// List class, variable or literal.
    pub fn is_list(self) -> bool {
        matches!(self, Kind::LiteralList | Kind::VarList)
    }

    /// True for the `Var*` kinds.
    pub fn is_variable(self) -> bool {
        matches!(self, Kind::VarNumber | Kind::VarString | Kind::VarList)
    }
}

impl Value {
    /// Create a number value.
    pub fn number(n: f64) -> Self {
        Value::Number(n)
    }

    /// Create a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Create a list value.
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(items)
    }

    /// Create a function reference.
    pub fn func_ref(source: impl Into<String>, name: impl Into<String>) -> Self {
        Value::FuncRef {
            source: source.into(),
            name: name.into(),
        }
    }

    /// Get the numeric value, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the string contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the list elements, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Truthiness: non-zero numbers, non-empty strings and lists, and all
    /// function references are truthy. NaN is truthy (it is not zero).
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::FuncRef { .. } => true,
        }
    }

    /// The classification tag for this value's runtime type.
    pub fn kind(&self, variable: bool) -> Kind {
        match (self, variable) {
            (Value::Number(_), true) => Kind::VarNumber,
            (Value::Number(_), false) => Kind::LiteralNumber,
            (Value::Str(_), true) => Kind::VarString,
            (Value::Str(_), false) => Kind::LiteralString,
            (Value::List(_), true) => Kind::VarList,
            (Value::List(_), false) => Kind::LiteralList,
            (Value::FuncRef { .. }, _) => Kind::FunctionRef,
        }
    }

    /// Short name of the type class, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::FuncRef { .. } => "function",
        }
    }
}

/// Format a number the way the language displays it: integer-valued numbers
/// print without a fractional part, everything else uses the shortest
/// round-trip form.
pub fn format_number(n: f64) -> String {
    // 2^53 is the largest range where every integer-valued f64 is exact.
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_992.0 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    // Quote strings inside lists so the form re-tokenizes.
                    match item {
                        Value::Str(s) => write!(f, "\"{}\"", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                f.write_str("]")
            }
            Value::FuncRef { source, name } => write!(f, "<function {} from {}>", name, source),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_valued_numbers_display_without_fraction() {
        assert_eq!(Value::number(5.0).to_string(), "5");
        assert_eq!(Value::number(-17.0).to_string(), "-17");
        assert_eq!(Value::number(0.0).to_string(), "0");
    }

    #[test]
    fn fractional_numbers_display_as_is() {
        assert_eq!(Value::number(2.5).to_string(), "2.5");
        assert_eq!(Value::number(-0.125).to_string(), "-0.125");
    }

    #[test]
    fn huge_numbers_fall_back_to_float_form() {
        let v = Value::number(1e20);
        assert_eq!(v.to_string(), "100000000000000000000");
    }

    #[test]
    fn string_displays_raw() {
        assert_eq!(Value::string("hello").to_string(), "hello");
    }

    #[test]
    fn list_displays_in_literal_form() {
        let v = Value::list(vec![
            Value::number(1.0),
            Value::string("two"),
            Value::list(vec![Value::number(3.0)]),
        ]);
        assert_eq!(v.to_string(), "[1 \"two\" [3]]");
    }

    #[test]
    fn truthiness() {
        assert!(Value::number(1.0).is_truthy());
        assert!(Value::number(-0.5).is_truthy());
        assert!(!Value::number(0.0).is_truthy());
        assert!(Value::string("x").is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::list(vec![Value::number(0.0)]).is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(Value::func_ref("main", "f").is_truthy());
    }

    #[test]
    fn nan_is_truthy() {
        assert!(Value::number(f64::NAN).is_truthy());
    }

    #[test]
    fn kind_grouping() {
        assert!(Kind::VarNumber.is_number());
        assert!(Kind::LiteralNumber.is_number());
        assert!(!Kind::VarString.is_number());
        assert!(Kind::LiteralString.is_string());
        assert!(Kind::VarList.is_list());
        assert!(Kind::VarList.is_variable());
        assert!(!Kind::LiteralList.is_variable());
        assert!(!Kind::FunctionRef.is_number());
    }

    #[test]
    fn kind_of_value() {
        assert_eq!(Value::number(1.0).kind(true), Kind::VarNumber);
        assert_eq!(Value::number(1.0).kind(false), Kind::LiteralNumber);
        assert_eq!(Value::string("s").kind(true), Kind::VarString);
        assert_eq!(Value::list(vec![]).kind(false), Kind::LiteralList);
        assert_eq!(Value::func_ref("main", "f").kind(true), Kind::FunctionRef);
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(2.5), Value::Number(2.5));
        assert_eq!(Value::from(3i64), Value::Number(3.0));
        assert_eq!(Value::from(true), Value::Number(1.0));
        assert_eq!(Value::from(false), Value::Number(0.0));
        assert_eq!(Value::from("hi"), Value::Str("hi".to_string()));
    }

    #[test]
    fn as_accessors() {
        assert_eq!(Value::number(4.0).as_number(), Some(4.0));
        assert_eq!(Value::string("s").as_number(), None);
        assert_eq!(Value::string("s").as_str(), Some("s"));
        assert_eq!(Value::number(4.0).as_str(), None);
        let list = Value::list(vec![Value::number(1.0)]);
        assert_eq!(list.as_list().map(|l| l.len()), Some(1));
    }
}
