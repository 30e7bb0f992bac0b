//! The interpreter error taxonomy.
//!
//! Every error raised during statement execution carries enough context to
//! be reported on its own: the variants that correspond to a place in the
//! program embed the line index and source key where they were raised.
//! `Script` is the one deliberately bare variant: it is the payload of the
//! `error` command, and its display form is exactly the script-supplied
//! message so a `try`/`except` handler sees the text unchanged.

use std::fmt;

/// An error raised while executing a statement.
///
/// `Display` is implemented by hand (rather than via `thiserror`) because
/// the `source` fields hold the source key of the buffer that raised the
/// error, not an underlying `std::error::Error` cause.
#[derive(Clone, PartialEq, Debug)]
pub enum ExecError {
    /// Malformed command grammar: missing `=`, wrong arity, unmatched block
    /// terminators.
    Syntax {
        message: String,
        line: usize,
        source: String,
    },

    /// A token that is not a literal, a bound variable, or a function name.
    UnresolvedValue {
        token: String,
        line: usize,
        source: String,
    },

    /// Call target that no source defines.
    UnknownFunction {
        name: String,
        line: usize,
        source: String,
    },

    /// Other name misuse: assigning through a literal, bad identifiers.
    Name {
        message: String,
        line: usize,
        source: String,
    },

    /// Operator applied to incompatible value kinds.
    Type {
        message: String,
        line: usize,
        source: String,
    },

    /// Operator that parses but has no dispatch entry for these operands.
    UnsupportedOperator {
        op: String,
        operands: String,
        line: usize,
        source: String,
    },

    /// Export list names a function the module never defines.
    Import { file: String, name: String },

    /// `import` of a name absent from the importable-files table.
    FileNotFound {
        name: String,
        line: usize,
        source: String,
    },

    /// `system` in a sandboxed interpreter from an untrusted buffer.
    Permission { line: usize, source: String },

    /// Out-of-range list or string position.
    Index {
        message: String,
        line: usize,
        source: String,
    },

    /// Raised by the `error` command; displays as the bare message.
    Script(String),

    /// Catch-all for host-level failures (subprocess spawn, bad sleep
    /// duration, arithmetic faults).
    Runtime {
        message: String,
        line: usize,
        source: String,
    },
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Syntax {
                message,
                line,
                source,
            } => write!(f, "{message} | line {line} in {source} | syntax error"),
            ExecError::UnresolvedValue {
                token,
                line,
                source,
            } => write!(f, "Value | {token} | is not valid | line {line} in {source}"),
            ExecError::UnknownFunction { name, line, source } => {
                write!(f, "Function {name} not defined | line {line} in {source}")
            }
            ExecError::Name {
                message,
                line,
                source,
            } => write!(f, "{message} | line {line} in {source}"),
            ExecError::Type {
                message,
                line,
                source,
            } => write!(f, "{message} | line {line} in {source} | type error"),
            ExecError::UnsupportedOperator {
                op,
                operands,
                line,
                source,
            } => write!(
                f,
                "operator '{op}' is not supported for {operands} | line {line} in {source}"
            ),
            ExecError::Import { file, name } => {
                write!(f, "namespace {file} does not export function {name}")
            }
            ExecError::FileNotFound { name, line, source } => {
                write!(f, "no importable file named '{name}' | line {line} in {source}")
            }
            ExecError::Permission { line, source } => write!(
                f,
                "interpreter is bound and can not run privileged actions | line {line} in {source} | permission error"
            ),
            ExecError::Index {
                message,
                line,
                source,
            } => write!(f, "{message} | line {line} in {source} | index error"),
            ExecError::Script(message) => write!(f, "{message}"),
            ExecError::Runtime {
                message,
                line,
                source,
            } => write!(f, "{message} | line {line} in {source}"),
        }
    }
}

impl std::error::Error for ExecError {}

impl ExecError {
    /// The taxonomy name, used in the fault report header.
    pub fn error_name(&self) -> &'static str {
        match self {
            ExecError::Syntax { .. } => "SyntaxError",
            ExecError::UnresolvedValue { .. } => "UnresolvedValueError",
            ExecError::UnknownFunction { .. } | ExecError::Name { .. } => "NameError",
            ExecError::Type { .. } => "TypeError",
            ExecError::UnsupportedOperator { .. } => "UnsupportedOperatorError",
            ExecError::Import { .. } => "ImportError",
            ExecError::FileNotFound { .. } => "FileNotFoundError",
            ExecError::Permission { .. } => "PermissionError",
            ExecError::Index { .. } => "IndexError",
            ExecError::Script(_) | ExecError::Runtime { .. } => "RuntimeError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_error_displays_bare_message() {
        let err = ExecError::Script("boom".to_string());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn unresolved_value_names_token_and_location() {
        let err = ExecError::UnresolvedValue {
            token: "ghost".to_string(),
            line: 3,
            source: "main".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ghost"));
        assert!(msg.contains("line 3"));
        assert!(msg.contains("main"));
    }

    #[test]
    fn unknown_function_names_function() {
        let err = ExecError::UnknownFunction {
            name: "ghost".to_string(),
            line: 0,
            source: "main".to_string(),
        };
        assert!(err.to_string().contains("Function ghost not defined"));
    }

    #[test]
    fn import_error_names_namespace_and_function() {
        let err = ExecError::Import {
            file: "lib".to_string(),
            name: "bar".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "namespace lib does not export function bar"
        );
    }

    #[test]
    fn error_names_match_taxonomy() {
        let syntax = ExecError::Syntax {
            message: String::new(),
            line: 0,
            source: String::new(),
        };
        assert_eq!(syntax.error_name(), "SyntaxError");
        assert_eq!(ExecError::Script(String::new()).error_name(), "RuntimeError");
        let perm = ExecError::Permission {
            line: 0,
            source: String::new(),
        };
        assert_eq!(perm.error_name(), "PermissionError");
        let unsupported = ExecError::UnsupportedOperator {
            op: "%".to_string(),
            operands: "numbers".to_string(),
            line: 0,
            source: String::new(),
        };
        assert_eq!(unsupported.error_name(), "UnsupportedOperatorError");
    }

    #[test]
    fn permission_error_mentions_sandbox() {
        let err = ExecError::Permission {
            line: 7,
            source: "main".to_string(),
        };
        assert!(err.to_string().contains("privileged"));
        assert!(err.to_string().contains("line 7"));
    }
}
