//! Module loading: turning importable text into a registered source buffer
//! plus a function table.
//!
//! A module chooses its public surface with `export functions name...`
//! lines. Importing scans the whole buffer once, collecting exports and
//! definitions, then installs a table holding only the exported names. An
//! export with no matching definition aborts the import; the registry table
//! is only replaced after the whole module checks out.

use std::collections::BTreeMap;

use ros_core::{tokenize, ExecError, ExecResult, SourceBuffer, SourceSet};

use crate::registry::{find_endfunc, FuncEntry, FunctionRegistry};

/// Parse the literal arity field of a `def` line.
fn parse_arity(token: &str) -> Option<usize> {
    let n: f64 = token.parse().ok()?;
    if n.is_finite() && n.fract() == 0.0 && n >= 0.0 {
        Some(n as usize)
    } else {
        None
    }
}

/// Load `text` as the module named `name`.
///
/// Registers the source buffer and installs the exported function table.
/// The import is all-or-nothing: an undefined export or a malformed `def`
/// leaves both the source set and the registry untouched.
pub fn import_module(
    name: &str,
    text: &str,
    trusted: bool,
    sources: &mut SourceSet,
    registry: &mut FunctionRegistry,
) -> ExecResult<()> {
    let buffer = SourceBuffer::new(name, text, trusted);

    let mut exported: Vec<String> = Vec::new();
    let mut defined: BTreeMap<String, FuncEntry> = BTreeMap::new();

    for i in 0..buffer.line_count() {
        let line = match buffer.line(i) {
            Some(line) => line,
            None => break,
        };
        let tokens = tokenize(line);
        match tokens.first().copied() {
            Some("export") if tokens.get(1).copied() == Some("functions") => {
                exported.extend(tokens[2..].iter().map(|t| t.to_string()));
            }
            Some("def") => {
                let invalid = || ExecError::Syntax {
                    message: "invalid function syntax during importing".to_string(),
                    line: i,
                    source: name.to_string(),
                };
                let fname = tokens.get(1).copied().ok_or_else(invalid)?;
                let arity = tokens
                    .get(2)
                    .copied()
                    .and_then(parse_arity)
                    .ok_or_else(invalid)?;
                let end = find_endfunc(&buffer, i).ok_or_else(|| ExecError::Syntax {
                    message: format!("Function {} has no endfunc statement", fname),
                    line: i,
                    source: name.to_string(),
                })?;
                defined.insert(
                    fname.to_string(),
                    FuncEntry {
                        start: i + 1,
                        arity,
                        end,
                    },
                );
            }
            _ => {}
        }
    }

    let mut table = BTreeMap::new();
    for fname in &exported {
        let entry = defined.get(fname).ok_or_else(|| ExecError::Import {
            file: name.to_string(),
            name: fname.clone(),
        })?;
        table.insert(fname.clone(), *entry);
    }

    sources.insert(buffer);
    registry.replace_table(name, table);
    Ok(())
}
