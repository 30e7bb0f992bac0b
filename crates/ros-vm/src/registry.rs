//! The function index: which names are callable, where their bodies start,
//! and how many arguments they take.
//!
//! Each source buffer owns one table. Name lookup without a source walks
//! tables in registration order (main first, then imports in the order they
//! ran), so a locally defined function wins over a later import of the same
//! name.

use std::collections::BTreeMap;

use ros_core::SourceBuffer;

/// Registered location and arity of one function.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FuncEntry {
    /// First body line (the line after `def`).
    pub start: usize,
    /// Number of `argN` parameters the function expects.
    pub arity: usize,
    /// Line index of the matching `endfunc`.
    pub end: usize,
}

/// Per-source function tables.
#[derive(Clone, Debug)]
pub struct FunctionRegistry {
    tables: Vec<(String, BTreeMap<String, FuncEntry>)>,
}

impl FunctionRegistry {
    /// Registry with an empty table for the main source.
    pub fn new() -> Self {
        Self {
            tables: vec![("main".to_string(), BTreeMap::new())],
        }
    }

    /// Register a function under a source, creating the source's table if
    /// this is its first definition. Redefinition replaces the old entry.
    pub fn define(&mut self, source: &str, name: &str, entry: FuncEntry) {
        for (key, table) in &mut self.tables {
            if key == source {
                table.insert(name.to_string(), entry);
                return;
            }
        }
        let mut table = BTreeMap::new();
        table.insert(name.to_string(), entry);
        self.tables.push((source.to_string(), table));
    }

    /// Install a complete table for a source, replacing any existing one.
    /// Used by the module loader so an import is all-or-nothing.
    pub fn replace_table(&mut self, source: &str, table: BTreeMap<String, FuncEntry>) {
        for (key, existing) in &mut self.tables {
            if key == source {
                *existing = table;
                return;
            }
        }
        self.tables.push((source.to_string(), table));
    }

    /// Find a function by bare name, searching sources in registration
    /// order. Returns the owning source key and the entry.
    pub fn find(&self, name: &str) -> Option<(&str, FuncEntry)> {
        for (key, table) in &self.tables {
            if let Some(entry) = table.get(name) {
                return Some((key.as_str(), *entry));
            }
        }
        None
    }

    /// Look up a function in one specific source's table.
    pub fn get(&self, source: &str, name: &str) -> Option<FuncEntry> {
        self.tables
            .iter()
            .find(|(key, _)| key == source)
            .and_then(|(_, table)| table.get(name).copied())
    }

    /// All tables, in registration order, names sorted within each.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, FuncEntry>)> {
        self.tables.iter().map(|(key, table)| (key.as_str(), table))
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate the `endfunc` matching a `def` at `def_line`, skipping nested
/// definitions. Returns `None` when the buffer runs out first.
pub fn find_endfunc(buffer: &SourceBuffer, def_line: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut j = def_line + 1;
    while let Some(line) = buffer.line(j) {
        let mut tokens = ros_core::tokenize(line).into_iter();
        match tokens.next() {
            Some("def") => depth += 1,
            Some("endfunc") => {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}
