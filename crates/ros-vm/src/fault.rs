//! Rendering of the interpreter state dump printed when a script dies
//! outside any `try` block.
//!
//! The dump is part of the user-facing surface: scripts have no debugger,
//! so the frozen frame (variables, loaded sources, function tables, the
//! halt position) is what an author gets to work with.

use std::io::{self, Write};

use ros_core::ExecError;

use crate::registry::FunctionRegistry;
use crate::scope::Scope;

/// A snapshot of everything worth printing about a dead interpreter.
pub struct FaultReport<'a> {
    pub error: &'a ExecError,
    pub scope: &'a Scope,
    pub registry: &'a FunctionRegistry,
    /// Keys of the loaded source buffers, registration order.
    pub source_keys: Vec<&'a str>,
    /// Source executing at the time of the fault.
    pub source: &'a str,
    /// Statement index the engine was on.
    pub pc: usize,
    /// Content hash of the faulting source.
    pub hash: String,
}

impl FaultReport<'_> {
    /// Render the dump to a writer.
    pub fn render<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "Error: {}", self.error)?;
        writeln!(w, "Kind: {}", self.error.error_name())?;
        writeln!(w, "CURRENT FRAME:")?;
        writeln!(w, "Variables:")?;
        for (name, value) in self.scope.iter() {
            writeln!(w, "{}: {}", name, value)?;
        }
        writeln!(w)?;
        writeln!(w, "Sources: {:?}", self.source_keys)?;
        writeln!(w, "Current source: {} | Hash: {}", self.source, self.hash)?;
        writeln!(w, "Function Indexes:")?;
        for (source, table) in self.registry.iter() {
            writeln!(w, "  {}:", source)?;
            for (name, entry) in table {
                writeln!(
                    w,
                    "    {}: start={}, nargs={}, end={}",
                    name, entry.start, entry.arity, entry.end
                )?;
            }
        }
        // One past the faulting statement, matching the resume index a
        // handler would have seen.
        writeln!(w, "Index: {}", self.pc + 1)
    }

    /// Render the dump to a string.
    pub fn render_to_string(&self) -> String {
        let mut buf = Vec::new();
        self.render(&mut buf).expect("writing to Vec cannot fail");
        String::from_utf8(buf).expect("output is valid UTF-8")
    }
}
