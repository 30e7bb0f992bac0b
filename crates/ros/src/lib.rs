//! The ROS scripting language.
//!
//! ROS is a line-oriented interpreted language: one statement per line,
//! `begin`/`end` blocks for control flow, named functions with positional
//! `arg1..argN` binding, and an import system gated by per-module export
//! lists. This crate is the embedding surface: [`Interpreter`] wires a
//! script and its importable files into a `ros_vm::Machine` and runs it.
//!
//! # Quick start
//!
//! ```
//! use ros::Interpreter;
//!
//! let interpreter = Interpreter::new();
//! let out = interpreter.run_captured("print 'hello'").unwrap();
//! assert!(out.starts_with("hello"));
//! ```
//!
//! Runs are sandboxed by default: `system` is refused unless the executing
//! buffer's content hash matches the trusted stdlib hash. The embedded
//! [`STDLIB`] is registered under the import name `stdlib` automatically.

pub mod project;

use std::collections::HashMap;
use std::io::{self, Write};

pub use ros_core::{ExecError, Kind, Value};
pub use ros_vm::{stable_hash, Machine, MachineConfig};

/// The embedded trusted standard library.
pub const STDLIB: &str = include_str!("../stdlib.ros");

/// Interpreter options.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Refuse `system` from untrusted sources.
    pub sandboxed: bool,

    /// Replacement trusted stdlib text; `None` uses the embedded one.
    /// Its content hash becomes the trust anchor either way.
    pub trusted_stdlib: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            sandboxed: true,
            trusted_stdlib: None,
        }
    }
}

/// A configured interpreter: options plus an import allow-list.
///
/// Each run constructs a fresh machine, so no variable or function state
/// carries over between runs.
pub struct Interpreter {
    files: HashMap<String, String>,
    options: RunOptions,
}

impl Interpreter {
    /// An interpreter with default (sandboxed) options.
    pub fn new() -> Self {
        Self::with_options(RunOptions::default())
    }

    pub fn with_options(options: RunOptions) -> Self {
        Self {
            files: HashMap::new(),
            options,
        }
    }

    /// Register an importable file under its import name.
    ///
    /// Registering the name `stdlib` replaces the embedded stdlib text and
    /// loses its trust unless the replacement hashes to the trust anchor.
    pub fn add_file(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.files.insert(name.into(), text.into());
    }

    /// Run a script, writing program output to the given sink.
    ///
    /// Script faults are reported on the sink and end the run normally;
    /// only host write failures surface as `Err`. The sink is returned for
    /// inspection.
    pub fn run_with_output<W: Write>(&self, main_source: &str, out: W) -> io::Result<W> {
        let stdlib = self.options.trusted_stdlib.as_deref().unwrap_or(STDLIB);
        let mut files = self.files.clone();
        files
            .entry("stdlib".to_string())
            .or_insert_with(|| stdlib.to_string());
        let config = MachineConfig {
            bound: self.options.sandboxed,
            stdlib_hash: Some(stable_hash(stdlib, "")),
        };
        let mut machine = Machine::new(main_source, files, config, out);
        machine.run()?;
        Ok(machine.into_output())
    }

    /// Run a script and capture its output as a string.
    pub fn run_captured(&self, main_source: &str) -> io::Result<String> {
        let bytes = self.run_with_output(main_source, Vec::new())?;
        Ok(String::from_utf8(bytes).expect("output is valid UTF-8"))
    }

    /// Run a script on stdout.
    pub fn run(&self, main_source: &str) -> io::Result<()> {
        let stdout = io::stdout();
        self.run_with_output(main_source, stdout.lock())?;
        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot convenience: run `main_source` with the given import files,
/// writing to stdout.
pub fn run(main_source: &str, files: HashMap<String, String>, sandboxed: bool) -> io::Result<()> {
    let mut interpreter = Interpreter::with_options(RunOptions {
        sandboxed,
        trusted_stdlib: None,
    });
    for (name, text) in files {
        interpreter.add_file(name, text);
    }
    interpreter.run(main_source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(script: &str) -> String {
        Interpreter::new().run_captured(script).expect("run failed")
    }

    #[test]
    fn captures_program_output() {
        assert_eq!(capture("print 'hi'"), "hi\n\nProgram ended\n");
    }

    #[test]
    fn default_options_are_sandboxed() {
        let out = capture("system 'echo hi'");
        assert!(out.contains("permission error"), "{}", out);
    }

    #[test]
    fn stdlib_string_helpers() {
        let script = "import 'stdlib'\n\
                      call repeat 'ab' 2\n\
                      print return\n\
                      call first_char 'xyz'\n\
                      print return\n\
                      call last_char 'xyz'\n\
                      print return";
        let out = capture(script);
        assert!(out.starts_with("abab\nx\nz\n"), "{}", out);
    }

    #[test]
    fn user_files_resolve_imports() {
        let mut interpreter = Interpreter::new();
        interpreter.add_file(
            "mathlib",
            "export functions double\ndef double 1\nvar return = arg1 * 2\nendfunc",
        );
        let out = interpreter
            .run_captured("import 'mathlib'\ncall double 21\nprint return")
            .expect("run failed");
        assert!(out.starts_with("42\n"), "{}", out);
    }

    #[test]
    fn user_stdlib_override_loses_trust() {
        let mut interpreter = Interpreter::new();
        interpreter.add_file("stdlib", "export functions sh\ndef sh 1\nsystem arg1\nendfunc");
        let out = interpreter
            .run_captured("import 'stdlib'\ncall sh 'echo x'")
            .expect("run failed");
        assert!(out.contains("permission error"), "{}", out);
    }

    #[test]
    fn stdlib_exports_are_declared() {
        assert!(STDLIB.contains("export functions"));
    }

    #[cfg(unix)]
    #[test]
    fn embedded_stdlib_is_trusted() {
        let out = capture("import 'stdlib'\ncall shell 'echo trusted'\nprint return");
        assert!(out.starts_with("trusted\n"), "{}", out);
    }

    #[cfg(unix)]
    #[test]
    fn shell_ok_reports_exit_status() {
        let script = "import 'stdlib'\n\
                      call shell_ok 'true'\n\
                      print return\n\
                      call shell_ok 'false'\n\
                      print return";
        let out = capture(script);
        assert!(out.starts_with("1\n0\n"), "{}", out);
    }

    #[cfg(unix)]
    #[test]
    fn replacement_stdlib_becomes_the_trust_anchor() {
        let custom = "export functions ping\n\
                      def ping 0\n\
                      system 'echo pong'\n\
                      var return = _stdout\n\
                      endfunc";
        let interpreter = Interpreter::with_options(RunOptions {
            sandboxed: true,
            trusted_stdlib: Some(custom.to_string()),
        });
        let out = interpreter
            .run_captured("import 'stdlib'\ncall ping\nprint return")
            .expect("run failed");
        assert!(out.starts_with("pong\n"), "{}", out);
    }

    #[cfg(unix)]
    #[test]
    fn unbound_option_disables_the_sandbox() {
        let interpreter = Interpreter::with_options(RunOptions {
            sandboxed: false,
            trusted_stdlib: None,
        });
        let out = interpreter
            .run_captured("system 'echo open'\nprint _stdout")
            .expect("run failed");
        assert!(out.starts_with("open\n"), "{}", out);
    }
}
