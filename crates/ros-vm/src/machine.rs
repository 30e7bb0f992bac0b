//! The line-addressed execution engine.
//!
//! A `Machine` walks one statement at a time through the current source
//! buffer, tracking a program counter, loop stacks for `while`/`for`, a
//! call stack of `(source, line)` resume points, and the single-slot
//! `try`/`except` state. Commands either advance the counter, jump within
//! the current buffer, or jump across buffers (calls and returns).
//!
//! Script errors route through the armed `try` slot when one exists and
//! otherwise end the run with a state dump. Host I/O failures are not
//! catchable by scripts; they abort `run` with the underlying error.

use std::collections::HashMap;
use std::io::{self, Write};
use std::process::Command;
use std::thread;
use std::time::Duration;

use rand::Rng;
use ros_core::{
    format_number, strip_comment, tokenize, ExecError, ExecResult, Kind, SourceBuffer, SourceSet,
    Value,
};
use ros_eval::{eval_expr, Dispatch, EvalError, Operand};

use crate::fault::FaultReport;
use crate::loader::import_module;
use crate::ops::{normalize_index, MathOps};
use crate::registry::{find_endfunc, FuncEntry, FunctionRegistry};
use crate::scope::{resolve, Scope};
use crate::trust::stable_hash;

/// The `rnd str` alphabet: digits, letters, punctuation, and whitespace.
const PRINTABLE: &str = "0123456789abcdefghijklmnopqrstuvwxyz\
                         ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                         !\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~ \t\n\r\x0B\x0C";

const VALID_COMMANDS: &str = "print flush rnd var list for while if def return endfunc call \
                              convert export import end delay error system try except done";

/// What a statement asks the engine to do next.
enum Flow {
    Advance,
    Goto(usize),
    Jump { source: String, line: usize },
    Return,
    Halt,
}

/// The armed `try` slot.
///
/// `source` and `depth` pin where the handler lives so a fault raised deep
/// in a call chain lands back in the arming buffer with the intervening
/// frames discarded.
struct TryState {
    except_line: usize,
    source: String,
    depth: usize,
    message: Option<String>,
}

/// Engine construction options.
pub struct MachineConfig {
    /// Sandboxed interpreters refuse `system` from untrusted buffers.
    pub bound: bool,
    /// Content hash that marks a buffer as the trusted stdlib.
    pub stdlib_hash: Option<String>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            bound: true,
            stdlib_hash: None,
        }
    }
}

/// A statement failure: either a script-level error (routable to `try`)
/// or a host write failure (never script-visible).
enum StepError {
    Exec(ExecError),
    Io(io::Error),
}

impl From<ExecError> for StepError {
    fn from(err: ExecError) -> Self {
        StepError::Exec(err)
    }
}

impl From<io::Error> for StepError {
    fn from(err: io::Error) -> Self {
        StepError::Io(err)
    }
}

/// The interpreter state machine, generic over its output sink.
pub struct Machine<W> {
    out: W,
    bound: bool,
    stdlib_hash: Option<String>,
    /// Importable file contents, keyed by import name.
    files: HashMap<String, String>,
    sources: SourceSet,
    registry: FunctionRegistry,
    scope: Scope,
    call_stack: Vec<(String, usize)>,
    while_stack: Vec<usize>,
    for_stack: Vec<usize>,
    try_slot: Option<TryState>,
    source: String,
    pc: usize,
}

impl<W: Write> Machine<W> {
    /// Build a machine over the main program text.
    ///
    /// `files` is the allow-list of importable content. The main buffer
    /// itself earns the trusted flag when its hash matches the configured
    /// stdlib hash.
    pub fn new(main_text: &str, files: HashMap<String, String>, config: MachineConfig, out: W) -> Self {
        let trusted = match &config.stdlib_hash {
            Some(hash) => stable_hash(main_text, "") == *hash,
            None => false,
        };
        let mut sources = SourceSet::new();
        sources.insert(SourceBuffer::new("main", main_text, trusted));
        Self {
            out,
            bound: config.bound,
            stdlib_hash: config.stdlib_hash,
            files,
            sources,
            registry: FunctionRegistry::new(),
            scope: Scope::new(),
            call_stack: Vec::new(),
            while_stack: Vec::new(),
            for_stack: Vec::new(),
            try_slot: None,
            source: "main".to_string(),
            pc: 0,
        }
    }

    /// The variable scope, for inspection after a run.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Reclaim the output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Execute until the program ends, halts, or dies.
    ///
    /// Script faults are reported on the output sink and leave the machine
    /// state frozen for inspection; only host I/O failures become `Err`.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            let line = match self.sources.line(&self.source, self.pc) {
                Some(text) => text.to_string(),
                // Running off the end of a buffer is an implicit return;
                // the run ends once no caller remains.
                None => match self.call_stack.pop() {
                    Some((source, line)) => {
                        self.source = source;
                        self.pc = line;
                        continue;
                    }
                    None => break,
                },
            };
            let tokens = tokenize(&line);
            let cmd = match tokens.first().copied() {
                Some(cmd) => cmd,
                None => {
                    self.pc += 1;
                    continue;
                }
            };
            self.scope.line = self.pc;
            self.scope.source = self.source.clone();

            match self.step(&line, cmd, &tokens[1..]) {
                Ok(Flow::Advance) => self.pc += 1,
                Ok(Flow::Goto(next)) => self.pc = next,
                Ok(Flow::Jump { source, line }) => {
                    self.source = source;
                    self.pc = line;
                }
                Ok(Flow::Return) => match self.call_stack.pop() {
                    Some((source, line)) => {
                        self.source = source;
                        self.pc = line;
                    }
                    None => self.pc += 1,
                },
                Ok(Flow::Halt) => break,
                Err(StepError::Io(err)) => return Err(err),
                Err(StepError::Exec(err)) => {
                    if let Some(slot) = self.try_slot.as_mut() {
                        // Land on the except line of the arming buffer with
                        // the frames opened since then discarded. The slot
                        // stays armed; `except` consumes it.
                        slot.message = Some(err.to_string());
                        let next = slot.except_line;
                        let source = slot.source.clone();
                        let depth = slot.depth;
                        self.pc = next;
                        self.source = source;
                        self.call_stack.truncate(depth);
                    } else {
                        self.write_fault(&err)?;
                        break;
                    }
                }
            }
        }
        writeln!(self.out, "\nProgram ended")?;
        self.out.flush()
    }

    fn step(&mut self, line: &str, cmd: &str, args: &[&str]) -> Result<Flow, StepError> {
        match cmd {
            "print" => {
                let text = self.join_args(args)?;
                writeln!(self.out, "{}", text.trim())?;
                Ok(Flow::Advance)
            }

            "flush" => {
                let text = self.join_args(args)?;
                write!(self.out, "{}\r", text.trim())?;
                self.out.flush()?;
                Ok(Flow::Advance)
            }

            "rnd" => self.step_rnd(args),

            "var" => {
                let equation = strip_comment(line).trim();
                let equation = equation.strip_prefix("var").unwrap_or(equation).trim();
                if equation.matches('=').count() > 1 {
                    return Err(self
                        .scope
                        .syntax(format!("equation {} has more than one =", equation))
                        .into());
                }
                let (name, expression) = match equation.split_once('=') {
                    Some(pair) => pair,
                    None => {
                        return Err(self
                            .scope
                            .syntax(format!("equation {} has no =", equation))
                            .into())
                    }
                };
                let name = name.trim();
                if name.is_empty() {
                    return Err(self
                        .scope
                        .syntax(format!("equation {} has no variable name", equation))
                        .into());
                }
                let value = self.eval(expression.trim())?;
                self.scope.set(name, value);
                Ok(Flow::Advance)
            }

            "list" => self.step_list(args),

            "for" => self.step_for(line, args),

            "while" => {
                let sub = self.arg(args, 0, "while needs begin or end")?;
                match sub {
                    "begin" => {
                        self.while_stack.push(self.pc);
                        Ok(Flow::Advance)
                    }
                    "end" => {
                        let begin = match self.while_stack.last() {
                            Some(&idx) => idx,
                            None => {
                                return Err(self
                                    .scope
                                    .syntax("Unexpected while end with no matching begin")
                                    .into())
                            }
                        };
                        let cond = self.arg(args, 1, "while end needs a condition value")?;
                        let (value, _) = self.resolve_token(cond)?;
                        self.while_stack.pop();
                        if value.is_truthy() {
                            // Re-run the begin line so it re-arms the stack.
                            Ok(Flow::Goto(begin))
                        } else {
                            Ok(Flow::Advance)
                        }
                    }
                    other => Err(self
                        .scope
                        .syntax(format!("while {} is not valid; expected begin or end", other))
                        .into()),
                }
            }

            "if" => {
                let sub = self.arg(args, 0, "if needs begin or end")?;
                match sub {
                    "begin" => {
                        let cond = self.arg(args, 1, "if begin needs a condition value")?;
                        let (value, _) = self.resolve_token(cond)?;
                        if value.is_truthy() {
                            Ok(Flow::Advance)
                        } else {
                            let end = self.find_block_end("if", self.pc)?;
                            Ok(Flow::Goto(end + 1))
                        }
                    }
                    "end" => Ok(Flow::Advance),
                    other => Err(self
                        .scope
                        .syntax(format!("if {} is not valid; expected begin or end", other))
                        .into()),
                }
            }

            "def" => {
                let name = self.arg(args, 0, "def needs a function name and an arity")?;
                if !is_identifier(name) {
                    return Err(self.scope.name_error("Invalid function name").into());
                }
                let arity_token = self.arg(args, 1, "def needs a literal arity")?;
                let (arity_value, arity_kind) = self.resolve_token(arity_token)?;
                let arity = match (arity_value, arity_kind) {
                    (Value::Number(n), Kind::LiteralNumber)
                        if n.is_finite() && n.fract() == 0.0 && n >= 0.0 =>
                    {
                        n as usize
                    }
                    _ => return Err(self.scope.syntax("invalid function syntax").into()),
                };
                let end = find_endfunc(self.current_buffer()?, self.pc).ok_or_else(|| {
                    self.scope
                        .syntax(format!("Function {} has no endfunc statement", name))
                })?;
                self.registry.define(
                    &self.source,
                    name,
                    FuncEntry {
                        start: self.pc + 1,
                        arity,
                        end,
                    },
                );
                Ok(Flow::Goto(end + 1))
            }

            "return" => {
                let rest = strip_comment(line).trim();
                let rest = rest.strip_prefix("return").unwrap_or(rest).trim();
                let value = if rest.is_empty() {
                    Value::Number(0.0)
                } else {
                    self.eval(rest)?
                };
                self.scope.set("return", value);
                Ok(Flow::Return)
            }

            "endfunc" => Ok(Flow::Return),

            "call" => {
                let name = self.arg(args, 0, "call needs a function name")?;
                self.invoke(name, &args[1..])
            }

            "convert" => {
                let src_token = self.arg(args, 0, "convert needs a source value and a target")?;
                let dst_token = self.arg(args, 1, "convert needs a target variable")?;
                let (src_value, _) = self.resolve_token(src_token)?;
                let (_, dst_kind) = self.resolve_token(dst_token)?;
                if !matches!(dst_kind, Kind::VarNumber | Kind::VarString) {
                    return Err(self
                        .scope
                        .type_error(
                            "target variable not found or is not a convertable type of \
                             [number -> string, string -> number]",
                        )
                        .into());
                }
                match src_value {
                    Value::Number(n) => self.scope.set(dst_token, Value::Str(format_number(n))),
                    Value::Str(s) => {
                        let n: f64 = s.trim().parse().map_err(|_| {
                            self.scope
                                .type_error("wrong format string to convert to a number")
                        })?;
                        self.scope.set(dst_token, Value::Number(n));
                    }
                    _ => {
                        return Err(self
                            .scope
                            .type_error("convert source must be a number or a string")
                            .into())
                    }
                }
                Ok(Flow::Advance)
            }

            // Export lists only matter while a buffer is being imported.
            "export" => Ok(Flow::Advance),

            "import" => {
                let name_token = self.arg(args, 0, "import needs a module name")?;
                let (value, _) = self.resolve_token(name_token)?;
                let name = match value {
                    Value::Str(s) => s,
                    _ => {
                        return Err(self
                            .scope
                            .type_error("import names can only be strings")
                            .into())
                    }
                };
                let text = match self.files.get(&name) {
                    Some(text) => text.clone(),
                    None => {
                        return Err(ExecError::FileNotFound {
                            name,
                            line: self.scope.line,
                            source: self.scope.source.clone(),
                        }
                        .into())
                    }
                };
                let trusted = match &self.stdlib_hash {
                    Some(hash) => stable_hash(&text, "") == *hash,
                    None => false,
                };
                import_module(&name, &text, trusted, &mut self.sources, &mut self.registry)?;
                Ok(Flow::Advance)
            }

            "end" => Ok(Flow::Halt),

            "delay" => {
                let token = self.arg(args, 0, "delay needs a length in seconds")?;
                let (value, _) = self.resolve_token(token)?;
                let seconds = match value {
                    Value::Number(n) => n,
                    _ => {
                        return Err(self
                            .scope
                            .type_error("delay value can only be a number")
                            .into())
                    }
                };
                let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
                    self.scope.runtime("delay length must be a non-negative number")
                })?;
                thread::sleep(duration);
                Ok(Flow::Advance)
            }

            "error" => {
                let token = self.arg(args, 0, "error needs a message string")?;
                let (value, _) = self.resolve_token(token)?;
                match value {
                    Value::Str(message) => Err(ExecError::Script(message).into()),
                    _ => Err(self
                        .scope
                        .type_error("error value can only be a string")
                        .into()),
                }
            }

            "system" => {
                let trusted = self.current_buffer()?.is_trusted();
                if self.bound && !trusted {
                    return Err(ExecError::Permission {
                        line: self.scope.line,
                        source: self.scope.source.clone(),
                    }
                    .into());
                }
                let token = self.arg(args, 0, "system needs a command string")?;
                let (value, _) = self.resolve_token(token)?;
                let command = match value {
                    Value::Str(s) => s,
                    _ => {
                        return Err(self
                            .scope
                            .type_error("system commands can only be strings")
                            .into())
                    }
                };
                let output = shell_command(&command)
                    .output()
                    .map_err(|e| self.scope.runtime(format!("system command failed: {}", e)))?;
                let code = output.status.code().unwrap_or(-1);
                let raw = if code != 0 { output.stderr } else { output.stdout };
                self.scope
                    .set("_stdout", Value::Str(String::from_utf8_lossy(&raw).into_owned()));
                self.scope.set("return", Value::Number(code as f64));
                Ok(Flow::Advance)
            }

            "try" => {
                let except_line = match self.find_leading("except", self.pc + 1)? {
                    Some(idx) => idx,
                    None => return Err(self.scope.syntax("try has no matching except").into()),
                };
                // Arming while already armed re-targets the slot.
                self.try_slot = Some(TryState {
                    except_line,
                    source: self.source.clone(),
                    depth: self.call_stack.len(),
                    message: None,
                });
                Ok(Flow::Advance)
            }

            "except" => {
                let slot = match self.try_slot.take() {
                    Some(slot) => slot,
                    None => {
                        return Err(self
                            .scope
                            .syntax("stray except found with no parent try")
                            .into())
                    }
                };
                match slot.message {
                    Some(message) => {
                        self.scope.set("Error", Value::Str(message));
                        Ok(Flow::Advance)
                    }
                    None => {
                        // Protected block finished cleanly; skip the handler.
                        let done = match self.find_leading("done", self.pc + 1)? {
                            Some(idx) => idx,
                            None => {
                                return Err(self
                                    .scope
                                    .syntax("except has no closing done")
                                    .into())
                            }
                        };
                        Ok(Flow::Goto(done + 1))
                    }
                }
            }

            "done" => Ok(Flow::Advance),

            other => {
                if self.registry.find(other).is_some() {
                    self.invoke(other, args)
                } else {
                    Err(self
                        .scope
                        .syntax(format!(
                            "Root cmd : {} is not a valid cmd; valid cmds are: {}, \
                             or a defined function name",
                            other, VALID_COMMANDS
                        ))
                        .into())
                }
            }
        }
    }

    fn step_rnd(&mut self, args: &[&str]) -> Result<Flow, StepError> {
        let sub = self.arg(args, 0, "rnd needs a mode: int or str")?;
        match sub {
            "int" => {
                let target = self.arg(args, 1, "rnd int needs a target variable")?;
                let origin = self.arg(args, 2, "rnd int needs an origin value")?;
                let stop = self.arg(args, 3, "rnd int needs a stop value")?;
                let (_, target_kind) = self.resolve_token(target)?;
                if !matches!(target_kind, Kind::VarNumber | Kind::VarString) {
                    return Err(self
                        .scope
                        .name_error("Can not assign a random int value to a literal")
                        .into());
                }
                let lo = self.number_arg(origin, "origin and stop have to be numbers for a random int generation")?;
                let hi = self.number_arg(stop, "origin and stop have to be numbers for a random int generation")?;
                if lo.fract() != 0.0 || hi.fract() != 0.0 || !lo.is_finite() || !hi.is_finite() {
                    return Err(self
                        .scope
                        .type_error("origin and stop have to be whole numbers for a random int generation")
                        .into());
                }
                let (lo, hi) = (lo as i64, hi as i64);
                if lo > hi {
                    return Err(self
                        .scope
                        .runtime("empty range for random int generation")
                        .into());
                }
                let value = rand::thread_rng().gen_range(lo..=hi);
                self.scope.set(target, Value::Number(value as f64));
                Ok(Flow::Advance)
            }
            "str" => {
                let target = self.arg(args, 1, "rnd str needs a target variable")?;
                let length = self.arg(args, 2, "rnd str needs a length value")?;
                let (_, target_kind) = self.resolve_token(target)?;
                if !matches!(target_kind, Kind::VarNumber | Kind::VarString) {
                    return Err(self
                        .scope
                        .name_error("Can not assign a random string value to a literal")
                        .into());
                }
                let n = self.number_arg(length, "length has to be a number for a random str generation")?;
                if n.fract() != 0.0 || !n.is_finite() {
                    return Err(self
                        .scope
                        .type_error("length has to be a whole number for a random str generation")
                        .into());
                }
                let count = if n < 0.0 { 0 } else { n as usize };
                let mut rng = rand::thread_rng();
                let bytes = PRINTABLE.as_bytes();
                let mut text = String::with_capacity(count);
                for _ in 0..count {
                    text.push(bytes[rng.gen_range(0..bytes.len())] as char);
                }
                self.scope.set(target, Value::Str(text));
                Ok(Flow::Advance)
            }
            other => Err(self
                .scope
                .syntax(format!("rnd {} is not a valid rnd mode; valid modes are: int str", other))
                .into()),
        }
    }

    fn step_list(&mut self, args: &[&str]) -> Result<Flow, StepError> {
        let sub = self.arg(args, 0, "list needs an operation: set append extend pop call")?;
        match sub {
            "set" => {
                if args.len() != 5 || !args[3].eq_ignore_ascii_case("to") {
                    return Err(self.scope.syntax("list set syntax error").into());
                }
                let name = args[1];
                let (_, kind) = self.resolve_token(name)?;
                if kind != Kind::VarList {
                    return Err(self
                        .scope
                        .name_error("Can not set a value to a literal")
                        .into());
                }
                let position =
                    self.number_arg(args[2], "list set index has to be a number for a list set")?;
                let (value, _) = self.resolve_token(args[4])?;
                let len = self.list_len(name);
                let idx = normalize_index(position, len, "list", &self.scope)?;
                if let Some(items) = self.scope.get_list_mut(name) {
                    items[idx] = value;
                }
                Ok(Flow::Advance)
            }
            "append" => {
                let name = self.arg(args, 1, "list append needs a list and a value")?;
                let value_token = self.arg(args, 2, "list append needs a value")?;
                let (_, kind) = self.resolve_token(name)?;
                if kind != Kind::VarList {
                    return Err(self
                        .scope
                        .name_error("Can not append a value to a literal")
                        .into());
                }
                let (value, _) = self.resolve_token(value_token)?;
                if let Some(items) = self.scope.get_list_mut(name) {
                    items.push(value);
                }
                Ok(Flow::Advance)
            }
            "extend" => {
                let name = self.arg(args, 1, "list extend needs two lists")?;
                let value_token = self.arg(args, 2, "list extend needs a source list")?;
                let (_, kind) = self.resolve_token(name)?;
                if kind != Kind::VarList {
                    return Err(self.scope.name_error("Can not extend a literal").into());
                }
                let (value, _) = self.resolve_token(value_token)?;
                let mut new_items = match value {
                    Value::List(items) => items,
                    _ => {
                        return Err(self
                            .scope
                            .name_error("Can not extend a list with a non-list value")
                            .into())
                    }
                };
                if let Some(items) = self.scope.get_list_mut(name) {
                    items.append(&mut new_items);
                }
                Ok(Flow::Advance)
            }
            "pop" => {
                let name = self.arg(args, 1, "list pop needs a list and an index")?;
                let idx_token = self.arg(args, 2, "list pop needs an index")?;
                let (_, kind) = self.resolve_token(name)?;
                if kind != Kind::VarList {
                    return Err(self
                        .scope
                        .name_error("Can not pop a value from a literal")
                        .into());
                }
                let position =
                    self.number_arg(idx_token, "pop index has to be a number for a list pop")?;
                if position.fract() != 0.0 || !position.is_finite() {
                    return Err(self
                        .scope
                        .type_error("pop index has to be a number for a list pop")
                        .into());
                }
                let len = self.list_len(name);
                // Unlike indexing, pop does not count from the end.
                if position < 0.0 || position as usize >= len {
                    return Err(self.scope.index_error("pop index out of range").into());
                }
                let idx = position as usize;
                if let Some(items) = self.scope.get_list_mut(name) {
                    let popped = items.remove(idx);
                    self.scope.set("return", popped);
                }
                Ok(Flow::Advance)
            }
            "call" => {
                let dotted = self.arg(args, 1, "list call needs <list>.<function>")?;
                if dotted.matches('.').count() != 1 {
                    return Err(self
                        .scope
                        .syntax("list call target has more than one '.'")
                        .into());
                }
                let (list_name, func_name) = match dotted.split_once('.') {
                    Some(pair) => pair,
                    None => {
                        return Err(self
                            .scope
                            .syntax("list call needs <list>.<function>")
                            .into())
                    }
                };
                let (list_value, kind) = self.resolve_token(list_name)?;
                if !kind.is_list() {
                    return Err(self
                        .scope
                        .name_error("Can not call a function from a literal")
                        .into());
                }
                let mut found: Option<(String, String)> = None;
                if let Value::List(items) = &list_value {
                    for item in items {
                        if let Value::FuncRef { source, name } = item {
                            if name == func_name {
                                found = Some((source.clone(), name.clone()));
                                break;
                            }
                        }
                    }
                }
                let not_found = || {
                    self.scope.name_error(format!(
                        "Function {} not found in list {}",
                        func_name, list_name
                    ))
                };
                let (src, fname) = found.ok_or_else(not_found)?;
                let entry = self.registry.get(&src, &fname).ok_or_else(not_found)?;
                let call_args = &args[2..];
                if call_args.len() != entry.arity {
                    return Err(self
                        .scope
                        .syntax(format!(
                            "Function {} expects {} arguments, got {}",
                            fname,
                            entry.arity,
                            call_args.len()
                        ))
                        .into());
                }
                self.bind_args(call_args)?;
                self.call_stack.push((self.source.clone(), self.pc + 1));
                Ok(Flow::Jump {
                    source: src,
                    line: entry.start,
                })
            }
            other => Err(self
                .scope
                .syntax(format!(
                    "list {} is not a valid list operation; valid operations are: set append extend pop call",
                    other
                ))
                .into()),
        }
    }

    fn step_for(&mut self, line: &str, args: &[&str]) -> Result<Flow, StepError> {
        let sub = self.arg(args, 0, "for needs begin or end")?;
        match sub {
            "begin" => {
                let header = self.parse_for_header(line)?;
                let init = self.eval(header.init)?;
                self.scope.set(header.var, init);
                if self.eval(header.cond)?.is_truthy() {
                    self.for_stack.push(self.pc);
                    Ok(Flow::Advance)
                } else {
                    // Zero iterations: nothing pushed, jump past the end.
                    let end = self.find_block_end("for", self.pc)?;
                    Ok(Flow::Goto(end + 1))
                }
            }
            "end" => {
                let begin = match self.for_stack.last() {
                    Some(&idx) => idx,
                    None => {
                        return Err(self
                            .scope
                            .syntax("Unexpected 'for end' with no matching 'for begin'")
                            .into())
                    }
                };
                let begin_line = match self.current_buffer()?.line(begin) {
                    Some(text) => text.to_string(),
                    None => {
                        return Err(self
                            .scope
                            .runtime("for begin line is out of range")
                            .into())
                    }
                };
                let header = self.parse_for_header(&begin_line)?;
                let delta = self.eval(header.delta)?;
                let current = match self.scope.get(header.var) {
                    Some(value) => value.clone(),
                    None => return Err(self.scope.unresolved(header.var).into()),
                };
                // `+` semantics, so string counters concatenate.
                let mut ops = MathOps::new(&self.scope, &self.registry);
                let next = ops.binary(Operand::Value(current), "+", Operand::Value(delta))?;
                self.scope.set(header.var, next);
                if self.eval(header.cond)?.is_truthy() {
                    Ok(Flow::Goto(begin + 1))
                } else {
                    self.for_stack.pop();
                    Ok(Flow::Advance)
                }
            }
            other => Err(self
                .scope
                .syntax(format!("for {} is not valid; expected begin or end", other))
                .into()),
        }
    }

    /// Transfer control into a function found by bare-name search.
    fn invoke(&mut self, name: &str, call_args: &[&str]) -> Result<Flow, StepError> {
        let (source, entry) = match self.registry.find(name) {
            Some((source, entry)) => (source.to_string(), entry),
            None => {
                return Err(ExecError::UnknownFunction {
                    name: name.to_string(),
                    line: self.scope.line,
                    source: self.scope.source.clone(),
                }
                .into())
            }
        };
        if call_args.len() != entry.arity {
            return Err(self
                .scope
                .syntax(format!(
                    "Function {} expects {} arguments, got {}",
                    name,
                    entry.arity,
                    call_args.len()
                ))
                .into());
        }
        self.bind_args(call_args)?;
        self.call_stack.push((self.source.clone(), self.pc + 1));
        Ok(Flow::Jump {
            source,
            line: entry.start,
        })
    }

    /// Bind `arg1..argN`, resolving in order so later arguments can see
    /// the bindings made by earlier ones.
    fn bind_args(&mut self, call_args: &[&str]) -> Result<(), StepError> {
        for (i, arg) in call_args.iter().enumerate() {
            let (value, _) = self.resolve_token(arg)?;
            self.scope.set(format!("arg{}", i + 1), value);
        }
        Ok(())
    }

    fn join_args(&self, args: &[&str]) -> ExecResult<String> {
        let mut text = String::new();
        for token in args {
            let (value, _) = self.resolve_token(token)?;
            text.push_str(&value.to_string());
        }
        Ok(text)
    }

    fn resolve_token(&self, token: &str) -> ExecResult<(Value, Kind)> {
        resolve(token, &self.scope, &self.registry)
    }

    /// Evaluate an expression against the live scope, locating any syntax
    /// error at the current statement.
    fn eval(&self, expr: &str) -> ExecResult<Value> {
        let mut ops = MathOps::new(&self.scope, &self.registry);
        eval_expr(expr, &mut ops).map_err(|err| match err {
            EvalError::Syntax(message) => self.scope.syntax(message),
            EvalError::Dispatch(err) => err,
        })
    }

    fn arg<'t>(&self, args: &[&'t str], index: usize, usage: &str) -> ExecResult<&'t str> {
        args.get(index)
            .copied()
            .ok_or_else(|| self.scope.syntax(usage))
    }

    /// Resolve a token that must be number-classed.
    fn number_arg(&self, token: &str, message: &str) -> ExecResult<f64> {
        match self.resolve_token(token)?.0 {
            Value::Number(n) => Ok(n),
            _ => Err(self.scope.type_error(message)),
        }
    }

    fn list_len(&self, name: &str) -> usize {
        self.scope
            .get(name)
            .and_then(Value::as_list)
            .map(|items| items.len())
            .unwrap_or(0)
    }

    fn current_buffer(&self) -> ExecResult<&SourceBuffer> {
        self.sources
            .get(&self.source)
            .ok_or_else(|| self.scope.runtime(format!("source {} is not loaded", self.source)))
    }

    /// Find the matching `<keyword> end` for a `<keyword> begin` at
    /// `begin`, skipping nested blocks of the same keyword.
    fn find_block_end(&self, keyword: &str, begin: usize) -> ExecResult<usize> {
        let buffer = self.current_buffer()?;
        let mut depth = 1usize;
        let mut j = begin + 1;
        while let Some(line) = buffer.line(j) {
            let tokens = tokenize(line);
            if tokens.first().copied() == Some(keyword) {
                match tokens.get(1).copied() {
                    Some("begin") => depth += 1,
                    Some("end") => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(j);
                        }
                    }
                    _ => {}
                }
            }
            j += 1;
        }
        Err(self
            .scope
            .syntax(format!("{} begin has no matching {} end", keyword, keyword)))
    }

    /// First line at or after `from` whose leading token is `keyword`.
    fn find_leading(&self, keyword: &str, from: usize) -> ExecResult<Option<usize>> {
        let buffer = self.current_buffer()?;
        let mut j = from;
        while let Some(line) = buffer.line(j) {
            if tokenize(line).first().copied() == Some(keyword) {
                return Ok(Some(j));
            }
            j += 1;
        }
        Ok(None)
    }

    fn parse_for_header<'t>(&self, line: &'t str) -> ExecResult<ForHeader<'t>> {
        let stripped = strip_comment(line);
        if stripped.matches(':').count() != 1 {
            return Err(self.scope.syntax("for loop header needs exactly one ':'"));
        }
        let data = match stripped.split_once(':') {
            Some((_, rest)) => rest,
            None => return Err(self.scope.syntax("for loop header needs exactly one ':'")),
        };
        let parts: Vec<&str> = data.split(';').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(self
                .scope
                .syntax("for loop header needs 'var; start; condition; delta'"));
        }
        Ok(ForHeader {
            var: parts[0],
            init: parts[1],
            cond: parts[2],
            delta: parts[3],
        })
    }

    fn write_fault(&mut self, error: &ExecError) -> io::Result<()> {
        let hash = self
            .sources
            .get(&self.source)
            .map(|buffer| stable_hash(buffer.raw(), ""))
            .unwrap_or_default();
        let report = FaultReport {
            error,
            scope: &self.scope,
            registry: &self.registry,
            source_keys: self.sources.iter().map(|b| b.key()).collect(),
            source: &self.source,
            pc: self.pc,
            hash,
        };
        report.render(&mut self.out)
    }
}

/// The pieces of a `for begin : var; start; condition; delta` header.
struct ForHeader<'a> {
    var: &'a str,
    init: &'a str,
    cond: &'a str,
    delta: &'a str,
}

fn is_identifier(token: &str) -> bool {
    let mut bytes = token.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut shell = Command::new("sh");
    shell.arg("-c").arg(command);
    shell
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut shell = Command::new("cmd");
    shell.args(["/C", command]);
    shell
}
