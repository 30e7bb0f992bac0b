//! ROS command-line interpreter.
//!
//! Usage:
//!   ros <file.ros>              Run a script
//!   ros <file.ros> --unbound    Run with the system sandbox disabled

use std::{
    env, fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use ros::project::{collect_modules, Manifest, ModulesSection};
use ros::{Interpreter, RunOptions};

const USAGE: &str = "\
Usage: ros [OPTIONS] <FILE>

Arguments:
  <FILE>  ROS script to run

Options:
  --unbound        Allow `system` from untrusted sources
  --stdlib <FILE>  Replace the embedded trusted stdlib
  --modules <DIR>  Directory of importable modules (default: the script's directory)
  -h, --help       Print this help message
  -V, --version    Print the version";

struct Options {
    script: PathBuf,
    unbound: bool,
    stdlib: Option<PathBuf>,
    modules: Option<PathBuf>,
}

enum Action {
    Run(Options),
    Help,
    Version,
}

fn parse_args() -> Result<Action, String> {
    let mut args = env::args().skip(1);
    let mut script = None;
    let mut unbound = false;
    let mut stdlib = None;
    let mut modules = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Action::Help),
            "-V" | "--version" => return Ok(Action::Version),
            "--unbound" => unbound = true,
            "--stdlib" => {
                let path = args.next().ok_or("--stdlib needs a file argument")?;
                stdlib = Some(PathBuf::from(path));
            }
            "--modules" => {
                let path = args.next().ok_or("--modules needs a directory argument")?;
                modules = Some(PathBuf::from(path));
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown option '{other}'\n\n{USAGE}"));
            }
            other => {
                if script.is_some() {
                    return Err(format!("unexpected argument '{other}'\n\n{USAGE}"));
                }
                script = Some(PathBuf::from(other));
            }
        }
    }

    match script {
        Some(script) => Ok(Action::Run(Options {
            script,
            unbound,
            stdlib,
            modules,
        })),
        None => Err(USAGE.to_string()),
    }
}

/// The directory imports are collected from.
fn module_dir(options: &Options) -> PathBuf {
    match &options.modules {
        Some(dir) => dir.clone(),
        None => {
            let parent = options.script.parent().unwrap_or_else(|| Path::new("."));
            if parent.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                parent.to_owned()
            }
        }
    }
}

fn run(options: Options) -> Result<(), String> {
    let source = fs::read_to_string(&options.script)
        .map_err(|e| format!("error reading {}: {e}", options.script.display()))?;

    let dir = module_dir(&options);
    let manifest_path = dir.join("ros.toml");
    let modules = if manifest_path.is_file() {
        Manifest::from_file(&manifest_path)
            .map_err(|e| e.to_string())?
            .modules
    } else {
        ModulesSection::default()
    };
    let files =
        collect_modules(&dir, &modules.include, &modules.exclude).map_err(|e| e.to_string())?;

    let trusted_stdlib = match &options.stdlib {
        Some(path) => Some(
            fs::read_to_string(path)
                .map_err(|e| format!("error reading {}: {e}", path.display()))?,
        ),
        None => None,
    };

    let mut interpreter = Interpreter::with_options(RunOptions {
        sandboxed: !options.unbound,
        trusted_stdlib,
    });
    for (name, text) in files {
        interpreter.add_file(name, text);
    }
    interpreter
        .run(&source)
        .map_err(|e| format!("output error: {e}"))
}

fn main() -> ExitCode {
    match parse_args() {
        Ok(Action::Help) => {
            println!("{USAGE}");
            ExitCode::SUCCESS
        }
        Ok(Action::Version) => {
            println!("ros {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Ok(Action::Run(options)) => match run(options) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e}");
                ExitCode::from(2)
            }
        },
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(2)
        }
    }
}
