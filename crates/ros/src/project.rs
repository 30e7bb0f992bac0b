//! Project manifest (ros.toml) parsing and module collection.
//!
//! A project directory holds importable `.ros` files and an optional
//! `ros.toml` manifest narrowing which files count as modules. Collection
//! turns the directory into the name-to-text map an [`crate::Interpreter`]
//! feeds its import allow-list from, keyed by file stem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

/// Errors from manifest parsing or module collection.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("missing required field '{field}' in {path}")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to walk directory {path}: {source}")]
    WalkDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("module name '{name}' is provided by both {first} and {second}")]
    DuplicateModule {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// A parsed project manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Project metadata.
    pub project: ProjectSection,

    /// Module collection configuration.
    #[serde(default)]
    pub modules: ModulesSection,
}

/// The `[project]` section of the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    /// Project name (required).
    pub name: String,

    /// Entry point script name, without the .ros extension (required).
    pub main: String,

    /// Project version (optional).
    #[serde(default)]
    pub version: Option<String>,
}

/// The `[modules]` section of the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ModulesSection {
    /// Glob patterns for files to include (default: `["**/*.ros"]`).
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Glob patterns for files to exclude (default: `[]`).
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_include() -> Vec<String> {
    vec!["**/*.ros".to_string()]
}

impl Default for ModulesSection {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: Vec::new(),
        }
    }
}

impl Manifest {
    /// Load a manifest from a file path.
    pub fn from_file(path: &Path) -> Result<Self, ProjectError> {
        let content = std::fs::read_to_string(path).map_err(|e| ProjectError::Io {
            path: path.to_owned(),
            source: e,
        })?;

        Self::from_str(&content, path)
    }

    /// Parse a manifest from a string.
    pub fn from_str(content: &str, path: &Path) -> Result<Self, ProjectError> {
        let manifest: Manifest = toml::from_str(content).map_err(|e| ProjectError::Parse {
            path: path.to_owned(),
            source: e,
        })?;

        manifest.validate(path)?;
        Ok(manifest)
    }

    fn validate(&self, path: &Path) -> Result<(), ProjectError> {
        if self.project.name.is_empty() {
            return Err(ProjectError::MissingField {
                path: path.to_owned(),
                field: "project.name",
            });
        }
        if self.project.main.is_empty() {
            return Err(ProjectError::MissingField {
                path: path.to_owned(),
                field: "project.main",
            });
        }
        Ok(())
    }
}

/// Collect module files under `dir` into an import map keyed by file stem.
///
/// `ros.toml` is always skipped. Two files reducing to the same stem are
/// an error rather than a silent override, since import names carry no
/// directory part.
pub fn collect_modules(
    dir: &Path,
    include: &[String],
    exclude: &[String],
) -> Result<HashMap<String, String>, ProjectError> {
    let include_patterns = compile_patterns(include)?;
    let exclude_patterns = compile_patterns(exclude)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| ProjectError::WalkDir {
            path: dir.to_owned(),
            source: e,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let rel = match entry.path().strip_prefix(dir) {
            Ok(rel) => rel,
            Err(_) => continue,
        };

        // Forward slashes so glob patterns behave the same on all platforms.
        let rel_str = rel.to_string_lossy().replace('\\', "/");

        if rel_str == "ros.toml" {
            continue;
        }
        if !include_patterns.iter().any(|p| p.matches(&rel_str)) {
            continue;
        }
        if exclude_patterns.iter().any(|p| p.matches(&rel_str)) {
            continue;
        }

        paths.push(entry.path().to_owned());
    }

    // Deterministic collection order.
    paths.sort();

    let mut modules = HashMap::new();
    let mut origins: HashMap<String, PathBuf> = HashMap::new();
    for path in paths {
        let name = match path.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => continue,
        };
        if let Some(first) = origins.get(&name) {
            return Err(ProjectError::DuplicateModule {
                name,
                first: first.clone(),
                second: path,
            });
        }
        let text = std::fs::read_to_string(&path).map_err(|e| ProjectError::Io {
            path: path.clone(),
            source: e,
        })?;
        origins.insert(name.clone(), path);
        modules.insert(name, text);
    }

    Ok(modules)
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, ProjectError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| ProjectError::Pattern {
                pattern: p.clone(),
                source: e,
            })
        })
        .collect()
}
