//! # Evaluator Boundary
//!
//! The harness never interprets the configuration language itself. It talks
//! to an [`Evaluator`] through the operations declared here:
//!
//! - evaluate a file or an in-memory snippet into a [`Value`],
//! - enumerate the static imports of a file,
//! - register callable extensions invoked from inside evaluated code,
//! - expose the syntax tree and import resolution rules ([`ImportGraph`]) so
//!   the dependency walker can run over any dialect.
//!
//! Evaluators are stateful and not reentrant; all calls are sequential.
//!
//! [`DocumentEvaluator`] is the reference implementation shipped with the
//! crate.

use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;

pub mod document;
pub mod natives;

pub use document::DocumentEvaluator;

// ============================================================================
// ERRORS
// ============================================================================

/// Failures raised by an evaluator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("{file}: unable to parse: {message}")]
    Parse { file: String, message: String },

    #[error("unable to read {file}: {reason}")]
    Read { file: String, reason: String },

    #[error("{importer}: unable to import '{target}': {reason}")]
    Import {
        importer: String,
        target: String,
        reason: String,
    },

    #[error("unknown extension '{0}'")]
    UnknownExtension(String),

    #[error("extension '{name}' failed: {message}")]
    Extension { name: String, message: String },

    #[error("malformed directive {directive}: {message}")]
    Directive { directive: String, message: String },

    #[error("{0}")]
    Runtime(String),
}

impl EvalError {
    pub fn extension(name: &str, message: impl Into<String>) -> Self {
        EvalError::Extension {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

// ============================================================================
// EXTENSIONS AND PROGRAMS
// ============================================================================

/// A named callable invoked from inside evaluated code.
pub type Extension = Rc<dyn Fn(&[Value]) -> Result<Value, EvalError>>;

/// Programs the harness asks an evaluator to build around a test manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestProgram<'a> {
    /// Evaluate every case, signalling each case through the two extensions.
    RunCases { started: &'a str, completed: &'a str },
    /// Evaluate only the expectation fields of every case; `actual` is dropped.
    FixturesOnly,
}

// ============================================================================
// SYNTAX TREE
// ============================================================================

/// How an import expression uses its target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportKind {
    /// The target is evaluated as code and may import further files.
    #[default]
    Code,
    /// The target is read as raw text; it is a dependency but never parsed.
    Text,
}

/// Dialect-neutral view of a parsed file, enough to find import expressions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyntaxNode {
    /// Operand of an import expression, as written in the source.
    pub import: Option<String>,
    pub kind: ImportKind,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn import(target: impl Into<String>) -> Self {
        Self {
            import: Some(target.into()),
            ..Self::default()
        }
    }

    pub fn text_import(target: impl Into<String>) -> Self {
        Self {
            import: Some(target.into()),
            kind: ImportKind::Text,
            children: Vec::new(),
        }
    }

    pub fn branch(children: Vec<SyntaxNode>) -> Self {
        Self {
            children,
            ..Self::default()
        }
    }
}

/// Syntax and import resolution rules of an evaluator's dialect.
pub trait ImportGraph {
    /// Parses `file` without evaluating it.
    fn syntax_tree(&mut self, file: &Path) -> Result<SyntaxNode, EvalError>;

    /// Resolves an import operand found in `importer` to an existing file.
    fn resolve_import(&self, importer: &Path, target: &str) -> Result<PathBuf, EvalError>;
}

/// The evaluator contract consumed by the runner and the cache manager.
pub trait Evaluator: ImportGraph {
    fn evaluate_file(&mut self, file: &Path) -> Result<Value, EvalError>;

    /// Evaluates `source` as if it were a file called `virtual_name`.
    fn evaluate_snippet(&mut self, virtual_name: &str, source: &str) -> Result<Value, EvalError>;

    /// Best-effort enumeration of the files `root` imports, transitively.
    /// Dynamically computed import paths may be missed.
    fn find_static_imports(&mut self, root: &Path) -> Result<Vec<PathBuf>, EvalError>;

    /// Registers `extension` under `name`, replacing any previous one.
    fn register_extension(&mut self, name: &str, extension: Extension);

    /// Routes trace output emitted by evaluated code to `sink`.
    fn set_trace_output(&mut self, sink: Box<dyn Write>);

    /// Source text of `program` applied to the manifest at `file`, suitable
    /// for [`Evaluator::evaluate_snippet`].
    fn manifest_program(&self, file: &Path, program: ManifestProgram<'_>) -> String;
}

// ============================================================================
// PATH HELPERS
// ============================================================================

/// Makes `path` absolute against the current directory and removes `.` and
/// `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_collapses_dot_components() {
        let path = Path::new("/a/b/./c/../d.yaml");
        assert_eq!(normalize_path(path), PathBuf::from("/a/b/d.yaml"));
    }

    #[test]
    fn normalize_path_anchors_relative_paths() {
        let normalized = normalize_path(Path::new("x/y.yaml"));
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("x/y.yaml"));
    }
}
