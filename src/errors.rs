//! Manitest Error Handling
//!
//! Errors are split along the lines the harness cares about when deciding
//! how far a failure may propagate:
//!
//! - **Case level** outcomes (a mismatch, a malformed expectation) are data,
//!   carried by [`CaseError`] inside a result. They never abort a file.
//! - **File level** failures ([`ManitestError::SetupFailed`]) mark one file
//!   invalid and never abort the batch.
//! - **Run level** outcomes ([`ManitestError::TestsFailed`],
//!   [`ManitestError::TestsInvalid`]) are produced once, by the exit status
//!   visitor, and map onto the process exit code.

use std::any::Any;
use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::evaluator::EvalError;

// ============================================================================
// RUN AND FILE LEVEL ERRORS
// ============================================================================

/// The single error type surfaced by the library.
#[derive(Error, Diagnostic, Debug)]
pub enum ManitestError {
    #[error("unable to execute test {file}: {reason}")]
    #[diagnostic(code(manitest::setup), help("the manifest must evaluate to an object of test cases"))]
    SetupFailed { file: PathBuf, reason: String },

    #[error("one or more test cases failed")]
    #[diagnostic(
        code(manitest::failed),
        help("rerun with --write-fixtures to update fixtures from actual values")
    )]
    TestsFailed,

    #[error("one or more test files were invalid")]
    #[diagnostic(code(manitest::invalid))]
    TestsInvalid,

    #[error("unable to find dependencies of {file}: {reason}")]
    #[diagnostic(code(manitest::cache::dependencies))]
    DependencyDiscovery { file: PathBuf, reason: String },

    #[error("cache store {path}: {reason}")]
    #[diagnostic(code(manitest::cache::store))]
    CacheStore { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    #[diagnostic(code(manitest::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("evaluation failed: {0}")]
    #[diagnostic(code(manitest::eval))]
    Eval(#[from] EvalError),

    #[error("visitor failed: {0}")]
    #[diagnostic(code(manitest::visitor))]
    Visitor(String),
}

impl ManitestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManitestError::Io {
            path: path.into(),
            source,
        }
    }

    /// The process exit code for this error, see [`ExitStatus`].
    pub fn exit_code(&self) -> i32 {
        match self {
            ManitestError::TestsFailed => ExitStatus::Failed.code(),
            ManitestError::TestsInvalid => ExitStatus::Invalid.code(),
            _ => ExitStatus::Unexpected.code(),
        }
    }
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, ManitestError>;

// ============================================================================
// EXIT STATUS
// ============================================================================

/// Terminal classification of a whole run.
///
/// Ordered so that `Invalid` dominates `Failed` which dominates `Passed`;
/// `Unexpected` is reserved for errors outside the aggregator's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExitStatus {
    Passed,
    Failed,
    Invalid,
    Unexpected,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Passed => 0,
            ExitStatus::Failed => 1,
            ExitStatus::Unexpected => 2,
            ExitStatus::Invalid => 3,
        }
    }

    /// Converts the status into the error returned from all-tests-completed.
    pub fn into_result(self) -> Result<()> {
        match self {
            ExitStatus::Passed => Ok(()),
            ExitStatus::Failed => Err(ManitestError::TestsFailed),
            ExitStatus::Invalid => Err(ManitestError::TestsInvalid),
            ExitStatus::Unexpected => Err(ManitestError::Visitor(
                "run ended in an unexpected state".to_string(),
            )),
        }
    }
}

// ============================================================================
// CASE LEVEL OUTCOMES
// ============================================================================

/// Why a single test case did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseErrorKind {
    /// The actual value did not match, or the fixture could not be read.
    Failed,
    /// The case itself is malformed: a harness or setup defect.
    Invalid,
}

impl CaseErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseErrorKind::Failed => "test failed",
            CaseErrorKind::Invalid => "invalid test",
        }
    }
}

/// A case-level failure. Recorded on the result, never propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseError {
    pub kind: CaseErrorKind,
    pub message: String,
}

impl CaseError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            kind: CaseErrorKind::Failed,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: CaseErrorKind::Invalid,
            message: message.into(),
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.kind == CaseErrorKind::Invalid
    }
}

impl fmt::Display for CaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.kind.as_str())
    }
}

/// Best-effort description of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Prints a [`ManitestError`] with full miette diagnostics.
pub fn print_error(error: ManitestError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_fixed_mapping() {
        assert_eq!(ExitStatus::Passed.code(), 0);
        assert_eq!(ExitStatus::Failed.code(), 1);
        assert_eq!(ExitStatus::Unexpected.code(), 2);
        assert_eq!(ExitStatus::Invalid.code(), 3);
    }

    #[test]
    fn invalid_dominates_failed_dominates_passed() {
        assert!(ExitStatus::Invalid > ExitStatus::Failed);
        assert!(ExitStatus::Failed > ExitStatus::Passed);
        assert_eq!(
            ExitStatus::Passed.max(ExitStatus::Invalid).max(ExitStatus::Failed),
            ExitStatus::Invalid
        );
    }

    #[test]
    fn errors_map_to_exit_codes() {
        assert_eq!(ManitestError::TestsFailed.exit_code(), 1);
        assert_eq!(ManitestError::TestsInvalid.exit_code(), 3);
        assert_eq!(ManitestError::Visitor("boom".into()).exit_code(), 2);
        assert!(ExitStatus::Passed.into_result().is_ok());
    }

    #[test]
    fn panic_payloads_are_described() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn case_error_display_names_the_kind() {
        let err = CaseError::invalid("malformed test expectation");
        assert!(err.is_invalid());
        assert_eq!(
            err.to_string(),
            "malformed test expectation: invalid test"
        );
    }
}
