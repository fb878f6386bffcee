//! # Test Case Evaluation
//!
//! Decides whether one case passes. Dispatch follows the case's
//! [`Expectation`] variant:
//!
//! | variant      | compared against                       | on mismatch            |
//! |--------------|----------------------------------------|------------------------|
//! | `Json`       | decoded JSON fixture                   | canonical JSON delta   |
//! | `Yaml`       | decoded YAML fixture                   | canonical YAML delta   |
//! | `PlainText`  | fixture text, whitespace-normalized    | normalized text delta  |
//! | `Inline`     | the literal `expect` value             | canonical JSON delta   |
//! | `Malformed`  | nothing: the case is invalid           | no delta               |
//!
//! Evaluation is pure with respect to the visitor pipeline: it returns the
//! result together with the [`Delta`] the runner must publish.

use std::path::PathBuf;

use crate::errors::CaseError;
use crate::manifest::{Expectation, TestCase};

pub mod canonical;
mod inline;
mod plain_text;
mod structured;

pub use structured::StructuredFormat;

/// Outcome of one test case. Immutable once published to the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestCaseResult {
    pub success: bool,
    pub cached: bool,
    pub error: Option<CaseError>,
    pub fixture_path: Option<PathBuf>,
    pub actual_canonical: String,
    pub expected_canonical: String,
    pub trace: Option<String>,
}

impl TestCaseResult {
    pub fn passed() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(error: CaseError) -> Self {
        Self {
            success: false,
            error: Some(error),
            ..Self::default()
        }
    }

    /// Stand-in for a whole file whose outcome came from the cache.
    pub fn from_cache(success: bool) -> Self {
        Self {
            success,
            cached: true,
            ..Self::default()
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.error.as_ref().is_some_and(CaseError::is_invalid)
    }
}

/// Canonical actual and expected text for a case that did not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    /// `None` for inline expectations, which have no fixture file.
    pub fixture_path: Option<PathBuf>,
    pub actual_canonical: String,
    pub expected_canonical: String,
}

/// A result plus the delta to publish before it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseOutcome {
    pub result: TestCaseResult,
    pub delta: Option<Delta>,
}

impl CaseOutcome {
    fn without_delta(result: TestCaseResult) -> Self {
        Self {
            result,
            delta: None,
        }
    }

    /// A mismatch: the result and the delta carry the same canonical text.
    fn mismatch(
        error: CaseError,
        fixture_path: Option<PathBuf>,
        actual_canonical: String,
        expected_canonical: String,
    ) -> Self {
        let delta = Delta {
            fixture_path: fixture_path.clone(),
            actual_canonical: actual_canonical.clone(),
            expected_canonical: expected_canonical.clone(),
        };
        Self {
            result: TestCaseResult {
                success: false,
                cached: false,
                error: Some(error),
                fixture_path,
                actual_canonical,
                expected_canonical,
                trace: None,
            },
            delta: Some(delta),
        }
    }
}

/// Runs the comparison for `case`.
pub fn evaluate_case(case: &TestCase) -> CaseOutcome {
    match &case.expectation {
        Expectation::Json(fixture) => {
            structured::evaluate(StructuredFormat::Json, fixture, &case.actual)
        }
        Expectation::Yaml(fixture) => {
            structured::evaluate(StructuredFormat::Yaml, fixture, &case.actual)
        }
        Expectation::PlainText(fixture) => plain_text::evaluate(fixture, &case.actual),
        Expectation::Inline(expected) => inline::evaluate(expected, &case.actual),
        Expectation::Malformed => CaseOutcome::without_delta(TestCaseResult::failed(
            CaseError::invalid("malformed test expectation"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CaseErrorKind;
    use serde_json::json;

    #[test]
    fn malformed_cases_are_invalid_without_delta() {
        let case = TestCase {
            name: "broken".to_string(),
            actual: json!(1),
            expectation: Expectation::Malformed,
        };
        let outcome = evaluate_case(&case);
        assert!(!outcome.result.success);
        assert!(outcome.result.is_invalid());
        assert_eq!(
            outcome.result.error.map(|e| e.kind),
            Some(CaseErrorKind::Invalid)
        );
        assert!(outcome.delta.is_none());
    }

    #[test]
    fn cached_results_are_marked() {
        let result = TestCaseResult::from_cache(true);
        assert!(result.cached && result.success && !result.is_invalid());
    }
}
