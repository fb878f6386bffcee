//! Inline value comparison. There is no fixture; canonical JSON is only
//! produced for the diff.

use serde_json::Value;

use super::canonical::{canonical_json, structurally_equal};
use super::{CaseOutcome, TestCaseResult};
use crate::errors::CaseError;

pub(super) fn evaluate(expected: &Value, actual: &Value) -> CaseOutcome {
    if structurally_equal(actual, expected) {
        return CaseOutcome::without_delta(TestCaseResult::passed());
    }

    let canonical = canonical_json(actual).and_then(|a| canonical_json(expected).map(|e| (a, e)));
    match canonical {
        Ok((actual, expected)) => CaseOutcome::mismatch(
            CaseError::failed("values don't match"),
            None,
            actual,
            expected,
        ),
        Err(e) => CaseOutcome::without_delta(TestCaseResult::failed(CaseError::failed(format!(
            "failed to manifest JSON: {e}"
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equal_values_pass() {
        assert!(evaluate(&json!({"a": [1, 2]}), &json!({"a": [1, 2]})).result.success);
    }

    #[test]
    fn mismatch_has_no_fixture_path() {
        let outcome = evaluate(&json!("x"), &json!("y"));
        assert!(!outcome.result.success);
        let delta = outcome.delta.unwrap();
        assert_eq!(delta.fixture_path, None);
        assert_eq!(delta.actual_canonical, "\"y\"");
        assert_eq!(delta.expected_canonical, "\"x\"");
    }
}
