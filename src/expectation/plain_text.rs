//! Plain-text fixture comparison.

use std::path::Path;

use serde_json::Value;

use super::canonical::normalize_plain_text;
use super::{CaseOutcome, TestCaseResult};
use crate::errors::CaseError;

pub(super) fn evaluate(fixture: &Path, actual: &Value) -> CaseOutcome {
    let Value::String(actual) = actual else {
        return CaseOutcome::without_delta(TestCaseResult::failed(CaseError::failed(
            "actual value must be a string",
        )));
    };
    let actual = normalize_plain_text(actual);

    let expected = match std::fs::read_to_string(fixture) {
        Ok(text) => normalize_plain_text(&text),
        Err(e) => {
            return CaseOutcome::mismatch(
                CaseError::failed(format!("unable to open fixture {}: {}", fixture.display(), e)),
                Some(fixture.to_path_buf()),
                actual,
                String::new(),
            )
        }
    };

    if actual == expected {
        CaseOutcome::without_delta(TestCaseResult::passed())
    } else {
        CaseOutcome::mismatch(
            CaseError::failed("values don't match"),
            Some(fixture.to_path_buf()),
            actual,
            expected,
        )
    }
}
