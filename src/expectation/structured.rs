//! JSON and YAML fixture comparison.

use std::path::Path;

use serde_json::Value;

use super::canonical::{
    canonical_json, canonical_yaml, decode_json, decode_yaml, structurally_equal,
};
use super::{CaseOutcome, TestCaseResult};
use crate::errors::CaseError;

/// Structured fixture formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredFormat {
    Json,
    Yaml,
}

impl StructuredFormat {
    pub fn name(self) -> &'static str {
        match self {
            StructuredFormat::Json => "JSON",
            StructuredFormat::Yaml => "YAML",
        }
    }

    pub fn decode(self, text: &str) -> Result<Value, String> {
        match self {
            StructuredFormat::Json => decode_json(text).map_err(|e| e.to_string()),
            StructuredFormat::Yaml => decode_yaml(text).map_err(|e| e.to_string()),
        }
    }

    pub fn canonicalize(self, value: &Value) -> Result<String, String> {
        match self {
            StructuredFormat::Json => canonical_json(value).map_err(|e| e.to_string()),
            StructuredFormat::Yaml => canonical_yaml(value).map_err(|e| e.to_string()),
        }
    }
}

pub(super) fn evaluate(format: StructuredFormat, fixture: &Path, actual: &Value) -> CaseOutcome {
    // Evaluated output may stringify structured data.
    let decoded;
    let actual = match actual {
        Value::String(text) => match format.decode(text) {
            Ok(value) => {
                decoded = value;
                &decoded
            }
            Err(e) => {
                return CaseOutcome::without_delta(TestCaseResult::failed(CaseError::failed(
                    format!("unable to decode {} from string: {}", format.name(), e),
                )))
            }
        },
        other => other,
    };

    let canonical_actual = match format.canonicalize(actual) {
        Ok(text) => text,
        Err(e) => {
            return CaseOutcome::without_delta(TestCaseResult::failed(CaseError::failed(format!(
                "failed to manifest actual {}: {}",
                format.name(),
                e
            ))))
        }
    };

    let expected = match std::fs::read_to_string(fixture)
        .map_err(|e| format!("unable to open fixture {}: {}", fixture.display(), e))
        .and_then(|text| {
            format
                .decode(&text)
                .map_err(|e| format!("unable to parse fixture {}: {}", fixture.display(), e))
        }) {
        Ok(value) => value,
        Err(message) => {
            return CaseOutcome::mismatch(
                CaseError::failed(message),
                Some(fixture.to_path_buf()),
                canonical_actual,
                String::new(),
            )
        }
    };

    if structurally_equal(actual, &expected) {
        return CaseOutcome::without_delta(TestCaseResult::passed());
    }

    match format.canonicalize(&expected) {
        Ok(canonical_expected) => CaseOutcome::mismatch(
            CaseError::failed("values don't match"),
            Some(fixture.to_path_buf()),
            canonical_actual,
            canonical_expected,
        ),
        Err(e) => CaseOutcome::without_delta(TestCaseResult::failed(CaseError::failed(format!(
            "failed to manifest expected {} {}: {}",
            format.name(),
            fixture.display(),
            e
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn matching_json_fixture_passes() {
        let dir = TempDir::new().unwrap();
        let fixture = dir.path().join("a.json");
        fs::write(&fixture, "{\"a\": 1.0}").unwrap();

        let outcome = evaluate(StructuredFormat::Json, &fixture, &json!({"a": 1}));
        assert!(outcome.result.success);
        assert!(outcome.delta.is_none());
    }

    #[test]
    fn string_actual_is_decoded_first() {
        let dir = TempDir::new().unwrap();
        let fixture = dir.path().join("a.yaml");
        fs::write(&fixture, "a: 1\nb: [x, y]\n").unwrap();

        let outcome = evaluate(
            StructuredFormat::Yaml,
            &fixture,
            &json!("b:\n  - x\n  - y\na: 1\n"),
        );
        assert!(outcome.result.success);
    }

    #[test]
    fn undecodable_string_actual_fails_without_delta() {
        let dir = TempDir::new().unwrap();
        let outcome = evaluate(StructuredFormat::Json, &dir.path().join("a.json"), &json!("{"));
        assert!(!outcome.result.success);
        assert!(outcome.delta.is_none());
    }

    #[test]
    fn mismatch_produces_canonical_delta() {
        let dir = TempDir::new().unwrap();
        let fixture = dir.path().join("a.json");
        fs::write(&fixture, "{\"b\": 2, \"a\": 1}").unwrap();

        let outcome = evaluate(StructuredFormat::Json, &fixture, &json!({"a": 3}));
        let delta = outcome.delta.expect("delta on mismatch");
        assert_eq!(delta.fixture_path.as_deref(), Some(fixture.as_path()));
        assert_eq!(delta.actual_canonical, "{\n  \"a\": 3\n}");
        assert_eq!(delta.expected_canonical, "{\n  \"a\": 1,\n  \"b\": 2\n}");
        assert_eq!(outcome.result.actual_canonical, delta.actual_canonical);
        assert_eq!(
            outcome.result.error.unwrap().message,
            "values don't match"
        );
    }

    #[test]
    fn missing_fixture_still_publishes_a_delta() {
        let dir = TempDir::new().unwrap();
        let fixture = dir.path().join("missing.yaml");

        let outcome = evaluate(StructuredFormat::Yaml, &fixture, &json!({"k": "v"}));
        assert!(!outcome.result.success);
        assert!(!outcome.result.is_invalid());
        let delta = outcome.delta.expect("delta for missing fixture");
        assert_eq!(delta.actual_canonical, "k: v\n");
        assert_eq!(delta.expected_canonical, "");
    }

    #[test]
    fn corrupt_fixture_is_a_failed_comparison() {
        let dir = TempDir::new().unwrap();
        let fixture = dir.path().join("bad.json");
        fs::write(&fixture, "{not json").unwrap();

        let outcome = evaluate(StructuredFormat::Json, &fixture, &json!({}));
        assert!(!outcome.result.success);
        assert!(outcome.delta.is_some());
    }
}
