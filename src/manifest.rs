//! Test manifests.
//!
//! A manifest evaluates to an object mapping test case names to cases. Each
//! case carries an `actual` value and exactly one expectation field:
//! `expectJSON`, `expectYAML`, `expectPlainText` (fixture paths relative to
//! the test file) or `expect` (an inline value).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

/// Wire shape of a single case, before the expectation is classified.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTestCase {
    #[serde(default)]
    pub actual: Option<Value>,
    #[serde(default, rename = "expectJSON")]
    pub expect_json: Option<String>,
    #[serde(default, rename = "expectYAML")]
    pub expect_yaml: Option<String>,
    #[serde(default, rename = "expectPlainText")]
    pub expect_plain_text: Option<String>,
    #[serde(default)]
    pub expect: Option<Value>,
}

/// What a case is compared against.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    Json(PathBuf),
    Yaml(PathBuf),
    PlainText(PathBuf),
    Inline(Value),
    /// No recognised expectation field was set.
    Malformed,
}

impl Expectation {
    /// Classifies `raw` in fixed priority order: JSON, YAML, plain text, inline.
    /// Fixture paths are joined onto the test file's directory.
    pub fn classify(test_file: &Path, raw: &RawTestCase) -> Self {
        let dir = test_file.parent().unwrap_or_else(|| Path::new(""));
        if let Some(path) = &raw.expect_json {
            return Expectation::Json(dir.join(path));
        }
        if let Some(path) = &raw.expect_yaml {
            return Expectation::Yaml(dir.join(path));
        }
        if let Some(path) = &raw.expect_plain_text {
            return Expectation::PlainText(dir.join(path));
        }
        match &raw.expect {
            Some(value) => Expectation::Inline(value.clone()),
            None => Expectation::Malformed,
        }
    }

    pub fn fixture_path(&self) -> Option<&Path> {
        match self {
            Expectation::Json(path) | Expectation::Yaml(path) | Expectation::PlainText(path) => {
                Some(path)
            }
            Expectation::Inline(_) | Expectation::Malformed => None,
        }
    }
}

/// One named test case.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub actual: Value,
    pub expectation: Expectation,
}

/// All cases of one test file, ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestManifest {
    pub cases: BTreeMap<String, TestCase>,
}

impl TestManifest {
    /// Builds a manifest from the value a test file evaluated to.
    pub fn from_value(test_file: &Path, value: Value) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, RawTestCase> = serde_json::from_value(value)?;
        let cases = raw
            .into_iter()
            .map(|(name, raw)| {
                let expectation = Expectation::classify(test_file, &raw);
                let case = TestCase {
                    name: name.clone(),
                    actual: raw.actual.unwrap_or(Value::Null),
                    expectation,
                };
                (name, case)
            })
            .collect();
        Ok(Self { cases })
    }

    /// Every fixture file referenced by the manifest.
    pub fn fixture_paths(&self) -> impl Iterator<Item = &Path> {
        self.cases
            .values()
            .filter_map(|case| case.expectation.fixture_path())
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}
