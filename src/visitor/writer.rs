//! Persists actual values into fixture files when they differ.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::errors::{ManitestError, Result};
use crate::expectation::Delta;

use super::TestVisitor;

/// Rewrites the fixture of every mismatching case with its canonical actual
/// value. Inline expectations have no fixture and are left alone.
#[derive(Debug, Default)]
pub struct FixtureWriterVisitor;

impl FixtureWriterVisitor {
    fn write_fixture(path: &Path, canonical_actual: &str) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ManitestError::io(parent, e))?;
        }
        let mut content = canonical_actual.to_string();
        if !content.ends_with('\n') {
            content.push('\n');
        }
        fs::write(path, content).map_err(|e| ManitestError::io(path, e))
    }
}

impl TestVisitor for FixtureWriterVisitor {
    fn test_case_evaluation_delta(&mut self, _file: &Path, case: &str, delta: &Delta) -> Result<()> {
        let Some(path) = &delta.fixture_path else {
            return Ok(());
        };
        Self::write_fixture(path, &delta.actual_canonical)?;
        info!(case, fixture = %path.display(), "updated fixture");
        Ok(())
    }
}
