//! Bridges the event pipeline to the [`CacheManager`].

use std::path::Path;

use tracing::{debug, warn};

use crate::cache::CacheManager;
use crate::errors::{ManitestError, Result};
use crate::expectation::TestCaseResult;

use super::TestVisitor;

/// Serves cached outcomes and records fresh ones.
///
/// Files that could not be evaluated, or that contained a malformed case,
/// are never recorded. The store is saved when the run completes; failing to
/// read or write it only costs a cache miss.
pub struct CacheVisitor {
    manager: CacheManager,
    file_invalid: bool,
}

impl CacheVisitor {
    pub fn new(manager: CacheManager) -> Self {
        Self {
            manager,
            file_invalid: false,
        }
    }

    pub fn manager(&self) -> &CacheManager {
        &self.manager
    }
}

impl TestVisitor for CacheVisitor {
    fn cached_result_lookup(&mut self, file: &Path) -> Result<Option<TestCaseResult>> {
        match self.manager.lookup(file) {
            Ok(Some(success)) => {
                debug!(file = %file.display(), success, "cache hit");
                Ok(Some(TestCaseResult::from_cache(success)))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!("failed to get cache result: {e}");
                Ok(None)
            }
        }
    }

    fn test_file_started(&mut self, _file: &Path) -> Result<()> {
        self.file_invalid = false;
        Ok(())
    }

    fn test_file_invalid(&mut self, _file: &Path, _error: &ManitestError) -> Result<()> {
        self.file_invalid = true;
        Ok(())
    }

    fn test_case_evaluation_completed(
        &mut self,
        _file: &Path,
        _case: &str,
        result: &TestCaseResult,
    ) -> Result<()> {
        self.file_invalid |= result.is_invalid();
        Ok(())
    }

    fn test_file_completed(&mut self, file: &Path, all_successful: bool) -> Result<()> {
        if self.file_invalid {
            debug!(file = %file.display(), "not caching invalid file");
            return Ok(());
        }
        if let Err(e) = self.manager.record(file, all_successful) {
            warn!("failed to record cache result: {e}");
        }
        Ok(())
    }

    fn all_tests_completed(&mut self) -> Result<()> {
        if let Err(e) = self.manager.save() {
            warn!("failed to save cached test results: {e}");
        }
        Ok(())
    }
}
