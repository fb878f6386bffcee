//! # Event Pipeline
//!
//! The runner reports everything it does as events on a [`TestVisitor`].
//! Concrete visitors each react to the subset they care about: rendering
//! progress, buffering traces, writing fixtures, caching outcomes and
//! finally deciding the exit status.
//!
//! Visitors are composed with a [`VisitorChain`], which forwards each event
//! to its members in order and stops at the first error. Side effects of the
//! members that already ran are kept.
//!
//! The exit status visitor has to observe every event last, after all other
//! members have reacted. [`PipelineBuilder`] appends it when the chain is
//! built, so callers cannot get the order wrong.
//!
//! Events synthesized for a file served from the cache use an empty case name.

use std::path::Path;

use crate::errors::{ManitestError, Result};
use crate::expectation::{Delta, TestCaseResult};

pub mod cache;
pub mod exit_status;
pub mod reporter;
pub mod trace;
pub mod writer;

pub use cache::CacheVisitor;
pub use exit_status::ExitStatusVisitor;
pub use reporter::ReporterVisitor;
pub use trace::{TraceSink, TraceVisitor};
pub use writer::FixtureWriterVisitor;

// ============================================================================
// VISITOR TRAIT
// ============================================================================

/// Lifecycle hooks of a test run. Every hook defaults to doing nothing.
pub trait TestVisitor {
    /// A test file is about to be processed.
    fn test_file_started(&mut self, _file: &Path) -> Result<()> {
        Ok(())
    }

    /// A test file is done. Always emitted, even for invalid files.
    fn test_file_completed(&mut self, _file: &Path, _all_successful: bool) -> Result<()> {
        Ok(())
    }

    /// The file could not be evaluated into a manifest.
    fn test_file_invalid(&mut self, _file: &Path, _error: &ManitestError) -> Result<()> {
        Ok(())
    }

    fn test_case_manifestation_started(&mut self, _file: &Path, _case: &str) -> Result<()> {
        Ok(())
    }

    fn test_case_manifestation_completed(&mut self, _file: &Path, _case: &str) -> Result<()> {
        Ok(())
    }

    /// Last chance to attach data to a result before it is published.
    fn annotate_result(&mut self, _file: &Path, _case: &str, _result: &mut TestCaseResult) {}

    fn test_case_evaluation_completed(
        &mut self,
        _file: &Path,
        _case: &str,
        _result: &TestCaseResult,
    ) -> Result<()> {
        Ok(())
    }

    /// The actual value of a case differs from what it was compared against.
    fn test_case_evaluation_delta(&mut self, _file: &Path, _case: &str, _delta: &Delta) -> Result<()> {
        Ok(())
    }

    /// A previously recorded outcome for `file`, if one is still valid.
    fn cached_result_lookup(&mut self, _file: &Path) -> Result<Option<TestCaseResult>> {
        Ok(None)
    }

    /// The run is over. The returned error decides the process exit status.
    fn all_tests_completed(&mut self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// COMPOSITE
// ============================================================================

/// Ordered composite of visitors.
#[derive(Default)]
pub struct VisitorChain {
    visitors: Vec<Box<dyn TestVisitor>>,
}

impl VisitorChain {
    pub fn len(&self) -> usize {
        self.visitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visitors.is_empty()
    }

    fn each(&mut self, mut event: impl FnMut(&mut dyn TestVisitor) -> Result<()>) -> Result<()> {
        for visitor in &mut self.visitors {
            event(visitor.as_mut())?;
        }
        Ok(())
    }
}

impl TestVisitor for VisitorChain {
    fn test_file_started(&mut self, file: &Path) -> Result<()> {
        self.each(|v| v.test_file_started(file))
    }

    fn test_file_completed(&mut self, file: &Path, all_successful: bool) -> Result<()> {
        self.each(|v| v.test_file_completed(file, all_successful))
    }

    fn test_file_invalid(&mut self, file: &Path, error: &ManitestError) -> Result<()> {
        self.each(|v| v.test_file_invalid(file, error))
    }

    fn test_case_manifestation_started(&mut self, file: &Path, case: &str) -> Result<()> {
        self.each(|v| v.test_case_manifestation_started(file, case))
    }

    fn test_case_manifestation_completed(&mut self, file: &Path, case: &str) -> Result<()> {
        self.each(|v| v.test_case_manifestation_completed(file, case))
    }

    fn annotate_result(&mut self, file: &Path, case: &str, result: &mut TestCaseResult) {
        for visitor in &mut self.visitors {
            visitor.annotate_result(file, case, result);
        }
    }

    fn test_case_evaluation_completed(
        &mut self,
        file: &Path,
        case: &str,
        result: &TestCaseResult,
    ) -> Result<()> {
        self.each(|v| v.test_case_evaluation_completed(file, case, result))
    }

    fn test_case_evaluation_delta(&mut self, file: &Path, case: &str, delta: &Delta) -> Result<()> {
        self.each(|v| v.test_case_evaluation_delta(file, case, delta))
    }

    /// First member with a result wins.
    fn cached_result_lookup(&mut self, file: &Path) -> Result<Option<TestCaseResult>> {
        for visitor in &mut self.visitors {
            if let Some(result) = visitor.cached_result_lookup(file)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    fn all_tests_completed(&mut self) -> Result<()> {
        self.each(|v| v.all_tests_completed())
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Assembles a [`VisitorChain`] that always ends with an [`ExitStatusVisitor`].
#[derive(Default)]
pub struct PipelineBuilder {
    visitors: Vec<Box<dyn TestVisitor>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, visitor: impl TestVisitor + 'static) -> Self {
        self.visitors.push(Box::new(visitor));
        self
    }

    /// Adds the visitor built by `make` only when `enabled`.
    pub fn with_if<V, F>(self, enabled: bool, make: F) -> Self
    where
        V: TestVisitor + 'static,
        F: FnOnce() -> V,
    {
        if enabled {
            self.with(make())
        } else {
            self
        }
    }

    pub fn build(self) -> VisitorChain {
        let mut visitors = self.visitors;
        visitors.push(Box::new(ExitStatusVisitor::default()));
        VisitorChain { visitors }
    }
}
