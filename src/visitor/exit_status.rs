//! Aggregates the run into one [`ExitStatus`].

use std::path::Path;

use crate::errors::{ExitStatus, ManitestError, Result};
use crate::expectation::TestCaseResult;

use super::TestVisitor;

#[derive(Debug, Default)]
pub struct ExitStatusVisitor {
    has_failures: bool,
    has_invalid: bool,
}

impl ExitStatusVisitor {
    pub fn status(&self) -> ExitStatus {
        if self.has_invalid {
            ExitStatus::Invalid
        } else if self.has_failures {
            ExitStatus::Failed
        } else {
            ExitStatus::Passed
        }
    }
}

impl TestVisitor for ExitStatusVisitor {
    fn test_file_completed(&mut self, _file: &Path, all_successful: bool) -> Result<()> {
        self.has_failures |= !all_successful;
        Ok(())
    }

    fn test_file_invalid(&mut self, _file: &Path, _error: &ManitestError) -> Result<()> {
        self.has_invalid = true;
        Ok(())
    }

    fn test_case_evaluation_completed(
        &mut self,
        _file: &Path,
        _case: &str,
        result: &TestCaseResult,
    ) -> Result<()> {
        self.has_invalid |= result.is_invalid();
        Ok(())
    }

    fn all_tests_completed(&mut self) -> Result<()> {
        self.status().into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CaseError;

    #[test]
    fn empty_run_passes() {
        let mut visitor = ExitStatusVisitor::default();
        assert_eq!(visitor.status(), ExitStatus::Passed);
        assert!(visitor.all_tests_completed().is_ok());
    }

    #[test]
    fn failing_file_fails_the_run() {
        let mut visitor = ExitStatusVisitor::default();
        visitor.test_file_completed(Path::new("a"), true).unwrap();
        visitor.test_file_completed(Path::new("b"), false).unwrap();
        assert_eq!(visitor.status(), ExitStatus::Failed);
        assert_eq!(visitor.all_tests_completed().unwrap_err().exit_code(), 1);
    }

    #[test]
    fn invalid_file_dominates_failures() {
        let mut visitor = ExitStatusVisitor::default();
        visitor.test_file_completed(Path::new("a"), false).unwrap();
        visitor
            .test_file_invalid(Path::new("b"), &ManitestError::Visitor("x".into()))
            .unwrap();
        visitor.test_file_completed(Path::new("b"), false).unwrap();
        assert_eq!(visitor.status(), ExitStatus::Invalid);
        assert_eq!(visitor.all_tests_completed().unwrap_err().exit_code(), 3);
    }

    #[test]
    fn malformed_case_marks_the_run_invalid() {
        let mut visitor = ExitStatusVisitor::default();
        let result = TestCaseResult::failed(CaseError::invalid("malformed test expectation"));
        visitor
            .test_case_evaluation_completed(Path::new("a"), "case", &result)
            .unwrap();
        assert_eq!(visitor.status(), ExitStatus::Invalid);
    }
}
