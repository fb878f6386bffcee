//! # Test Runner
//!
//! Drives one or more test files through the evaluator and publishes every
//! step on the visitor pipeline.
//!
//! Per file:
//! 1. ask the pipeline for a cached outcome; a cached *pass* is replayed as
//!    synthetic events and evaluation is skipped,
//! 2. evaluate the manifest with two lifecycle extensions registered, so the
//!    pipeline sees each case start and finish manifesting,
//! 3. compare every case in name order, publishing its delta (if any) before
//!    its result,
//! 4. always finish with file-completed.
//!
//! The runner never holds a borrow of the pipeline while the evaluator runs,
//! and never holds the evaluator while the pipeline runs: extensions call back
//! into the pipeline from inside evaluation, and the cache visitor calls back
//! into the evaluator from inside the pipeline.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{panic_message, CaseError, ManitestError, Result};
use crate::evaluator::{EvalError, Evaluator, Extension, ManifestProgram};
use crate::expectation::{evaluate_case, CaseOutcome, TestCaseResult};
use crate::manifest::{TestCase, TestManifest};
use crate::visitor::TestVisitor;

/// Extension the manifest program calls before manifesting a case.
pub const CASE_STARTED: &str = "manitestCaseStarted";
/// Extension the manifest program calls after manifesting a case.
pub const CASE_COMPLETED: &str = "manitestCaseCompleted";

type Manifested = Rc<RefCell<BTreeSet<String>>>;

pub struct TestRunner {
    evaluator: Rc<RefCell<dyn Evaluator>>,
    visitor: Rc<RefCell<dyn TestVisitor>>,
}

impl TestRunner {
    pub fn new(evaluator: Rc<RefCell<dyn Evaluator>>, visitor: Rc<RefCell<dyn TestVisitor>>) -> Self {
        Self { evaluator, visitor }
    }

    /// Runs `targets` in order, then completes the run.
    pub fn run(&self, targets: &[PathBuf]) -> Result<()> {
        for target in targets {
            self.run_file(target);
        }
        self.finish()
    }

    /// Signals all-tests-completed. Its error is the run's verdict.
    pub fn finish(&self) -> Result<()> {
        self.visitor.borrow_mut().all_tests_completed()
    }

    /// Runs one test file and reports whether every case passed.
    pub fn run_file(&self, file: &Path) -> bool {
        let cached = self
            .visitor
            .borrow_mut()
            .cached_result_lookup(file)
            .unwrap_or_else(|e| {
                warn!("cache lookup failed: {e}");
                None
            });

        if let Err(e) = self.visitor.borrow_mut().test_file_started(file) {
            warn!("{e}");
        }

        let all_successful = match cached.filter(|result| result.success) {
            Some(result) => {
                debug!(file = %file.display(), "replaying cached pass");
                if let Err(e) = self.replay_cached(file, &result) {
                    warn!("{e}");
                }
                true
            }
            None => self.run_cases(file),
        };

        if let Err(e) = self.visitor.borrow_mut().test_file_completed(file, all_successful) {
            warn!("{e}");
        }
        all_successful
    }

    fn replay_cached(&self, file: &Path, result: &TestCaseResult) -> Result<()> {
        let mut visitor = self.visitor.borrow_mut();
        visitor.test_case_manifestation_started(file, "")?;
        visitor.test_case_manifestation_completed(file, "")?;
        visitor.test_case_evaluation_completed(file, "", result)
    }

    fn run_cases(&self, file: &Path) -> bool {
        let manifested = Manifested::default();
        let manifest = match self.evaluate_manifest(file, &manifested) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(file = %file.display(), "{e}");
                if let Err(e) = self.visitor.borrow_mut().test_file_invalid(file, &e) {
                    warn!("{e}");
                }
                return false;
            }
        };

        let mut all_successful = true;
        for case in manifest.cases.values() {
            if !manifested.borrow().contains(&case.name) {
                if let Err(e) = self.signal_manifestation(file, &case.name) {
                    warn!("{e}");
                }
            }
            all_successful &= self.run_case(file, case);
        }
        all_successful
    }

    /// Stand-in events for an evaluator that never called the lifecycle
    /// extensions for `case`.
    fn signal_manifestation(&self, file: &Path, case: &str) -> Result<()> {
        let mut visitor = self.visitor.borrow_mut();
        visitor.test_case_manifestation_started(file, case)?;
        visitor.test_case_manifestation_completed(file, case)
    }

    fn run_case(&self, file: &Path, case: &TestCase) -> bool {
        let CaseOutcome { mut result, delta } = evaluate_case(case);

        if let Some(delta) = delta {
            let published = self
                .visitor
                .borrow_mut()
                .test_case_evaluation_delta(file, &case.name, &delta);
            if let Err(e) = published {
                let message = match &result.error {
                    Some(error) => format!("{}; {e}", error.message),
                    None => e.to_string(),
                };
                result.success = false;
                result.error = Some(CaseError::failed(message));
            }
        }

        let mut visitor = self.visitor.borrow_mut();
        visitor.annotate_result(file, &case.name, &mut result);
        if let Err(e) = visitor.test_case_evaluation_completed(file, &case.name, &result) {
            warn!("{e}");
        }
        result.success
    }

    fn evaluate_manifest(&self, file: &Path, manifested: &Manifested) -> Result<TestManifest> {
        self.register_lifecycle_extensions(file, manifested);

        let program = self.evaluator.borrow().manifest_program(
            file,
            ManifestProgram::RunCases {
                started: CASE_STARTED,
                completed: CASE_COMPLETED,
            },
        );
        let setup_failed = |reason: String| ManitestError::SetupFailed {
            file: file.to_path_buf(),
            reason,
        };

        let evaluator = self.evaluator.clone();
        let value = panic::catch_unwind(AssertUnwindSafe(|| {
            evaluator
                .borrow_mut()
                .evaluate_snippet(&file.display().to_string(), &program)
        }))
        .map_err(|payload| setup_failed(format!("evaluator panicked: {}", panic_message(payload.as_ref()))))?
        .map_err(|e| setup_failed(e.to_string()))?;

        TestManifest::from_value(file, value).map_err(|e| setup_failed(e.to_string()))
    }

    fn register_lifecycle_extensions(&self, file: &Path, manifested: &Manifested) {
        // The evaluator owns its extensions and a cache visitor may own the
        // evaluator, so extensions only hold the pipeline weakly.
        let started: Extension = {
            let visitor = Rc::downgrade(&self.visitor);
            let file = file.to_path_buf();
            let manifested = manifested.clone();
            Rc::new(move |args: &[Value]| -> std::result::Result<Value, EvalError> {
                let case = case_name(CASE_STARTED, args)?;
                upgrade(CASE_STARTED, &visitor)?
                    .borrow_mut()
                    .test_case_manifestation_started(&file, case)
                    .map_err(|e| EvalError::extension(CASE_STARTED, e.to_string()))?;
                manifested.borrow_mut().insert(case.to_string());
                Ok(args.get(1).cloned().unwrap_or(Value::Null))
            })
        };
        let completed: Extension = {
            let visitor = Rc::downgrade(&self.visitor);
            let file = file.to_path_buf();
            Rc::new(move |args: &[Value]| -> std::result::Result<Value, EvalError> {
                let case = case_name(CASE_COMPLETED, args)?;
                upgrade(CASE_COMPLETED, &visitor)?
                    .borrow_mut()
                    .test_case_manifestation_completed(&file, case)
                    .map_err(|e| EvalError::extension(CASE_COMPLETED, e.to_string()))?;
                Ok(args.get(1).cloned().unwrap_or(Value::Null))
            })
        };

        let mut evaluator = self.evaluator.borrow_mut();
        evaluator.register_extension(CASE_STARTED, started);
        evaluator.register_extension(CASE_COMPLETED, completed);
    }
}

fn upgrade(
    extension: &str,
    visitor: &Weak<RefCell<dyn TestVisitor>>,
) -> std::result::Result<Rc<RefCell<dyn TestVisitor>>, EvalError> {
    visitor
        .upgrade()
        .ok_or_else(|| EvalError::extension(extension, "the test run has ended"))
}

fn case_name<'a>(extension: &str, args: &'a [Value]) -> std::result::Result<&'a str, EvalError> {
    args.first()
        .and_then(Value::as_str)
        .ok_or_else(|| EvalError::extension(extension, "test name must be a string"))
}
