// Content-addressed caching across runs, and dependency discovery.

mod common;

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use common::{exit_code, Suite};
use manitest::cache::{CacheManager, CacheStore};
use manitest::cli::output::OutputBuffer;
use manitest::evaluator::{
    normalize_path, EvalError, Extension, ImportGraph, ManifestProgram, SyntaxNode,
};
use manitest::visitor::{CacheVisitor, PipelineBuilder, ReporterVisitor, TestVisitor};
use manitest::walker::walk;
use manitest::{DocumentEvaluator, Evaluator, Result, TestRunner};
use serde_json::Value;

/// Counts how often a manifest is actually evaluated.
struct Counting {
    inner: DocumentEvaluator,
    manifest_runs: Rc<Cell<usize>>,
}

impl ImportGraph for Counting {
    fn syntax_tree(&mut self, file: &Path) -> std::result::Result<SyntaxNode, EvalError> {
        self.inner.syntax_tree(file)
    }

    fn resolve_import(&self, importer: &Path, target: &str) -> std::result::Result<PathBuf, EvalError> {
        self.inner.resolve_import(importer, target)
    }
}

impl Evaluator for Counting {
    fn evaluate_file(&mut self, file: &Path) -> std::result::Result<Value, EvalError> {
        self.inner.evaluate_file(file)
    }

    fn evaluate_snippet(&mut self, name: &str, source: &str) -> std::result::Result<Value, EvalError> {
        self.inner.evaluate_snippet(name, source)
    }

    fn find_static_imports(&mut self, root: &Path) -> std::result::Result<Vec<PathBuf>, EvalError> {
        self.inner.find_static_imports(root)
    }

    fn register_extension(&mut self, name: &str, extension: Extension) {
        self.inner.register_extension(name, extension)
    }

    fn set_trace_output(&mut self, sink: Box<dyn Write>) {
        self.inner.set_trace_output(sink)
    }

    fn manifest_program(&self, file: &Path, program: ManifestProgram<'_>) -> String {
        if let ManifestProgram::RunCases { .. } = program {
            self.manifest_runs.set(self.manifest_runs.get() + 1);
        }
        self.inner.manifest_program(file, program)
    }
}

struct CachedRun {
    result: Result<()>,
    report: String,
    manifest_runs: usize,
}

fn run_cached(suite: &Suite, targets: &[&str]) -> CachedRun {
    let manifest_runs = Rc::new(Cell::new(0));
    let evaluator: Rc<RefCell<dyn Evaluator>> = Rc::new(RefCell::new(Counting {
        inner: DocumentEvaluator::default(),
        manifest_runs: manifest_runs.clone(),
    }));

    let buffer = OutputBuffer::new();
    let store = CacheStore::load_or_default(suite.path(".manitest-cache.json"));
    let pipeline = PipelineBuilder::new()
        .with(ReporterVisitor::new(Box::new(buffer.clone())))
        .with(CacheVisitor::new(CacheManager::new(evaluator.clone(), store)))
        .build();
    let pipeline: Rc<RefCell<dyn TestVisitor>> = Rc::new(RefCell::new(pipeline));

    let targets: Vec<PathBuf> = targets.iter().map(|t| suite.path(t)).collect();
    let result = TestRunner::new(evaluator, pipeline).run(&targets);
    CachedRun {
        result,
        report: buffer.contents(),
        manifest_runs: manifest_runs.get(),
    }
}

fn passing_suite() -> Suite {
    let suite = Suite::new();
    suite.write("lib/base.yaml", "port: 80\n");
    suite.write("expected.json", "{\"base\": {\"port\": 80}}");
    suite.write(
        "t.manitest.yaml",
        "a: { actual: { base: { $import: lib/base.yaml } }, expectJSON: expected.json }\n",
    );
    suite
}

#[test]
fn unchanged_suite_is_served_from_the_cache() {
    let suite = passing_suite();

    let first = run_cached(&suite, &["t.manitest.yaml"]);
    assert_eq!(exit_code(&first.result), 0);
    assert_eq!(first.manifest_runs, 1);
    assert!(suite.path(".manitest-cache.json").exists());

    let second = run_cached(&suite, &["t.manitest.yaml"]);
    assert_eq!(exit_code(&second.result), 0);
    assert_eq!(second.manifest_runs, 0);
    assert!(second.report.contains("(all tests) (cached)"));
    assert!(second.report.contains("1 file tested, 1 file passed, 1 file cached"));
}

#[test]
fn text_imports_that_are_not_documents_are_cached() {
    let suite = Suite::new();
    suite.write("banner.txt", "Note: use key: value pairs [\n");
    suite.write("expected.txt", "Note: use key: value pairs [\n");
    suite.write(
        "t.manitest.yaml",
        "a: { actual: { $importstr: banner.txt }, expectPlainText: expected.txt }\n",
    );

    let first = run_cached(&suite, &["t.manitest.yaml"]);
    assert_eq!(exit_code(&first.result), 0);

    let second = run_cached(&suite, &["t.manitest.yaml"]);
    assert_eq!(second.manifest_runs, 0);
    assert!(second.report.contains("1 file cached"));

    suite.write("banner.txt", "Note: changed\n");
    let third = run_cached(&suite, &["t.manitest.yaml"]);
    assert_eq!(third.manifest_runs, 1);
}

#[test]
fn touching_a_fixture_invalidates_the_entry() {
    let suite = passing_suite();
    run_cached(&suite, &["t.manitest.yaml"]);

    suite.write("expected.json", "{\"base\": {\"port\": 80}} ");
    let rerun = run_cached(&suite, &["t.manitest.yaml"]);
    assert_eq!(rerun.manifest_runs, 1);
    assert_eq!(exit_code(&rerun.result), 0);
}

#[test]
fn touching_an_import_invalidates_the_entry() {
    let suite = passing_suite();
    run_cached(&suite, &["t.manitest.yaml"]);

    suite.write("lib/base.yaml", "port: 81\n");
    let rerun = run_cached(&suite, &["t.manitest.yaml"]);
    assert_eq!(rerun.manifest_runs, 1);
    assert_eq!(exit_code(&rerun.result), 1);
}

#[test]
fn cached_failures_are_re_evaluated() {
    let suite = Suite::new();
    suite.write("t.manitest.yaml", "a: { actual: 1, expect: 2 }\n");

    let first = run_cached(&suite, &["t.manitest.yaml"]);
    assert_eq!(exit_code(&first.result), 1);

    let second = run_cached(&suite, &["t.manitest.yaml"]);
    assert_eq!(second.manifest_runs, 1);
    assert_eq!(exit_code(&second.result), 1);
}

#[test]
fn invalid_files_are_never_cached() {
    let suite = Suite::new();
    suite.write("bad.manitest.yaml", "a: { actual: { $import: nope.yaml }, expect: 1 }\n");
    suite.write("good.manitest.yaml", "a: { actual: 1, expect: 1 }\n");

    let first = run_cached(&suite, &["bad.manitest.yaml", "good.manitest.yaml"]);
    assert_eq!(exit_code(&first.result), 3);

    let store = CacheStore::load(suite.path(".manitest-cache.json")).unwrap();
    assert!(store.get(&suite.path("bad.manitest.yaml")).is_none());
    assert!(store.get(&suite.path("good.manitest.yaml")).is_some());
}

#[test]
fn corrupt_store_is_treated_as_empty() {
    let suite = passing_suite();
    suite.write(".manitest-cache.json", "{ definitely not json");

    let run = run_cached(&suite, &["t.manitest.yaml"]);
    assert_eq!(exit_code(&run.result), 0);
    assert_eq!(run.manifest_runs, 1);
    assert!(CacheStore::load(suite.path(".manitest-cache.json")).is_ok());
}

#[test]
fn cache_flag_enables_caching_in_the_cli_pipeline() {
    let suite = passing_suite();
    let mut config = suite.config(&["t.manitest.yaml"]);
    config.cache = true;

    let (result, _) = suite.run(&config);
    assert_eq!(exit_code(&result), 0);
    let (result, report) = suite.run(&config);
    assert_eq!(exit_code(&result), 0);
    assert!(report.contains("1 file cached"));
}

#[test]
fn cyclic_imports_terminate_with_both_files() {
    let suite = Suite::new();
    let a = suite.write("a.yaml", "b: { $import: b.yaml }\n");
    let b = suite.write("b.yaml", "a: { $import: a.yaml }\n");

    let mut evaluator = DocumentEvaluator::default();
    let deps = walk(&mut evaluator, &normalize_path(&a)).unwrap();
    let expected: BTreeSet<PathBuf> = [normalize_path(&a), normalize_path(&b)].into_iter().collect();
    assert_eq!(deps, expected);
}
