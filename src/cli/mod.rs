//! The Manitest Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands and wires the
//! library pieces into a test run.

use std::cell::RefCell;
use std::rc::Rc;

use clap::Parser;
use termcolor::WriteColor;
use tracing::info;

use crate::cache::{CacheManager, CacheStore};
use crate::cli::args::{Command, ManitestArgs};
use crate::config::RunConfig;
use crate::errors::Result;
use crate::evaluator::{DocumentEvaluator, Evaluator};
use crate::runner::TestRunner;
use crate::visitor::{
    CacheVisitor, FixtureWriterVisitor, PipelineBuilder, ReporterVisitor, TestVisitor,
    TraceVisitor,
};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() -> Result<()> {
    let argv: Vec<String> = std::env::args().collect();
    let args = ManitestArgs::parse_from(&argv);

    match args.command {
        Command::Test(test) => {
            let config = test.into_config(&argv);
            let out = output::stdout(config.color);
            run_tests(&config, Box::new(out))
        }
        Command::Version => {
            println!("manitest {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Runs the test files of `config`, rendering progress to `out`.
///
/// The pipeline is reporter, tracer, fixture writer (with `write_fixtures`),
/// cache (with `cache`) and finally the exit status visitor.
pub fn run_tests(config: &RunConfig, out: Box<dyn WriteColor>) -> Result<()> {
    let files = config.test_files()?;
    info!(files = files.len(), "starting test run");

    let evaluator: Rc<RefCell<dyn Evaluator>> = Rc::new(RefCell::new(DocumentEvaluator::new(
        config.library_paths.clone(),
    )));

    let tracer = TraceVisitor::new(config.emit_all_traces);
    evaluator.borrow_mut().set_trace_output(Box::new(tracer.sink()));

    let reporter = ReporterVisitor::new(out).with_rerun_command(config.rerun_command.clone());
    let pipeline = PipelineBuilder::new()
        .with(reporter)
        .with(tracer)
        .with_if(config.write_fixtures, || FixtureWriterVisitor)
        .with_if(config.cache, || {
            let store = CacheStore::load_or_default(&config.cache_file);
            CacheVisitor::new(CacheManager::new(evaluator.clone(), store))
        })
        .build();
    let pipeline: Rc<RefCell<dyn TestVisitor>> = Rc::new(RefCell::new(pipeline));

    TestRunner::new(evaluator, pipeline).run(&files)
}
