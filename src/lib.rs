//! # Manitest
//!
//! A test harness for declarative configuration manifests. Each test file is
//! a manifest of named cases; every case pairs an evaluated `actual` value with
//! an expectation (a JSON, YAML or plain-text fixture, or an inline value).
//!
//! - [`evaluator`]: the boundary to the configuration language, plus the
//!   bundled [`evaluator::DocumentEvaluator`]
//! - [`walker`]: transitive import discovery
//! - [`expectation`]: per-case comparison and canonical forms
//! - [`cache`]: content-addressed result cache
//! - [`visitor`]: the event pipeline
//! - [`runner`]: drives files through evaluator and pipeline

pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod evaluator;
pub mod expectation;
pub mod manifest;
pub mod runner;
pub mod visitor;
pub mod walker;

pub use crate::config::RunConfig;
pub use crate::errors::{ExitStatus, ManitestError, Result};
pub use crate::evaluator::{DocumentEvaluator, Evaluator};
pub use crate::runner::TestRunner;
