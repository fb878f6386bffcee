//! # Shared Integration Test Helpers
//!
//! A [`Suite`] is a scratch directory of test files and fixtures, plus a way
//! to run the harness over it and capture the report.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use manitest::cli::output::OutputBuffer;
use manitest::cli::run_tests;
use manitest::config::ColorMode;
use manitest::{Result, RunConfig};
use tempfile::TempDir;

pub struct Suite {
    dir: TempDir,
}

impl Suite {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes `content` to `name`, creating parent directories.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).unwrap()
    }

    /// Uncolored config over `targets`, with the cache store kept inside the suite.
    pub fn config(&self, targets: &[&str]) -> RunConfig {
        RunConfig {
            targets: targets.iter().map(|t| self.path(t)).collect(),
            cache_file: self.path(".manitest-cache.json"),
            color: ColorMode::Never,
            ..RunConfig::default()
        }
    }

    /// Runs `config` and returns the verdict with the captured report.
    pub fn run(&self, config: &RunConfig) -> (Result<()>, String) {
        let buffer = OutputBuffer::new();
        let result = run_tests(config, Box::new(buffer.clone()));
        (result, buffer.contents())
    }
}

/// Exit code a verdict maps onto.
pub fn exit_code(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.exit_code(),
    }
}
