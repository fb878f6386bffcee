//! Run configuration.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use walkdir::WalkDir;

use crate::cache::DEFAULT_CACHE_FILE;
use crate::errors::{ManitestError, Result};

/// Marker every test file name carries in directory mode.
pub const TEST_FILE_MARKER: &str = ".manitest.";

/// When to color terminal output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Color when stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

/// Everything one `manitest test` invocation needs to know.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Test files, or directories when `whole_dir` is set.
    pub targets: Vec<PathBuf>,
    /// Extra import search directories, in order.
    pub library_paths: Vec<PathBuf>,
    pub write_fixtures: bool,
    pub cache: bool,
    pub cache_file: PathBuf,
    pub whole_dir: bool,
    pub emit_all_traces: bool,
    pub color: ColorMode,
    /// Command line, minus targets, shown in rerun hints.
    pub rerun_command: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            library_paths: Vec::new(),
            write_fixtures: false,
            cache: false,
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            whole_dir: false,
            emit_all_traces: false,
            color: ColorMode::Auto,
            rerun_command: vec!["manitest".to_string(), "test".to_string()],
        }
    }
}

impl RunConfig {
    /// The test files to run, in order.
    ///
    /// In directory mode each target contributes its regular files whose
    /// name contains [`TEST_FILE_MARKER`], sorted by name, without recursing.
    pub fn test_files(&self) -> Result<Vec<PathBuf>> {
        if !self.whole_dir {
            return Ok(self.targets.clone());
        }
        let mut files = Vec::new();
        for dir in &self.targets {
            files.extend(discover_test_files(dir)?);
        }
        Ok(files)
    }
}

/// Test files directly inside `dir`.
pub fn discover_test_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            ManitestError::io(dir, source)
        })?;
        let is_test = entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.contains(TEST_FILE_MARKER));
        if is_test {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
