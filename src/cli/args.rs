//! Defines the command-line arguments and subcommands for the Manitest CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::cache::DEFAULT_CACHE_FILE;
use crate::config::{ColorMode, RunConfig};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "manitest",
    version,
    about = "Fixture-driven tests for declarative configuration manifests."
)]
pub struct ManitestArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run test manifests and compare their output against fixtures.
    Test(TestArgs),
    /// Print the version.
    Version,
}

#[derive(Debug, Args)]
pub struct TestArgs {
    /// Test files to run, or directories with --dir.
    #[arg(required = true)]
    pub targets: Vec<PathBuf>,

    /// Specify an additional library search dir.
    #[arg(short = 'J', long = "jpath", value_name = "DIR")]
    pub jpath: Vec<PathBuf>,

    /// Automatically write actual values to fixtures.
    #[arg(short = 'w', long)]
    pub write_fixtures: bool,

    /// Cache tests for unchanged files to improve test speed.
    #[arg(long)]
    pub cache: bool,

    /// Where cached results are stored.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CACHE_FILE)]
    pub cache_file: PathBuf,

    /// Run all manitest declarations in each target directory.
    #[arg(short = 'd', long = "dir")]
    pub dir: bool,

    /// Show traces of passing cases too.
    #[arg(long)]
    pub emit_all_traces: bool,

    /// When to color output.
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,
}

impl TestArgs {
    /// Builds a [`RunConfig`]. `argv` is the full process command line; it
    /// is only used to derive the rerun hint.
    pub fn into_config(self, argv: &[String]) -> RunConfig {
        let targets: Vec<String> = self
            .targets
            .iter()
            .map(|t| t.display().to_string())
            .collect();
        let rerun_command = argv
            .iter()
            .enumerate()
            .filter(|(i, arg)| *i == 0 || !targets.contains(arg))
            .map(|(_, arg)| arg.clone())
            .collect();

        RunConfig {
            targets: self.targets,
            library_paths: self.jpath,
            write_fixtures: self.write_fixtures,
            cache: self.cache,
            cache_file: self.cache_file,
            whole_dir: self.dir,
            emit_all_traces: self.emit_all_traces,
            color: self.color,
            rerun_command,
        }
    }
}
