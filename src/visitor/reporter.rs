//! Human-readable progress and summaries.

use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use termcolor::{Color, WriteColor};

use crate::cli::output::{indent, write_colored, write_diff};
use crate::errors::{ManitestError, Result};
use crate::expectation::canonical::normalize_plain_text;
use crate::expectation::TestCaseResult;

use super::TestVisitor;

const DETAIL_INDENT: &str = "      ";
const RULE: &str = "--------------------------------------------------------";

/// Counters of the file being processed. Reset at every file-started.
#[derive(Debug, Default, Clone, Copy)]
struct FileTally {
    total: usize,
    passes: usize,
    failures: usize,
    invalid: usize,
    cached: bool,
    file_invalid: bool,
}

/// Counters across the whole run.
#[derive(Debug, Default, Clone, Copy)]
struct RunTally {
    files: usize,
    passed: usize,
    failed: usize,
    invalid: usize,
    cached: usize,
}

impl RunTally {
    fn absorb(&mut self, file: &FileTally) {
        self.files += 1;
        if file.invalid > 0 || file.file_invalid {
            self.invalid += 1;
        } else if file.failures > 0 {
            self.failed += 1;
        } else {
            self.passed += 1;
        }
        if file.cached {
            self.cached += 1;
        }
    }
}

/// Renders progress for every file and case, and a summary at the end.
pub struct ReporterVisitor {
    out: Box<dyn WriteColor>,
    rerun_command: Vec<String>,
    file: FileTally,
    run: RunTally,
    manifest_start: Option<Instant>,
}

impl ReporterVisitor {
    pub fn new(out: Box<dyn WriteColor>) -> Self {
        Self {
            out,
            rerun_command: vec!["manitest".to_string(), "test".to_string()],
            file: FileTally::default(),
            run: RunTally::default(),
            manifest_start: None,
        }
    }

    /// Command line, without targets, suggested for rerunning a single file.
    pub fn with_rerun_command(mut self, command: Vec<String>) -> Self {
        self.rerun_command = command;
        self
    }

    // =====================
    // Rendering
    // =====================

    fn write_case(&mut self, file: &Path, case: &str, result: &TestCaseResult) -> io::Result<()> {
        if result.cached {
            self.file.cached = true;
            let mark = if result.success { "✔️" } else { "⨯" };
            return writeln!(self.out, "  {mark}  {} (all tests) (cached)", file.display());
        }

        self.file.total += 1;
        if result.success {
            self.file.passes += 1;
            writeln!(self.out, "  ✔️  {case}")?;
        } else if result.is_invalid() {
            self.file.invalid += 1;
            writeln!(self.out, "💥  Invalid test case {case}")?;
            if let Some(error) = &result.error {
                writeln!(self.out, "{DETAIL_INDENT}{error}")?;
            }
        } else {
            self.file.failures += 1;
            self.write_failure(case, result)?;
        }

        if let Some(trace) = &result.trace {
            writeln!(self.out, "{}", indent(trace, DETAIL_INDENT))?;
        }
        Ok(())
    }

    fn write_failure(&mut self, case: &str, result: &TestCaseResult) -> io::Result<()> {
        write!(self.out, "  ❌  {case} ")?;
        write_colored(self.out.as_mut(), Color::Red, "failed")?;
        if let Some(fixture) = &result.fixture_path {
            write!(self.out, " ")?;
            write_colored(self.out.as_mut(), Color::Yellow, &fixture.display().to_string())?;
        }
        writeln!(self.out)?;
        if let Some(error) = &result.error {
            writeln!(self.out, "{DETAIL_INDENT}{error}")?;
        }

        let expected = normalize_plain_text(&result.expected_canonical);
        let actual = normalize_plain_text(&result.actual_canonical);
        if expected != actual {
            write_diff(self.out.as_mut(), &expected, &actual, DETAIL_INDENT)?;
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn write_file_summary(&mut self, file: &Path) -> io::Result<()> {
        let tally = self.file;
        let mut parts = vec![
            (Color::White, format!("{} {} tested", tally.total, plural(tally.total, "test", "tests"))),
            (Color::Blue, format!("{} passed", tally.passes)),
        ];
        if tally.failures > 0 {
            parts.push((Color::Yellow, format!("{} failed", tally.failures)));
        }
        if tally.invalid > 0 {
            parts.push((Color::Red, format!("{} invalid", tally.invalid)));
        }
        if tally.cached {
            parts.push((Color::Blue, "cached".to_string()));
        }
        write!(self.out, "  ")?;
        self.write_parts(&parts)?;
        writeln!(self.out, "\n")?;

        if tally.failures > 0 || tally.invalid > 0 || tally.file_invalid {
            self.write_rerun_hint(file)?;
        }
        Ok(())
    }

    fn write_rerun_hint(&mut self, file: &Path) -> io::Result<()> {
        let mut command: Vec<String> = self.rerun_command.iter().map(|arg| shell_quote(arg)).collect();
        command.push(shell_quote(&file.display().to_string()));

        writeln!(self.out, "{DETAIL_INDENT}To rerun this test on its own, use the following command:")?;
        write!(self.out, "{DETAIL_INDENT}")?;
        write_colored(self.out.as_mut(), Color::Cyan, &command.join(" "))?;
        writeln!(self.out, "\n")?;
        write!(self.out, "{DETAIL_INDENT}")?;
        write_colored(
            self.out.as_mut(),
            Color::Magenta,
            "NOTE: adding the --write-fixtures will auto-update the fixtures based on the actual values.",
        )?;
        writeln!(self.out, "\n")
    }

    fn write_run_summary(&mut self) -> io::Result<()> {
        let run = self.run;
        let files = |n: usize| plural(n, "file", "files");
        let mut icon = "✅";
        let mut parts = vec![
            (Color::White, format!("{} {} tested", run.files, files(run.files))),
            (Color::Blue, format!("{} {} passed", run.passed, files(run.passed))),
        ];
        if run.failed > 0 {
            icon = "❌";
            parts.push((Color::Yellow, format!("{} {} failed", run.failed, files(run.failed))));
        }
        if run.invalid > 0 {
            icon = "💥";
            parts.push((Color::Red, format!("{} {} invalid", run.invalid, files(run.invalid))));
        }
        if run.cached > 0 {
            parts.push((Color::Cyan, format!("{} {} cached", run.cached, files(run.cached))));
        }

        writeln!(self.out, "{RULE}")?;
        write!(self.out, "{icon} Test suite completed: ")?;
        self.write_parts(&parts)?;
        writeln!(self.out, "\n")?;
        self.out.flush()
    }

    fn write_parts(&mut self, parts: &[(Color, String)]) -> io::Result<()> {
        for (i, (color, text)) in parts.iter().enumerate() {
            if i > 0 {
                write!(self.out, ", ")?;
            }
            write_colored(self.out.as_mut(), *color, text)?;
        }
        Ok(())
    }
}

impl TestVisitor for ReporterVisitor {
    fn test_file_started(&mut self, file: &Path) -> Result<()> {
        self.file = FileTally::default();
        writeln!(self.out, "▶️  Executing test file {}", file.display()).map_err(output_error)
    }

    fn test_file_invalid(&mut self, file: &Path, error: &ManitestError) -> Result<()> {
        self.file.file_invalid = true;
        writeln!(self.out, "💥  Invalid test {}\n{error}", file.display()).map_err(output_error)
    }

    fn test_file_completed(&mut self, file: &Path, _all_successful: bool) -> Result<()> {
        let tally = self.file;
        self.run.absorb(&tally);
        self.write_file_summary(file).map_err(output_error)
    }

    fn test_case_manifestation_started(&mut self, _file: &Path, _case: &str) -> Result<()> {
        self.manifest_start = Some(Instant::now());
        Ok(())
    }

    fn test_case_manifestation_completed(&mut self, _file: &Path, case: &str) -> Result<()> {
        let Some(started) = self.manifest_start.take() else {
            return Ok(());
        };
        if case.is_empty() {
            return Ok(());
        }
        writeln!(
            self.out,
            "  ➡️  {case} manifestation completed in {}ms",
            started.elapsed().as_millis()
        )
        .map_err(output_error)
    }

    fn test_case_evaluation_completed(
        &mut self,
        file: &Path,
        case: &str,
        result: &TestCaseResult,
    ) -> Result<()> {
        self.write_case(file, case, result).map_err(output_error)
    }

    fn all_tests_completed(&mut self) -> Result<()> {
        self.write_run_summary().map_err(output_error)
    }
}

fn output_error(e: io::Error) -> ManitestError {
    ManitestError::Visitor(format!("unable to write report: {e}"))
}

fn plural<'a>(count: usize, singular: &'a str, plural: &'a str) -> &'a str {
    if count == 1 {
        singular
    } else {
        plural
    }
}

/// Single-quotes `arg` when a POSIX shell would otherwise split or expand it.
fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\"'\"'"))
    }
}
