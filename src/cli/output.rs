//! Handles all user-facing output for the CLI.
//!
//! Progress and summaries are written through [`WriteColor`] so the same code
//! renders to a colored terminal or to an in-memory [`OutputBuffer`].

// ============================================================================
// OUTPUT SINKS
// ============================================================================

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use difference::{Changeset, Difference};
use termcolor::{Buffer, Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::config::ColorMode;

/// Collects output in memory, for tests and programmatic capture.
/// Clones share the same buffer.
#[derive(Clone)]
pub struct OutputBuffer {
    buffer: Rc<RefCell<Buffer>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self {
            buffer: Rc::new(RefCell::new(Buffer::no_color())),
        }
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(self.buffer.borrow().as_slice()).into_owned()
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.buffer.borrow_mut().flush()
    }
}

impl WriteColor for OutputBuffer {
    fn supports_color(&self) -> bool {
        self.buffer.borrow().supports_color()
    }

    fn set_color(&mut self, spec: &ColorSpec) -> io::Result<()> {
        self.buffer.borrow_mut().set_color(spec)
    }

    fn reset(&mut self) -> io::Result<()> {
        self.buffer.borrow_mut().reset()
    }
}

/// Stdout with colors resolved from `mode`.
pub fn stdout(mode: ColorMode) -> StandardStream {
    let choice = match mode {
        ColorMode::Always => ColorChoice::Always,
        ColorMode::Never => ColorChoice::Never,
        ColorMode::Auto if atty::is(atty::Stream::Stdout) => ColorChoice::Auto,
        ColorMode::Auto => ColorChoice::Never,
    };
    StandardStream::stdout(choice)
}

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Writes `text` in `color`, then resets.
pub fn write_colored(out: &mut dyn WriteColor, color: Color, text: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)))?;
    write!(out, "{text}")?;
    out.reset()
}

/// Writes a line diff from `expected` to `actual`, each line prefixed by
/// `indent`. Removed lines are red, added lines yellow.
pub fn write_diff(
    out: &mut dyn WriteColor,
    expected: &str,
    actual: &str,
    indent: &str,
) -> io::Result<()> {
    let changeset = Changeset::new(expected, actual, "\n");
    for diff in &changeset.diffs {
        match diff {
            Difference::Same(x) => {
                for line in x.lines() {
                    writeln!(out, "{indent} {line}")?;
                }
            }
            Difference::Add(x) => {
                for line in x.lines() {
                    write!(out, "{indent}")?;
                    write_colored(out, Color::Yellow, &format!("+{line}"))?;
                    writeln!(out)?;
                }
            }
            Difference::Rem(x) => {
                for line in x.lines() {
                    write!(out, "{indent}")?;
                    write_colored(out, Color::Red, &format!("-{line}"))?;
                    writeln!(out)?;
                }
            }
        }
    }
    Ok(())
}

/// Prefixes every line of `text` with `indent`.
pub fn indent(text: &str, indent: &str) -> String {
    text.lines()
        .map(|line| format!("{indent}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_clones_share_contents() {
        let buffer = OutputBuffer::new();
        let mut writer = buffer.clone();
        write_colored(&mut writer, Color::Green, "ok").unwrap();
        assert_eq!(buffer.contents(), "ok");
    }

    #[test]
    fn diff_marks_removed_and_added_lines() {
        let mut out = OutputBuffer::new();
        write_diff(&mut out, "a\nb\nc", "a\nx\nc", "  ").unwrap();
        let text = out.contents();
        assert!(text.contains("   a\n"));
        assert!(text.contains("  -b\n"));
        assert!(text.contains("  +x\n"));
        assert!(text.find("-b").unwrap() < text.find("+x").unwrap());
    }

    #[test]
    fn indent_prefixes_each_line() {
        assert_eq!(indent("a\nb", "  "), "  a\n  b");
    }
}
