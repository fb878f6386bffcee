//! Per-case capture of evaluator trace output.
//!
//! The evaluator writes traces into a [`TraceSink`]. While a case is being
//! manifested the sink appends to that case's scope; outside of any scope
//! writes fall through to stderr. Each scope is opened by
//! manifestation-started and closed by manifestation-completed, and its text
//! is kept until the case's result is annotated.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;

use crate::errors::Result;
use crate::expectation::TestCaseResult;

use super::TestVisitor;

struct TraceScope {
    case: String,
    buffer: Vec<u8>,
}

#[derive(Default)]
struct TraceState {
    active: Option<TraceScope>,
    /// Closed scopes of the current file, by case name.
    captured: HashMap<String, String>,
}

impl TraceState {
    fn open(&mut self, case: &str) {
        self.close();
        self.active = Some(TraceScope {
            case: case.to_string(),
            buffer: Vec::new(),
        });
    }

    fn close(&mut self) {
        if let Some(scope) = self.active.take() {
            let text = String::from_utf8_lossy(&scope.buffer).into_owned();
            self.captured.entry(scope.case).or_default().push_str(&text);
        }
    }
}

/// Writer handed to the evaluator as its trace output.
#[derive(Clone)]
pub struct TraceSink {
    state: Rc<RefCell<TraceState>>,
}

impl Write for TraceSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.state.borrow_mut().active.as_mut() {
            Some(scope) => {
                scope.buffer.extend_from_slice(buf);
                Ok(buf.len())
            }
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.state.borrow().active.is_none() {
            io::stderr().flush()?;
        }
        Ok(())
    }
}

/// Attaches captured trace text to results: failed ones always, passed ones
/// only when `emit_all` is set.
#[derive(Default)]
pub struct TraceVisitor {
    state: Rc<RefCell<TraceState>>,
    emit_all: bool,
}

impl TraceVisitor {
    pub fn new(emit_all: bool) -> Self {
        Self {
            state: Rc::default(),
            emit_all,
        }
    }

    /// A writer feeding this visitor's scopes.
    pub fn sink(&self) -> TraceSink {
        TraceSink {
            state: self.state.clone(),
        }
    }
}

impl TestVisitor for TraceVisitor {
    fn test_file_started(&mut self, _file: &Path) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.active = None;
        state.captured.clear();
        Ok(())
    }

    fn test_case_manifestation_started(&mut self, _file: &Path, case: &str) -> Result<()> {
        self.state.borrow_mut().open(case);
        Ok(())
    }

    fn test_case_manifestation_completed(&mut self, _file: &Path, _case: &str) -> Result<()> {
        self.state.borrow_mut().close();
        Ok(())
    }

    fn annotate_result(&mut self, _file: &Path, case: &str, result: &mut TestCaseResult) {
        let Some(text) = self.state.borrow_mut().captured.remove(case) else {
            return;
        };
        if !text.is_empty() && (!result.success || self.emit_all) {
            result.trace = Some(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CaseError;

    fn traced(visitor: &mut TraceVisitor, case: &str, text: &str) {
        let mut sink = visitor.sink();
        visitor
            .test_case_manifestation_started(Path::new("f"), case)
            .unwrap();
        write!(sink, "{text}").unwrap();
        visitor
            .test_case_manifestation_completed(Path::new("f"), case)
            .unwrap();
    }

    #[test]
    fn traces_stay_with_their_case() {
        let mut visitor = TraceVisitor::new(false);
        visitor.test_file_started(Path::new("f")).unwrap();
        traced(&mut visitor, "a", "from a\n");
        traced(&mut visitor, "b", "from b\n");

        let mut b = TestCaseResult::failed(CaseError::failed("values don't match"));
        visitor.annotate_result(Path::new("f"), "b", &mut b);
        assert_eq!(b.trace.as_deref(), Some("from b\n"));

        let mut a = TestCaseResult::failed(CaseError::failed("values don't match"));
        visitor.annotate_result(Path::new("f"), "a", &mut a);
        assert_eq!(a.trace.as_deref(), Some("from a\n"));
    }

    #[test]
    fn passing_cases_only_get_traces_when_asked() {
        let mut quiet = TraceVisitor::new(false);
        traced(&mut quiet, "a", "noise\n");
        let mut result = TestCaseResult::passed();
        quiet.annotate_result(Path::new("f"), "a", &mut result);
        assert_eq!(result.trace, None);

        let mut loud = TraceVisitor::new(true);
        traced(&mut loud, "a", "noise\n");
        let mut result = TestCaseResult::passed();
        loud.annotate_result(Path::new("f"), "a", &mut result);
        assert_eq!(result.trace.as_deref(), Some("noise\n"));
    }

    #[test]
    fn writes_outside_a_scope_are_not_captured() {
        let mut visitor = TraceVisitor::new(true);
        let mut sink = visitor.sink();
        sink.write_all(b"stray\n").unwrap();
        traced(&mut visitor, "a", "");

        let mut result = TestCaseResult::passed();
        visitor.annotate_result(Path::new("f"), "a", &mut result);
        assert_eq!(result.trace, None);
    }

    #[test]
    fn new_file_discards_old_captures() {
        let mut visitor = TraceVisitor::new(true);
        traced(&mut visitor, "a", "old\n");
        visitor.test_file_started(Path::new("g")).unwrap();

        let mut result = TestCaseResult::passed();
        visitor.annotate_result(Path::new("g"), "a", &mut result);
        assert_eq!(result.trace, None);
    }
}
