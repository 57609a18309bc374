//! Thread-safe diagnostic accumulator with suppression.

use crate::code::DiagnosticCode;
use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A thread-safe accumulator for diagnostics.
///
/// Parallel delay-calc and search workers emit concurrently via
/// [`emit`](Self::emit). Suppression is by stable numeric id; suppressed
/// diagnostics are dropped at emission. [`emit_once`](Self::emit_once)
/// deduplicates per (code, object) so fallback warnings fire once per
/// offending net rather than once per analysis point.
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    suppressed: Mutex<HashSet<u16>>,
    emitted_once: Mutex<HashSet<(DiagnosticCode, Option<String>)>>,
    error_count: AtomicUsize,
}

impl DiagnosticSink {
    /// Creates a new empty sink.
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            suppressed: Mutex::new(HashSet::new()),
            emitted_once: Mutex::new(HashSet::new()),
            error_count: AtomicUsize::new(0),
        }
    }

    /// Suppresses all diagnostics with the given numeric id.
    pub fn suppress(&self, number: u16) {
        self.suppressed.lock().unwrap().insert(number);
    }

    /// Removes a suppression.
    pub fn unsuppress(&self, number: u16) {
        self.suppressed.lock().unwrap().remove(&number);
    }

    /// True if the given numeric id is suppressed.
    pub fn is_suppressed(&self, number: u16) -> bool {
        self.suppressed.lock().unwrap().contains(&number)
    }

    /// Emits a diagnostic unless its code is suppressed.
    pub fn emit(&self, diag: Diagnostic) {
        if self.is_suppressed(diag.code.number) {
            return;
        }
        if diag.severity == Severity::Error {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        self.diagnostics.lock().unwrap().push(diag);
    }

    /// Emits a diagnostic at most once per (code, object) pair.
    pub fn emit_once(&self, diag: Diagnostic) {
        let key = (diag.code, diag.object.clone());
        if !self.emitted_once.lock().unwrap().insert(key) {
            return;
        }
        self.emit(diag);
    }

    /// True if any error-severity diagnostics have been emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count.load(Ordering::Relaxed) > 0
    }

    /// The number of error-severity diagnostics emitted so far.
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Takes all accumulated diagnostics, leaving the sink empty.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock().unwrap())
    }

    /// A snapshot of all accumulated diagnostics without draining.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().unwrap().clone()
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    fn loop_warning() -> Diagnostic {
        Diagnostic::warning(
            DiagnosticCode::new(Category::Graph, 100),
            "combinational loop broken",
        )
    }

    #[test]
    fn empty_sink() {
        let sink = DiagnosticSink::new();
        assert!(!sink.has_errors());
        assert!(sink.take_all().is_empty());
    }

    #[test]
    fn emit_and_drain() {
        let sink = DiagnosticSink::new();
        sink.emit(loop_warning());
        assert_eq!(sink.diagnostics().len(), 1);
        assert_eq!(sink.take_all().len(), 1);
        assert!(sink.take_all().is_empty());
    }

    #[test]
    fn suppression_by_number() {
        let sink = DiagnosticSink::new();
        sink.suppress(100);
        sink.emit(loop_warning());
        assert!(sink.diagnostics().is_empty());
        sink.unsuppress(100);
        sink.emit(loop_warning());
        assert_eq!(sink.diagnostics().len(), 1);
    }

    #[test]
    fn emit_once_deduplicates() {
        let sink = DiagnosticSink::new();
        for _ in 0..3 {
            sink.emit_once(loop_warning().with_object("u1/n42"));
        }
        assert_eq!(sink.diagnostics().len(), 1);
        // A different object is a different key.
        sink.emit_once(loop_warning().with_object("u1/n43"));
        assert_eq!(sink.diagnostics().len(), 2);
    }

    #[test]
    fn error_count_tracked() {
        let sink = DiagnosticSink::new();
        sink.emit(Diagnostic::error(
            DiagnosticCode::new(Category::Graph, 900),
            "level overflow",
        ));
        assert!(sink.has_errors());
        assert_eq!(sink.error_count(), 1);
    }

    #[test]
    fn thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let sink = Arc::new(DiagnosticSink::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let sink = Arc::clone(&sink);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    sink.emit(loop_warning());
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(sink.diagnostics().len(), 800);
    }
}
