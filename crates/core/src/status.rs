//! Per-plugin status reporting
//!
//! Every plugin handle owns a [`StatusReporter`]. Reporters render through a
//! shared [`StatusSink`], tagged with the plugin id so concurrent output can
//! be attributed.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Severity of a terminal status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Info,
    Error,
    Success,
    /// Reported, then the process ends with exit code 1
    Fatal,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Error => write!(f, "error"),
            Self::Success => write!(f, "success"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// What a reporter asks its sink to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Transient progress line, replaced by the next status
    Progress(String),
    /// Terminal line of the given kind
    Report {
        kind: StatusKind,
        text: Option<String>,
    },
    /// Finalizes the current transient line
    Clear,
}

/// Output device for status events
pub trait StatusSink: Send + Sync {
    fn emit(&self, source: &str, event: &StatusEvent);

    /// Flushes buffered output. Called before termination.
    fn flush(&self) {}

    /// Ends the process after a fatal status
    fn terminate(&self, code: i32) {
        std::process::exit(code)
    }
}

/// Sink that records events instead of printing them.
///
/// `terminate` records the exit code rather than exiting, which lets
/// embedders and tests observe fatal statuses.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<(String, StatusEvent)>>,
    exit_codes: Mutex<Vec<i32>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, StatusEvent)> {
        self.events.lock().clone()
    }

    /// Events emitted by one plugin
    pub fn events_for(&self, source: &str) -> Vec<StatusEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(s, _)| s == source)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn exit_codes(&self) -> Vec<i32> {
        self.exit_codes.lock().clone()
    }
}

impl StatusSink for MemorySink {
    fn emit(&self, source: &str, event: &StatusEvent) {
        self.events.lock().push((source.to_string(), event.clone()));
    }

    fn terminate(&self, code: i32) {
        self.exit_codes.lock().push(code);
    }
}

/// Status channel owned by a single plugin handle
pub struct StatusReporter {
    source: String,
    sink: Arc<dyn StatusSink>,
    transient: Mutex<Option<String>>,
}

impl fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusReporter")
            .field("source", &self.source)
            .field("transient", &*self.transient.lock())
            .finish()
    }
}

impl StatusReporter {
    pub fn new(source: impl Into<String>, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            source: source.into(),
            sink,
            transient: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Reports a status line.
    ///
    /// - text without kind: transient progress line
    /// - neither text nor kind: finalizes the transient line, if any
    /// - any kind: terminal line; `Fatal` flushes and terminates with 1
    pub fn set_status(&self, text: Option<&str>, kind: Option<StatusKind>) {
        match (text, kind) {
            (None, None) => {
                if self.transient.lock().take().is_some() {
                    self.sink.emit(&self.source, &StatusEvent::Clear);
                }
            }
            (Some(text), None) => {
                *self.transient.lock() = Some(text.to_string());
                self.sink
                    .emit(&self.source, &StatusEvent::Progress(text.to_string()));
            }
            (text, Some(kind)) => {
                self.transient.lock().take();
                self.sink.emit(
                    &self.source,
                    &StatusEvent::Report {
                        kind,
                        text: text.map(str::to_string),
                    },
                );
                if kind == StatusKind::Fatal {
                    self.sink.flush();
                    self.sink.terminate(1);
                }
            }
        }
    }

    pub fn progress(&self, text: &str) {
        self.set_status(Some(text), None);
    }

    pub fn info(&self, text: &str) {
        self.set_status(Some(text), Some(StatusKind::Info));
    }

    pub fn error(&self, text: &str) {
        self.set_status(Some(text), Some(StatusKind::Error));
    }

    pub fn success(&self, text: &str) {
        self.set_status(Some(text), Some(StatusKind::Success));
    }

    pub fn fatal(&self, text: &str) {
        self.set_status(Some(text), Some(StatusKind::Fatal));
    }

    pub fn done(&self) {
        self.set_status(None, None);
    }

    /// Text of the active transient line
    pub fn current(&self) -> Option<String> {
        self.transient.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter() -> (Arc<MemorySink>, StatusReporter) {
        let sink = Arc::new(MemorySink::new());
        let reporter = StatusReporter::new("plugin-a", sink.clone());
        (sink, reporter)
    }

    #[test]
    fn test_progress_then_clear() {
        let (sink, reporter) = reporter();
        reporter.progress("Working");
        assert_eq!(reporter.current().as_deref(), Some("Working"));

        reporter.done();
        assert!(reporter.current().is_none());

        assert_eq!(
            sink.events_for("plugin-a"),
            vec![
                StatusEvent::Progress("Working".to_string()),
                StatusEvent::Clear
            ]
        );
    }

    #[test]
    fn test_clear_without_transient_is_silent() {
        let (sink, reporter) = reporter();
        reporter.done();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_terminal_kinds_do_not_terminate() {
        let (sink, reporter) = reporter();
        reporter.info("i");
        reporter.error("e");
        reporter.success("s");
        assert!(sink.exit_codes().is_empty());
        assert_eq!(sink.events().len(), 3);
    }

    #[test]
    fn test_fatal_terminates_with_code_one() {
        let (sink, reporter) = reporter();
        reporter.progress("Installing");
        reporter.fatal("boom");

        assert_eq!(sink.exit_codes(), vec![1]);
        assert!(reporter.current().is_none());
        assert_eq!(
            sink.events().last().map(|(_, e)| e.clone()),
            Some(StatusEvent::Report {
                kind: StatusKind::Fatal,
                text: Some("boom".to_string())
            })
        );
    }
}
