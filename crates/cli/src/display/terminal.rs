use std::io::Write;

use console::{Term, style};
use parking_lot::Mutex;

use orbit_core::status::{StatusEvent, StatusKind, StatusSink};

/// Renders plugin statuses on the terminal.
///
/// Progress lines are transient: on a tty the next status of any plugin
/// replaces them. Error and fatal lines go to stderr.
pub struct TerminalSink {
    stdout: Term,
    stderr: Term,
    /// Whether the last line written to stdout was a progress line
    transient: Mutex<bool>,
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalSink {
    pub fn new() -> Self {
        Self {
            stdout: Term::stdout(),
            stderr: Term::stderr(),
            transient: Mutex::new(false),
        }
    }

    fn replace_transient(&self, transient: &mut bool) {
        if *transient && self.stdout.is_term() {
            let _ = self.stdout.clear_last_lines(1);
        }
        *transient = false;
    }
}

impl StatusSink for TerminalSink {
    fn emit(&self, source: &str, event: &StatusEvent) {
        let mut transient = self.transient.lock();
        match event {
            StatusEvent::Progress(text) => {
                self.replace_transient(&mut transient);
                let _ = self.stdout.write_line(&format!(
                    "{} {}{}",
                    style("⠿").cyan(),
                    text,
                    source_suffix(source)
                ));
                *transient = true;
            }
            StatusEvent::Clear => {
                self.replace_transient(&mut transient);
            }
            StatusEvent::Report { kind, text } => {
                self.replace_transient(&mut transient);
                let Some(text) = text else {
                    return;
                };
                let line = format!("{} {}{}", marker(*kind), text, source_suffix(source));
                let _ = match kind {
                    StatusKind::Error | StatusKind::Fatal => self.stderr.write_line(&line),
                    StatusKind::Info | StatusKind::Success => self.stdout.write_line(&line),
                };
            }
        }
    }

    fn flush(&self) {
        let _ = self.stdout.flush();
        let _ = self.stderr.flush();
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
    }
}

fn marker(kind: StatusKind) -> String {
    match kind {
        StatusKind::Info => style("ℹ").blue().to_string(),
        StatusKind::Error => style("✖").red().to_string(),
        StatusKind::Success => style("✔").green().bold().to_string(),
        StatusKind::Fatal => style("✖ FATAL").red().bold().to_string(),
    }
}

/// Built-in sources stay anonymous; third-party plugins are named.
fn source_suffix(source: &str) -> String {
    if source == "orbit" || source.starts_with("@orbit/cli:") {
        String::new()
    } else {
        format!(" {}", style(format!("({source})")).dim())
    }
}
