use std::io::Write;

use crate::builders::pipeline::StderrEntry;
use crate::core::config::FormatterSpec;

/// Counters collected over one run.
///
/// This provides a clean way to pass run totals from the `FormatEngine`
/// to the `ProgressReporter`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Candidate files that were evaluated against the formatters.
    pub files_checked: usize,
    /// Files whose content was changed by their pipeline.
    pub files_reformatted: usize,
    /// Working-tree files that were left alone because they diverged.
    pub warnings: usize,
}

/// Receives the user-facing events of a run.
///
/// The engine and the pipeline only describe what happened; the reporter
/// decides what the user gets to see. Warnings and formatter stderr must
/// always be shown, progress only when asked for.
pub trait ProgressReporter {
    /// A formatter is about to receive `path`'s content.
    fn piping_through(&self, path: &str, formatter: &FormatterSpec, command: &str);

    /// `path` was changed by the listed formatters.
    fn reformatted(&self, path: &str, formatters: &[String]);

    /// A formatter wrote to its error stream.
    fn formatter_stderr(&self, entry: &StderrEntry);

    /// A non-fatal problem, such as a diverged working-tree file.
    fn warning(&self, message: &str);

    /// The run finished successfully.
    fn summary(&self, summary: &RunSummary);
}

/// Prints progress to stdout and warnings to stderr.
///
/// This is the reporter used by the command-line binary. Progress lines only
/// appear in verbose mode.
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleReporter {
    fn piping_through(&self, _path: &str, _formatter: &FormatterSpec, command: &str) {
        if self.verbose {
            println!("Piping through: {command}");
        }
    }

    fn reformatted(&self, path: &str, formatters: &[String]) {
        if self.verbose {
            println!("Reformatted {path} with {}", formatters.join(", "));
        }
    }

    /// Formatter stderr is passed through byte for byte, never swallowed.
    fn formatter_stderr(&self, entry: &StderrEntry) {
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(&entry.text);
        if !entry.text.ends_with(b"\n") {
            let _ = stderr.write_all(b"\n");
        }
    }

    fn warning(&self, message: &str) {
        eprintln!("{message}");
    }

    fn summary(&self, summary: &RunSummary) {
        if !self.verbose {
            return;
        }

        println!("\n📈 Summary:");
        println!("  Files checked: {}", summary.files_checked);
        println!("  Files reformatted: {}", summary.files_reformatted);
        if summary.warnings > 0 {
            println!("  Working tree files left untouched: {}", summary.warnings);
        }
    }
}

/// Collects events as plain strings, for assertions in tests. Clones share
/// one message log, so a test can keep a handle after boxing the reporter.
#[cfg(test)]
#[derive(Default, Clone)]
pub struct RecordingReporter {
    messages: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
}

#[cfg(test)]
impl RecordingReporter {
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    fn push(&self, message: String) {
        self.messages.borrow_mut().push(message);
    }
}

#[cfg(test)]
impl ProgressReporter for RecordingReporter {
    fn piping_through(&self, path: &str, _formatter: &FormatterSpec, command: &str) {
        self.push(format!("piping {path} through {command}"));
    }

    fn reformatted(&self, path: &str, formatters: &[String]) {
        self.push(format!("reformatted {path} with {}", formatters.join(", ")));
    }

    fn formatter_stderr(&self, entry: &StderrEntry) {
        let text = String::from_utf8_lossy(&entry.text);
        self.push(format!("stderr from {}: {}", entry.formatter, text.trim_end()));
    }

    fn warning(&self, message: &str) {
        self.push(message.to_string());
    }

    fn summary(&self, summary: &RunSummary) {
        self.push(format!(
            "summary: {} checked, {} reformatted, {} warnings",
            summary.files_checked, summary.files_reformatted, summary.warnings
        ));
    }
}
