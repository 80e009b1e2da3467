use anyhow::{Context, Result};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use thiserror::Error;

use crate::builders::patterns::{decide, PatternEntry, PatternSign};
use crate::builders::reporter::ProgressReporter;
use crate::core::config::FormatterSpec;

/// Placeholder in a formatter command that is replaced with the file path.
const PATH_PLACEHOLDER: &str = "{}";

/// Everything a formatter process produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs one formatter command with the given bytes on stdin.
///
/// This is the seam between the pipeline and process spawning; tests plug in
/// closures or scripted runners instead of real processes.
pub trait FormatterRunner {
    fn run_command(&self, command: &str, input: &[u8]) -> Result<CommandOutput>;
}

impl<F> FormatterRunner for F
where
    F: Fn(&str, &[u8]) -> Result<CommandOutput>,
{
    fn run_command(&self, command: &str, input: &[u8]) -> Result<CommandOutput> {
        self(command, input)
    }
}

/// Runs formatter commands through the system shell, from the repository root.
pub struct ShellRunner {
    workdir: PathBuf,
}

impl ShellRunner {
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }

    fn shell_command(&self, command: &str) -> Command {
        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        };
        #[cfg(not(windows))]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        };
        cmd.current_dir(&self.workdir);
        cmd
    }
}

impl FormatterRunner for ShellRunner {
    /// Spawns the command and feeds `input` to it from a scoped writer thread
    /// while stdout and stderr are drained, so no pipe buffer can fill up and
    /// deadlock either side. The child is reaped by `wait_with_output` and the
    /// writer is joined before returning.
    fn run_command(&self, command: &str, input: &[u8]) -> Result<CommandOutput> {
        let mut child = self
            .shell_command(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start formatter command: {command}"))?;

        let stdin = child.stdin.take();
        let (output, written) = thread::scope(|scope| {
            let writer = scope.spawn(move || -> std::io::Result<()> {
                let Some(mut stdin) = stdin else {
                    return Ok(());
                };
                // A formatter may exit without reading all of its input.
                match stdin.write_all(input) {
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                }
            });
            let output = child.wait_with_output();
            (output, writer.join())
        });

        let output = output
            .with_context(|| format!("Failed to wait for formatter command: {command}"))?;
        match written {
            Ok(result) => result
                .with_context(|| format!("Failed to write to formatter command: {command}"))?,
            Err(_) => anyhow::bail!("Writer thread for formatter command panicked: {command}"),
        }

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Error-stream output captured from one formatter, byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StderrEntry {
    pub formatter: String,
    pub text: Vec<u8>,
}

/// A formatter exited non-zero, aborting the pipeline for `path`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Formatter '{formatter}' failed on {path} ({})", describe_exit(.exit_code))]
pub struct FormatterFailure {
    pub formatter: String,
    pub path: String,
    pub exit_code: Option<i32>,
    pub stderr: String,
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// The result of threading one file through its pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub final_content: Vec<u8>,
    /// True when `final_content` differs from the original, byte for byte.
    pub changed: bool,
    /// Error-stream text of every formatter that ran, in pipeline order.
    pub stderr_entries: Vec<StderrEntry>,
    pub failure: Option<FormatterFailure>,
    /// Every writable formatter that ran, in pipeline order.
    pub contributors: Vec<String>,
}

impl PipelineOutcome {
    fn unchanged(original: &[u8]) -> Self {
        Self {
            final_content: original.to_vec(),
            changed: false,
            stderr_entries: Vec::new(),
            failure: None,
            contributors: Vec::new(),
        }
    }
}

/// Threads file content through the formatters that match it.
pub struct PipelineExecutor<'a> {
    runner: &'a dyn FormatterRunner,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> PipelineExecutor<'a> {
    pub fn new(runner: &'a dyn FormatterRunner, reporter: &'a dyn ProgressReporter) -> Self {
        Self { runner, reporter }
    }

    /// Picks the formatters whose resolved patterns match `path`, keeping
    /// declaration order. Each decision and its reason goes to the debug trace.
    pub fn select<'f>(&self, path: &str, formatters: &'f [FormatterSpec]) -> Vec<&'f FormatterSpec> {
        let mut selected = Vec::new();

        for formatter in formatters {
            let decision = decide(path, &formatter.patterns);
            for line in decision_trace(&formatter.name, decision) {
                log::debug!("{line}");
            }
            if decision.is_some_and(|p| p.sign == PatternSign::Include) {
                selected.push(formatter);
            }
        }

        if selected.is_empty() {
            log::debug!("  No formatters match - skipping");
        }
        selected
    }

    /// Runs the pipeline for one file.
    ///
    /// Formatters run strictly one after another, each reading the previous
    /// one's stdout. A readonly formatter's stdout is discarded; it only gets
    /// to pass or fail. The first non-zero exit stops the pipeline and is
    /// recorded in `failure`. Later formatters never run.
    ///
    /// # Returns
    /// The outcome, or an error if a formatter process could not be run at all.
    pub fn run(
        &self,
        path: &str,
        original: &[u8],
        formatters: &[FormatterSpec],
    ) -> Result<PipelineOutcome> {
        let selected = self.select(path, formatters);
        let mut outcome = PipelineOutcome::unchanged(original);
        if selected.is_empty() {
            return Ok(outcome);
        }

        let mut current = original.to_vec();
        for formatter in selected {
            let command = expand_placeholder(&formatter.command, path);
            self.reporter.piping_through(path, formatter, &command);

            let output = self.runner.run_command(&command, &current)?;
            if !output.stderr.is_empty() {
                outcome.stderr_entries.push(StderrEntry {
                    formatter: formatter.name.clone(),
                    text: output.stderr.clone(),
                });
            }

            if !output.success() {
                log::debug!("  Formatter '{}' failed: {}", formatter.name, describe_exit(&output.exit_code));
                outcome.failure = Some(FormatterFailure {
                    formatter: formatter.name.clone(),
                    path: path.to_string(),
                    exit_code: output.exit_code,
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                });
                return Ok(outcome);
            }

            if formatter.readonly {
                log::debug!("  Formatter '{}' is readonly, check passed", formatter.name);
                continue;
            }

            outcome.contributors.push(formatter.name.clone());
            current = output.stdout;
        }

        outcome.changed = current != original;
        outcome.final_content = current;
        if outcome.changed {
            self.reporter.reformatted(path, &outcome.contributors);
        }
        Ok(outcome)
    }
}

/// Debug trace lines for one formatter's decision on a path. Only matching
/// formatters are named; an exclusion is a single line.
fn decision_trace(formatter: &str, decision: Option<&PatternEntry>) -> Vec<String> {
    match decision {
        Some(pattern) if pattern.sign == PatternSign::Include => vec![
            format!("  Formatter '{formatter}' matches"),
            format!("    Decision: INCLUDE (pattern '{pattern}')"),
        ],
        Some(pattern) => vec![format!("    Decision: EXCLUDE (pattern '{pattern}')")],
        None => vec!["    Decision: EXCLUDE (no pattern matched)".to_string()],
    }
}

/// Replaces `{}` in a command with the shell-quoted path.
pub fn expand_placeholder(command: &str, path: &str) -> String {
    if command.contains(PATH_PLACEHOLDER) {
        command.replace(PATH_PLACEHOLDER, &shell_quote(path))
    } else {
        command.to_string()
    }
}

fn shell_quote(value: &str) -> String {
    let is_plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    if is_plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
