use anyhow::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::builders::patterns::{self, PatternEntry};
use crate::builders::pipeline::{FormatterRunner, PipelineExecutor, PipelineOutcome, ShellRunner};
use crate::builders::reconciler::Reconciler;
use crate::builders::reporter::{ConsoleReporter, ProgressReporter, RunSummary};
use crate::core::config::Config;
use crate::core::git::{Git2Client, GitClient};

/// How a run picks its candidate files and where it writes results.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Format changed working-tree files directly, bypassing the index.
    pub working_tree: bool,
    /// Format files with unstaged edits on disk instead of in the index.
    /// Other staged files still get the staged pass.
    pub unstaged: bool,
    /// Let the staged pass advance clean working-tree files too.
    pub update_working_tree: bool,
    /// When non-empty, only paths matching these patterns are candidates.
    pub path_filters: Vec<PatternEntry>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            working_tree: false,
            unstaged: false,
            update_working_tree: true,
            path_filters: Vec::new(),
        }
    }
}

/// Drives one invocation: enumerates candidates, runs each file's pipeline and
/// applies the reconciliation decision through the git client.
///
/// Files are processed one at a time. The first failing pipeline aborts the run;
/// files already written before it keep their new content.
pub struct FormatEngine {
    git: Box<dyn GitClient>,
    runner: Box<dyn FormatterRunner>,
    reporter: Box<dyn ProgressReporter>,
    options: RunOptions,
}

impl FormatEngine {
    /// Creates an engine for the repository at `repo_root` that runs formatters
    /// through the system shell and reports to the console.
    pub fn new(repo_root: &Path, options: RunOptions, verbose: bool) -> Result<Self> {
        let git = Git2Client::new(repo_root)?;
        let runner = ShellRunner::new(git.get_repo_root());
        Ok(Self::with_parts(
            Box::new(git),
            Box::new(runner),
            Box::new(ConsoleReporter::new(verbose)),
            options,
        ))
    }

    pub fn with_parts(
        git: Box<dyn GitClient>,
        runner: Box<dyn FormatterRunner>,
        reporter: Box<dyn ProgressReporter>,
        options: RunOptions,
    ) -> Self {
        Self {
            git,
            runner,
            reporter,
            options,
        }
    }

    /// Runs every pass the options ask for.
    ///
    /// # Returns
    /// Run totals, or the first fatal error. A formatter failure comes back as
    /// a `FormatterFailure` inside the `anyhow::Error`.
    pub fn run(&self, config: &Config) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        if self.options.working_tree {
            // The working-tree candidates already cover every unstaged file.
            let paths = self.working_tree_candidates()?;
            self.format_working_files(config, &paths, "working tree", &mut summary)?;
        } else if self.options.unstaged {
            // A file with unstaged edits is formatted on disk only; its index
            // entry keeps the content the user staged.
            let unstaged = self.git.get_unstaged_files()?;
            self.format_staged_files(config, &unstaged, &mut summary)?;
            self.format_working_files(config, &unstaged, "unstaged", &mut summary)?;
        } else {
            self.format_staged_files(config, &[], &mut summary)?;
        }

        self.reporter.summary(&summary);
        Ok(summary)
    }

    /// Formats the staged snapshot of every staged file not listed in `skip`.
    fn format_staged_files(
        &self,
        config: &Config,
        skip: &[PathBuf],
        summary: &mut RunSummary,
    ) -> Result<()> {
        let executor = PipelineExecutor::new(self.runner.as_ref(), self.reporter.as_ref());
        let reconciler = Reconciler::new(self.options.update_working_tree);

        for path in self.git.get_staged_files()? {
            let display = display_path(&path);
            if skip.contains(&path) || !self.is_candidate(&display) {
                continue;
            }
            log::debug!("Processing staged file: {display}");
            summary.files_checked += 1;

            let staged = self.git.read_staged_file_content(&path)?;
            let outcome = executor.run(&display, &staged, &config.formatters)?;
            self.emit_stderr(&outcome);

            // Read the working tree only now, so edits made while formatters ran count.
            let working = if self.git.file_exists(&path) {
                Some(self.git.read_working_file(&path)?)
            } else {
                None
            };
            let decision = reconciler.reconcile(&display, &staged, working.as_deref(), &outcome)?;

            if decision.update_staged {
                self.git.update_staged_file_content(&path, &outcome.final_content)?;
                summary.files_reformatted += 1;
            }
            if decision.update_working {
                self.git.write_working_file(&path, &outcome.final_content)?;
            }
            if let Some(warning) = decision.warning {
                self.reporter.warning(&warning);
                summary.warnings += 1;
            }
        }

        Ok(())
    }

    /// Formats files in place on disk. The index is never touched here.
    fn format_working_files(
        &self,
        config: &Config,
        paths: &[PathBuf],
        label: &str,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let executor = PipelineExecutor::new(self.runner.as_ref(), self.reporter.as_ref());

        for path in paths {
            let display = display_path(path);
            if !self.is_candidate(&display) || !self.git.file_exists(path) {
                continue;
            }
            log::debug!("Processing {label} file: {display}");
            summary.files_checked += 1;

            let content = self.git.read_working_file(path)?;
            let outcome = executor.run(&display, &content, &config.formatters)?;
            self.emit_stderr(&outcome);
            if let Some(failure) = outcome.failure {
                return Err(failure.into());
            }

            if outcome.changed {
                self.git.write_working_file(path, &outcome.final_content)?;
                summary.files_reformatted += 1;
            }
        }

        Ok(())
    }

    /// Every changed file in the working tree: staged, unstaged or untracked.
    fn working_tree_candidates(&self) -> Result<Vec<PathBuf>> {
        let mut paths = BTreeSet::new();
        paths.extend(self.git.get_staged_files()?);
        paths.extend(self.git.get_unstaged_files()?);
        paths.extend(self.git.get_untracked_files()?);
        Ok(paths.into_iter().collect())
    }

    fn is_candidate(&self, path: &str) -> bool {
        self.options.path_filters.is_empty() || patterns::matches(path, &self.options.path_filters)
    }

    fn emit_stderr(&self, outcome: &PipelineOutcome) {
        for entry in &outcome.stderr_entries {
            self.reporter.formatter_stderr(entry);
        }
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::pipeline::{CommandOutput, FormatterFailure};
    use crate::builders::reporter::RecordingReporter;
    use crate::core::value::ConfigValue;
    use crate::builders::validator::{ConfigValidator, StandardValidator};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// An in-memory repository: staged blobs, working files and a write log.
    #[derive(Default)]
    struct MemoryRepo {
        staged: HashMap<PathBuf, Vec<u8>>,
        working: HashMap<PathBuf, Vec<u8>>,
        staged_order: Vec<PathBuf>,
        untracked: Vec<PathBuf>,
        writes: Vec<String>,
    }

    #[derive(Clone, Default)]
    struct MemoryGit(Rc<RefCell<MemoryRepo>>);

    impl MemoryGit {
        fn stage(&self, path: &str, content: &str) {
            let mut repo = self.0.borrow_mut();
            repo.staged.insert(PathBuf::from(path), content.as_bytes().to_vec());
            repo.working.insert(PathBuf::from(path), content.as_bytes().to_vec());
            repo.staged_order.push(PathBuf::from(path));
        }

        fn edit(&self, path: &str, content: &str) {
            self.0
                .borrow_mut()
                .working
                .insert(PathBuf::from(path), content.as_bytes().to_vec());
        }

        fn staged(&self, path: &str) -> String {
            String::from_utf8(self.0.borrow().staged[Path::new(path)].clone()).unwrap()
        }

        fn working(&self, path: &str) -> String {
            String::from_utf8(self.0.borrow().working[Path::new(path)].clone()).unwrap()
        }

        fn writes(&self) -> Vec<String> {
            self.0.borrow().writes.clone()
        }
    }

    impl GitClient for MemoryGit {
        fn get_staged_files(&self) -> Result<Vec<PathBuf>> {
            Ok(self.0.borrow().staged_order.clone())
        }

        fn get_unstaged_files(&self) -> Result<Vec<PathBuf>> {
            let repo = self.0.borrow();
            Ok(repo
                .staged_order
                .iter()
                .filter(|p| repo.working.get(*p).is_some_and(|w| Some(w) != repo.staged.get(*p)))
                .cloned()
                .collect())
        }

        fn get_untracked_files(&self) -> Result<Vec<PathBuf>> {
            Ok(self.0.borrow().untracked.clone())
        }

        fn read_staged_file_content(&self, path: &Path) -> Result<Vec<u8>> {
            Ok(self.0.borrow().staged[path].clone())
        }

        fn update_staged_file_content(&self, path: &Path, content: &[u8]) -> Result<()> {
            let mut repo = self.0.borrow_mut();
            repo.staged.insert(path.to_path_buf(), content.to_vec());
            repo.writes.push(format!("index:{}", path.display()));
            Ok(())
        }

        fn get_repo_root(&self) -> PathBuf {
            PathBuf::from("/repo")
        }

        fn file_exists(&self, path: &Path) -> bool {
            self.0.borrow().working.contains_key(path)
        }

        fn read_working_file(&self, path: &Path) -> Result<Vec<u8>> {
            Ok(self.0.borrow().working[path].clone())
        }

        fn write_working_file(&self, path: &Path, content: &[u8]) -> Result<()> {
            let mut repo = self.0.borrow_mut();
            repo.working.insert(path.to_path_buf(), content.to_vec());
            repo.writes.push(format!("worktree:{}", path.display()));
            Ok(())
        }
    }

    /// Interprets a tiny command language so engine tests need no processes:
    /// `upper`, `suffix:<text>`, `fail:<message>`, `warn:<message>`.
    fn scripted_runner(command: &str, input: &[u8]) -> Result<CommandOutput> {
        let text = String::from_utf8_lossy(input).into_owned();
        let (stdout, stderr, code) = match command.split_once(':') {
            None if command == "upper" => (text.to_uppercase(), String::new(), 0),
            Some(("suffix", s)) => (format!("{text}{s}"), String::new(), 0),
            Some(("warn", m)) => (text, format!("{m}\n"), 0),
            Some(("fail", m)) => (String::new(), format!("{m}\n"), 1),
            _ => (text, String::new(), 0),
        };
        Ok(CommandOutput {
            exit_code: Some(code),
            stdout: stdout.into_bytes(),
            stderr: stderr.into_bytes(),
        })
    }

    fn config(yaml: &str) -> Config {
        StandardValidator::new()
            .build(&ConfigValue::from_yaml_str(yaml).unwrap())
            .unwrap()
    }

    fn engine(git: &MemoryGit, reporter: &RecordingReporter, options: RunOptions) -> FormatEngine {
        FormatEngine::with_parts(
            Box::new(git.clone()),
            Box::new(scripted_runner),
            Box::new(reporter.clone()),
            options,
        )
    }

    const UPPER_TXT: &str = "formatters:\n  upper: {command: upper, patterns: ['*.txt']}\n";

    #[test]
    fn test_clean_file_updates_index_and_working_tree() {
        let git = MemoryGit::default();
        git.stage("test.txt", "hello world");
        git.stage("test.md", "hello world");
        let reporter = RecordingReporter::default();

        let summary = engine(&git, &reporter, RunOptions::default())
            .run(&config(UPPER_TXT))
            .unwrap();

        assert_eq!(git.staged("test.txt"), "HELLO WORLD");
        assert_eq!(git.working("test.txt"), "HELLO WORLD");
        assert_eq!(git.staged("test.md"), "hello world");
        assert_eq!(summary.files_checked, 2);
        assert_eq!(summary.files_reformatted, 1);
        assert_eq!(git.writes(), ["index:test.txt", "worktree:test.txt"]);
    }

    #[test]
    fn test_diverged_working_tree_is_preserved() {
        let git = MemoryGit::default();
        git.stage("test.txt", "hello world");
        git.edit("test.txt", "completely different content");
        let reporter = RecordingReporter::default();

        let summary = engine(&git, &reporter, RunOptions::default())
            .run(&config(UPPER_TXT))
            .unwrap();

        assert_eq!(git.staged("test.txt"), "HELLO WORLD");
        assert_eq!(git.working("test.txt"), "completely different content");
        assert_eq!(summary.warnings, 1);
        assert!(reporter
            .messages()
            .iter()
            .any(|m| m.starts_with("warning: could not apply formatting changes to working tree file test.txt")));
    }

    #[test]
    fn test_failure_aborts_run_and_surfaces_all_stderr() {
        let git = MemoryGit::default();
        git.stage("a.txt", "first");
        git.stage("b.txt", "second");
        git.stage("c.txt", "third");
        let reporter = RecordingReporter::default();
        let cfg = config(
            r#"
formatters:
  chatty: {command: "warn:Warning from first formatter", patterns: ['*.txt']}
  upper: {command: upper, patterns: ['*.txt']}
  strict: {command: "fail:ERROR: Invalid syntax found", patterns: ['b.txt']}
"#,
        );

        let err = engine(&git, &reporter, RunOptions::default()).run(&cfg).unwrap_err();
        let failure = err.downcast_ref::<FormatterFailure>().unwrap();
        assert_eq!(failure.formatter, "strict");
        assert_eq!(failure.path, "b.txt");

        // a.txt was fully processed before the failure and keeps its result.
        assert_eq!(git.staged("a.txt"), "FIRST");
        // b.txt failed, c.txt was never reached.
        assert_eq!(git.staged("b.txt"), "second");
        assert_eq!(git.staged("c.txt"), "third");

        let messages = reporter.messages();
        let b_stderr: Vec<&String> = messages
            .iter()
            .skip_while(|m| !m.contains("piping b.txt"))
            .filter(|m| m.starts_with("stderr from"))
            .collect();
        assert_eq!(
            b_stderr,
            [
                "stderr from chatty: Warning from first formatter",
                "stderr from strict: ERROR: Invalid syntax found",
            ]
        );
    }

    #[test]
    fn test_no_update_working_tree_option() {
        let git = MemoryGit::default();
        git.stage("test.txt", "hello");
        let reporter = RecordingReporter::default();
        let options = RunOptions {
            update_working_tree: false,
            ..Default::default()
        };

        engine(&git, &reporter, options).run(&config(UPPER_TXT)).unwrap();
        assert_eq!(git.staged("test.txt"), "HELLO");
        assert_eq!(git.working("test.txt"), "hello");
    }

    #[test]
    fn test_unstaged_pass_formats_working_copy_only() {
        let git = MemoryGit::default();
        git.stage("test.txt", "staged content");
        git.edit("test.txt", "unstaged content");
        git.stage("clean.txt", "clean content");
        let reporter = RecordingReporter::default();
        let options = RunOptions {
            unstaged: true,
            ..Default::default()
        };

        let summary = engine(&git, &reporter, options).run(&config(UPPER_TXT)).unwrap();
        assert_eq!(git.staged("test.txt"), "staged content");
        assert_eq!(git.working("test.txt"), "UNSTAGED CONTENT");
        // Staged files without unstaged edits still get the normal staged pass.
        assert_eq!(git.staged("clean.txt"), "CLEAN CONTENT");
        assert_eq!(git.working("clean.txt"), "CLEAN CONTENT");
        assert_eq!(summary.warnings, 0);
        assert!(!git.writes().contains(&"index:test.txt".to_string()));
    }

    #[test]
    fn test_working_tree_and_unstaged_together() {
        let git = MemoryGit::default();
        git.stage("test.txt", "staged");
        git.edit("test.txt", "edited");
        git.stage("clean.txt", "clean");
        let reporter = RecordingReporter::default();
        let options = RunOptions {
            working_tree: true,
            unstaged: true,
            ..Default::default()
        };

        let summary = engine(&git, &reporter, options).run(&config(UPPER_TXT)).unwrap();
        assert_eq!(git.working("test.txt"), "EDITED");
        assert_eq!(git.working("clean.txt"), "CLEAN");
        assert_eq!(git.staged("test.txt"), "staged");
        // Each file is processed once even though it is both staged and unstaged.
        assert_eq!(summary.files_checked, 2);
        assert!(git.writes().iter().all(|w| w.starts_with("worktree:")));
    }

    #[test]
    fn test_working_tree_mode_bypasses_index() {
        let git = MemoryGit::default();
        git.stage("test.txt", "staged");
        git.edit("test.txt", "edited");
        git.edit("new.txt", "untracked");
        git.0.borrow_mut().untracked.push(PathBuf::from("new.txt"));
        let reporter = RecordingReporter::default();
        let options = RunOptions {
            working_tree: true,
            ..Default::default()
        };

        let summary = engine(&git, &reporter, options).run(&config(UPPER_TXT)).unwrap();
        assert_eq!(git.staged("test.txt"), "staged");
        assert_eq!(git.working("test.txt"), "EDITED");
        assert_eq!(git.working("new.txt"), "UNTRACKED");
        assert_eq!(summary.files_reformatted, 2);
        assert!(git.writes().iter().all(|w| w.starts_with("worktree:")));
    }

    #[test]
    fn test_path_filters_narrow_candidates() {
        let git = MemoryGit::default();
        git.stage("keep.txt", "a");
        git.stage("skip.txt", "b");
        let reporter = RecordingReporter::default();
        let options = RunOptions {
            path_filters: vec![PatternEntry::parse("keep.*").unwrap()],
            ..Default::default()
        };

        let summary = engine(&git, &reporter, options).run(&config(UPPER_TXT)).unwrap();
        assert_eq!(summary.files_checked, 1);
        assert_eq!(git.staged("keep.txt"), "A");
        assert_eq!(git.staged("skip.txt"), "b");
    }

    #[test]
    fn test_unchanged_content_writes_nothing() {
        let git = MemoryGit::default();
        git.stage("test.txt", "ALREADY UPPER");
        let reporter = RecordingReporter::default();

        let summary = engine(&git, &reporter, RunOptions::default())
            .run(&config(UPPER_TXT))
            .unwrap();
        assert!(git.writes().is_empty());
        assert_eq!(summary.files_reformatted, 0);
        assert_eq!(reporter.messages().last().unwrap(), "summary: 1 checked, 0 reformatted, 0 warnings");
    }
}
