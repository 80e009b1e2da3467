use anyhow::Result;
use log::LevelFilter;
use std::io::Write;
use std::path::PathBuf;

use crate::builders::hooks::{self, HookInstall};
use crate::builders::patterns::{self, PatternEntry};
use crate::core::config::{Config, ConfigManager, ConfigProvider};
use crate::core::engine::{FormatEngine, RunOptions};

/// Everything the command line asks a formatting run to do.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Ad-hoc formatter command; the config file is ignored when set.
    pub formatter: Option<String>,
    pub config_path: Option<PathBuf>,
    /// Globs for the ad-hoc formatter, or candidate filters without one.
    pub patterns: Vec<String>,
    pub working_tree: bool,
    pub unstaged: bool,
    pub no_update_working_tree: bool,
    pub no_write: bool,
    pub verbose: bool,
}

/// Sets up the `log` backend. Records are printed bare so debug traces read
/// like ordinary CLI output.
pub fn init_logger(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    // A second initialization (tests, embedding) is harmless.
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .try_init();
}

pub fn initialize_repository() -> Result<()> {
    let config_manager = get_config_manager()?;
    let path = config_manager.initialize()?;
    println!("✓ Configuration ready at {}", path.display());
    println!("Run 'git-format-staged install-hook' to format staged files on every commit");
    Ok(())
}

pub fn install_hooks() -> Result<()> {
    let config_manager = get_config_manager()?;
    match hooks::install_pre_commit_hook(config_manager.get_repo_root())? {
        HookInstall::Installed(path) => println!("✓ Installed pre-commit hook at {}", path.display()),
        HookInstall::AlreadyInstalled(_) => println!("ℹ️  pre-commit hook already installed"),
        HookInstall::Replaced { hook, backup } => {
            println!("ℹ️  Backed up existing pre-commit hook to {}", backup.display());
            println!("✓ Installed pre-commit hook at {}", hook.display());
        }
    }
    Ok(())
}

/// Loads the configuration for `request` and formats the repository with it.
pub fn run_format(request: RunRequest) -> Result<()> {
    let mut config_manager = get_config_manager()?;
    if let Some(path) = request.config_path.clone() {
        config_manager = config_manager.with_config_path(path);
    }

    let config = build_config(&config_manager, &request)?;
    let path_filters = if request.formatter.is_some() {
        Vec::new()
    } else {
        parse_filters(&request.patterns)?
    };

    let options = RunOptions {
        working_tree: request.working_tree,
        unstaged: request.unstaged,
        update_working_tree: !request.no_update_working_tree,
        path_filters,
    };

    let engine = FormatEngine::new(config_manager.get_repo_root(), options, request.verbose)?;
    engine.run(&config)?;
    Ok(())
}

/// Builds the run's configuration: ad-hoc from the command line, or loaded
/// from the config file. `--no-write` turns every formatter readonly.
pub fn build_config(config_manager: &ConfigManager, request: &RunRequest) -> Result<Config> {
    let config = match &request.formatter {
        Some(command) => Config::ad_hoc(command, &request.patterns)?,
        None => config_manager.load_config()?,
    };
    let config = if request.no_write {
        config.into_readonly()
    } else {
        config
    };

    for formatter in &config.formatters {
        log::debug!("Formatter '{}':", formatter.name);
        log::debug!("  Patterns: {}", patterns::describe(&formatter.patterns));
    }

    Ok(config)
}

fn parse_filters(raw: &[String]) -> Result<Vec<PatternEntry>> {
    raw.iter()
        .map(|pattern| {
            PatternEntry::parse(pattern)
                .map_err(|message| anyhow::anyhow!("Invalid pattern '{pattern}': {message}"))
        })
        .collect()
}

// Helper function to create ConfigManager instance
fn get_config_manager() -> Result<ConfigManager> {
    ConfigManager::new()
}
