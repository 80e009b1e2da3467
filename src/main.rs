/// git-format-staged
/// Runs formatters over the files that are about to be committed.
/// The formatters see exactly what is staged, not what happens to be on
/// disk, and their output goes straight back into the index. When the
/// working tree still matches what was staged it gets the formatted
/// content too; when it has unstaged edits those edits are left alone.
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use git_format_staged::utils::{self, RunRequest};

#[derive(Parser)]
#[command(name = "git-format-staged")]
#[command(version, about = "Format staged files with the formatters of your choice")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Formatter command to run instead of the config file, e.g. "prettier --stdin-filepath {}"
    #[arg(short = 'f', long = "formatter", value_name = "COMMAND")]
    formatter: Option<String>,

    /// Use this config file instead of .git-format-staged.{yml,yaml,toml}
    #[arg(short = 'c', long = "config", value_name = "PATH", conflicts_with = "formatter")]
    config: Option<PathBuf>,

    /// Format changed files in the working tree instead of the staged content
    #[arg(long)]
    working_tree: bool,

    /// Also format working-tree files that have unstaged changes
    #[arg(long)]
    unstaged: bool,

    /// Only update the index, never the working tree
    #[arg(long)]
    no_update_working_tree: bool,

    /// Run every formatter as a check only; nothing is written
    #[arg(long)]
    no_write: bool,

    /// Show each pipeline stage and every reformatted file
    #[arg(short, long)]
    verbose: bool,

    /// Trace how every file is matched against the formatters
    #[arg(long)]
    debug: bool,

    /// File patterns for --formatter, or filters on the candidate files
    #[arg(value_name = "PATTERNS")]
    patterns: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file to the repository root
    Init,
    /// Install a pre-commit hook that runs git-format-staged
    InstallHook,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::init_logger(cli.debug);

    match cli.command {
        Some(Commands::Init) => utils::initialize_repository(),
        Some(Commands::InstallHook) => utils::install_hooks(),
        None => utils::run_format(RunRequest {
            formatter: cli.formatter,
            config_path: cli.config,
            patterns: cli.patterns,
            working_tree: cli.working_tree,
            unstaged: cli.unstaged,
            no_update_working_tree: cli.no_update_working_tree,
            no_write: cli.no_write,
            verbose: cli.verbose,
        }),
    }
}
