use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::builders::pattern_sets::PatternSet;
use crate::builders::patterns::PatternEntry;
use crate::builders::validator::{ConfigValidator, StandardValidator};
use crate::core::value::ConfigValue;

/// Configuration file names looked up at the repository root, in order.
pub const CONFIG_FILE_NAMES: [&str; 3] = [
    ".git-format-staged.yml",
    ".git-format-staged.yaml",
    ".git-format-staged.toml",
];

const SAMPLE_CONFIG: &str = r#"# git-format-staged configuration
#
# Formatters run in the order they are declared. Each one receives the staged
# content of a matching file on stdin and must print the formatted content on
# stdout. `{}` in a command is replaced with the path of the file.

pattern-sets:
  web:
    - "*.js"
    - "*.ts"
    - "!vendor/**"

formatters:
  prettier:
    command: prettier --stdin-filepath {}
    extends: web
  rustfmt:
    command: rustfmt --emit stdout
    patterns:
      - "*.rs"
"#;

/// Everything that can be wrong with a configuration document.
///
/// All of these are fatal: the run aborts before any file is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Error parsing config file: {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{field} must be a {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Configuration is missing required 'formatters' field")]
    MissingFormatters,

    #[error("Formatter '{formatter}' is missing required 'command' field")]
    MissingCommand { formatter: String },

    #[error("Invalid pattern '{pattern}' in {field}: {message}")]
    InvalidPattern {
        field: String,
        pattern: String,
        message: String,
    },

    #[error("Pattern set '{name}' not found (referenced by {referrer})")]
    PatternSetNotFound { name: String, referrer: String },

    #[error("Pattern set cycle detected: {}", chain.join(" -> "))]
    PatternSetCycle { chain: Vec<String> },

    #[error("A file pattern is required when using --formatter")]
    MissingAdHocPattern,
}

/// A validated formatter: a shell command plus the files it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatterSpec {
    pub name: String,
    pub command: String,
    /// Pattern sets this formatter inherits from, in declared order.
    pub extends: Vec<String>,
    /// Patterns declared on the formatter itself.
    pub own_patterns: Vec<PatternEntry>,
    /// A readonly formatter only checks content; its stdout is discarded.
    pub readonly: bool,
    /// The effective pattern list: `extends` resolved, then `own_patterns`.
    pub patterns: Vec<PatternEntry>,
}

/// The typed configuration for one run. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub formatters: Vec<FormatterSpec>,
    pub pattern_sets: IndexMap<String, PatternSet>,
}

impl Config {
    /// Builds the single-formatter configuration used by `--formatter`.
    pub fn ad_hoc(command: &str, patterns: &[String]) -> Result<Self, ConfigError> {
        if command.trim().is_empty() {
            return Err(ConfigError::MissingCommand {
                formatter: command.to_string(),
            });
        }
        if patterns.is_empty() {
            return Err(ConfigError::MissingAdHocPattern);
        }

        let own_patterns = patterns
            .iter()
            .map(|raw| {
                PatternEntry::parse(raw).map_err(|message| ConfigError::InvalidPattern {
                    field: "command line".to_string(),
                    pattern: raw.clone(),
                    message,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            formatters: vec![FormatterSpec {
                name: command.to_string(),
                command: command.to_string(),
                extends: Vec::new(),
                patterns: own_patterns.clone(),
                own_patterns,
                readonly: false,
            }],
            pattern_sets: IndexMap::new(),
        })
    }

    /// Marks every formatter readonly, turning the run into a pure check.
    pub fn into_readonly(mut self) -> Self {
        for formatter in &mut self.formatters {
            formatter.readonly = true;
        }
        self
    }
}

/// Parses raw configuration text, choosing the syntax from the file extension.
pub fn parse_document(path: &Path, content: &str) -> Result<ConfigValue, ConfigError> {
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let parsed = if is_toml {
        ConfigValue::from_toml_str(content).map_err(|e| e.to_string())
    } else {
        ConfigValue::from_yaml_str(content).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

pub struct ConfigManager {
    repo_root: PathBuf,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Creates a manager for the repository containing the current directory.
    pub fn new() -> Result<Self> {
        let repo_root = find_git_root()?;
        Self::new_at(repo_root)
    }

    pub fn new_at(repo_root: PathBuf) -> Result<Self> {
        Ok(Self {
            repo_root,
            config_path: None,
        })
    }

    /// Uses an explicit configuration file instead of searching the root.
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        let path = if path.is_relative() {
            self.repo_root.join(path)
        } else {
            path
        };
        self.config_path = Some(path);
        self
    }

    /// Writes a starter configuration unless one already exists.
    ///
    /// # Returns
    /// The path of the configuration file, existing or newly created.
    pub fn initialize(&self) -> Result<PathBuf> {
        if let Some(existing) = self.find_config_file() {
            return Ok(existing);
        }

        let path = self.repo_root.join(CONFIG_FILE_NAMES[0]);
        fs::write(&path, SAMPLE_CONFIG).context("Failed to write config file")?;
        Ok(path)
    }

    /// Returns the configuration file that will be used, if there is one.
    pub fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            return Some(path.clone());
        }

        CONFIG_FILE_NAMES
            .iter()
            .map(|name| self.repo_root.join(name))
            .find(|path| path.is_file())
    }

    pub fn get_repo_root(&self) -> &Path {
        &self.repo_root
    }
}

pub trait ConfigProvider {
    fn load_document(&self) -> Result<ConfigValue>;
    fn load_config(&self) -> Result<Config>;
    fn get_config_path(&self) -> Result<PathBuf>;
}

impl ConfigProvider for ConfigManager {
    fn load_document(&self) -> Result<ConfigValue> {
        let path = self.get_config_path()?;
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Ok(parse_document(&path, &content)?)
    }

    fn load_config(&self) -> Result<Config> {
        let document = self.load_document()?;
        let validator = StandardValidator::new();
        let config = validator.build(&document)?;

        for warning in validator.check_config(&config) {
            log::warn!("warning: {warning}");
        }

        Ok(config)
    }

    fn get_config_path(&self) -> Result<PathBuf> {
        self.find_config_file().ok_or_else(|| {
            anyhow::anyhow!(
                "No configuration file found in {} (expected one of {}); pass --formatter to run without one",
                self.repo_root.display(),
                CONFIG_FILE_NAMES.join(", ")
            )
        })
    }
}

fn find_git_root() -> Result<PathBuf> {
    let current_dir = std::env::current_dir()?;
    let mut dir = current_dir.as_path();

    loop {
        if dir.join(".git").exists() {
            return Ok(dir.to_path_buf());
        }

        match dir.parent() {
            Some(parent) => dir = parent,
            None => anyhow::bail!("Not in a Git repository"),
        }
    }
}
