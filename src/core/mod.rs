// This file is the module declaration file for the `core` module.
// It declares the submodules contained within `src/core/` and exposes them
// to the rest of the crate.

// `config` module:
// Locates and loads the configuration file (`ConfigManager` behind the
// `ConfigProvider` trait), defines the typed `Config` and `FormatterSpec`,
// and the `ConfigError` variants every validation failure maps to.
pub mod config;

// `engine` module:
// The `FormatEngine` drives a run. It enumerates candidate files through the
// git client, runs each file's formatter pipeline and applies the result to
// the index and the working tree.
pub mod engine;

// `git` module:
// The `GitClient` trait and its `git2` implementation: staged, unstaged and
// untracked files, blob reads, index updates and working-tree I/O.
pub mod git;

// `value` module:
// The dynamic `ConfigValue` tree that YAML and TOML documents are both
// normalized into before validation.
pub mod value;
