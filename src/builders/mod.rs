// This file is the module declaration file for the `builders` module.
// It declares and makes public all the sub-modules within the `src/builders`
// directory. These modules hold the building blocks the engine is made of.

// `hooks` module:
// Installs the `pre-commit` hook that runs git-format-staged, backing up any
// hook that was there before.
pub mod hooks;

// `pattern_sets` module:
// Resolves named pattern sets and their `extends` chains into flat pattern
// lists, memoizing each set and rejecting cycles.
pub mod pattern_sets;

// `patterns` module:
// Defines `PatternEntry`, a single include/exclude glob, and the
// last-match-wins rule that decides whether a path matches a pattern list.
pub mod patterns;

// `pipeline` module:
// Runs one file's content through its matching formatters, one process at a
// time, each reading the previous one's output.
pub mod pipeline;

// `reconciler` module:
// Decides whether the formatted content goes to the index, the working tree
// or both, and warns when the working tree has diverged.
pub mod reconciler;

// `reporter` module:
// The `ProgressReporter` trait and its `ConsoleReporter` implementation,
// which show progress, warnings and formatter stderr to the user.
pub mod reporter;

// `validator` module:
// Turns a parsed `ConfigValue` into a typed `Config`, checking every field
// and resolving all pattern sets.
pub mod validator;
