use globset::{GlobBuilder, GlobMatcher};
use std::fmt;

/// Whether a pattern admits or rejects the paths it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSign {
    Include,
    Exclude,
}

/// A single include/exclude glob pattern.
///
/// Patterns are written the way they appear in `.gitignore` files. A leading
/// `!` turns the pattern into an exclusion. A pattern without a `/` is matched
/// against the file name only, so `*.js` matches `src/app.js`. A pattern with a
/// `/` is matched against the whole repository-relative path, and a leading `/`
/// anchors it to the repository root.
///
/// Entries are immutable once parsed. The compiled matcher is kept next to the
/// text so that evaluating a path never recompiles anything.
#[derive(Debug, Clone)]
pub struct PatternEntry {
    /// The glob itself, with the `!` prefix stripped.
    pub text: String,
    pub sign: PatternSign,
    basename_only: bool,
    matcher: GlobMatcher,
}

impl PatternEntry {
    /// Parses a raw pattern string such as `*.py` or `!node_modules/**`.
    ///
    /// # Returns
    /// The parsed entry, or a message describing why the glob is invalid.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let (sign, text) = match raw.strip_prefix('!') {
            Some(rest) => (PatternSign::Exclude, rest),
            None => (PatternSign::Include, raw),
        };

        if text.is_empty() {
            return Err("pattern is empty".to_string());
        }

        let (glob_text, basename_only) = match text.strip_prefix('/') {
            Some(anchored) => (anchored, false),
            None => (text, !text.contains('/')),
        };

        let glob = GlobBuilder::new(glob_text)
            .literal_separator(true)
            .build()
            .map_err(|e| e.kind().to_string())?;

        Ok(Self {
            text: text.to_string(),
            sign,
            basename_only,
            matcher: glob.compile_matcher(),
        })
    }

    /// Returns true when the glob matches `path`, regardless of the sign.
    pub fn is_match(&self, path: &str) -> bool {
        let path = normalize_path(path);
        if self.basename_only {
            let name = path.rsplit('/').next().unwrap_or(path.as_str());
            self.matcher.is_match(name)
        } else {
            self.matcher.is_match(path.as_str())
        }
    }

    pub fn is_exclude(&self) -> bool {
        self.sign == PatternSign::Exclude
    }
}

/// Renders the pattern the way the user wrote it, including the `!` prefix.
impl fmt::Display for PatternEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sign {
            PatternSign::Include => write!(f, "{}", self.text),
            PatternSign::Exclude => write!(f, "!{}", self.text),
        }
    }
}

impl PartialEq for PatternEntry {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.sign == other.sign
    }
}

/// Finds the pattern that decides whether `path` is selected.
///
/// Patterns are evaluated left to right and the last one that matches wins,
/// so a trailing exclude narrows an earlier include and a trailing include
/// re-admits a path an earlier exclude rejected.
///
/// # Returns
/// The deciding entry, or `None` if no pattern matched the path at all.
pub fn decide<'a>(path: &str, patterns: &'a [PatternEntry]) -> Option<&'a PatternEntry> {
    patterns.iter().rev().find(|pattern| pattern.is_match(path))
}

/// Evaluates an ordered include/exclude list against `path`.
///
/// An empty list, or a list where nothing matches, yields `false`.
pub fn matches(path: &str, patterns: &[PatternEntry]) -> bool {
    decide(path, patterns).is_some_and(|pattern| pattern.sign == PatternSign::Include)
}

/// Formats a pattern list as `['*.js', '!vendor/**']` for the debug trace.
pub fn describe(patterns: &[PatternEntry]) -> String {
    let quoted: Vec<String> = patterns.iter().map(|p| format!("'{p}'")).collect();
    format!("[{}]", quoted.join(", "))
}

fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    match path.strip_prefix("./") {
        Some(stripped) => stripped.to_string(),
        None => path,
    }
}
