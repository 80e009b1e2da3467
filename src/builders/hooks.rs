use anyhow::{Context, Result};
use git2::Repository;
use std::fs;
use std::path::{Path, PathBuf};

/// Marker line that identifies a hook written by this tool.
const HOOK_MARKER: &str = "# git-format-staged pre-commit hook";

const PRE_COMMIT_HOOK: &str = r#"#!/bin/sh
# git-format-staged pre-commit hook

# Check if git-format-staged is available
if ! command -v git-format-staged > /dev/null 2>&1; then
    echo "Warning: git-format-staged not found in PATH, skipping formatting"
    exit 0
fi

# Format staged files before commit
git-format-staged
if [ $? -ne 0 ]; then
    echo "Error: git-format-staged failed, commit aborted"
    exit 1
fi
"#;

/// What `install_pre_commit_hook` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookInstall {
    Installed(PathBuf),
    AlreadyInstalled(PathBuf),
    /// A foreign hook was moved aside to the given backup path.
    Replaced { hook: PathBuf, backup: PathBuf },
}

/// Installs the pre-commit hook into the repository's hooks directory.
///
/// The hooks directory is taken from git itself, so linked worktrees and
/// repositories whose `.git` is a file are handled.
pub fn install_pre_commit_hook(repo_root: &Path) -> Result<HookInstall> {
    let repo = Repository::open(repo_root)
        .with_context(|| format!("Failed to open repository at {}", repo_root.display()))?;
    let hooks_dir = repo.path().join("hooks");
    fs::create_dir_all(&hooks_dir)?;

    let hook_path = hooks_dir.join("pre-commit");
    let mut backup = None;

    if hook_path.exists() {
        let existing_content = fs::read_to_string(&hook_path)?;
        if existing_content.contains(HOOK_MARKER) {
            return Ok(HookInstall::AlreadyInstalled(hook_path));
        }

        let backup_path = hooks_dir.join("pre-commit.backup");
        fs::rename(&hook_path, &backup_path)?;
        backup = Some(backup_path);
    }

    fs::write(&hook_path, PRE_COMMIT_HOOK)
        .with_context(|| format!("Failed to write {}", hook_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&hook_path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&hook_path, perms)?;
    }

    Ok(match backup {
        Some(backup) => HookInstall::Replaced {
            hook: hook_path,
            backup,
        },
        None => HookInstall::Installed(hook_path),
    })
}
