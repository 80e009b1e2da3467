use anyhow::{Context, Result, anyhow};
use git2::{Delta, DiffOptions, FileMode, IndexTime, Repository};
use std::path::{Path, PathBuf};

/// Trait defining the Git operations required by the engine.
/// This abstraction allows for easier testing and decoupling from specific git implementations.
pub trait GitClient {
    /// Returns the added or modified regular files in the index, relative to
    /// the repository root. Deleted files, symlinks and submodules are left out.
    fn get_staged_files(&self) -> Result<Vec<PathBuf>>;

    /// Returns tracked regular files whose working-tree content differs from the index.
    fn get_unstaged_files(&self) -> Result<Vec<PathBuf>>;

    /// Returns untracked, non-ignored files in the working tree.
    fn get_untracked_files(&self) -> Result<Vec<PathBuf>>;

    /// Reads the content of a file as it exists in the staging area (index).
    fn read_staged_file_content(&self, path: &Path) -> Result<Vec<u8>>;

    /// Writes `content` as a new blob and points the file's index entry at it.
    fn update_staged_file_content(&self, path: &Path, content: &[u8]) -> Result<()>;

    /// Returns the root path of the repository.
    fn get_repo_root(&self) -> PathBuf;

    /// Checks if a file exists in the working directory.
    fn file_exists(&self, path: &Path) -> bool;

    /// Read file from working directory
    fn read_working_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write file to working directory
    fn write_working_file(&self, path: &Path, content: &[u8]) -> Result<()>;
}

/// Concrete implementation of GitClient using the git2 crate.
pub struct Git2Client {
    repo: Repository,
    workdir: PathBuf,
}

impl Git2Client {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::open(path)?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| anyhow!("Cannot format staged files in a bare repository"))?
            .to_path_buf();
        Ok(Self { repo, workdir })
    }

    fn fresh_index(&self) -> Result<git2::Index> {
        let mut index = self.repo.index()?;
        index.read(false)?;
        Ok(index)
    }
}

fn is_regular_file(mode: FileMode) -> bool {
    matches!(mode, FileMode::Blob | FileMode::BlobExecutable)
}

impl GitClient for Git2Client {
    fn get_staged_files(&self) -> Result<Vec<PathBuf>> {
        let index = self.fresh_index()?;

        // Before the first commit there is no HEAD; diff against the empty tree.
        let head_tree = match self.repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(_) => None,
        };
        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), Some(&index), None)?;

        let mut staged_files = Vec::new();
        for delta in diff.deltas() {
            if !matches!(delta.status(), Delta::Added | Delta::Modified) {
                continue;
            }
            let new_file = delta.new_file();
            if !is_regular_file(new_file.mode()) {
                continue;
            }
            if let Some(path) = new_file.path() {
                staged_files.push(path.to_path_buf());
            }
        }

        Ok(staged_files)
    }

    fn get_unstaged_files(&self) -> Result<Vec<PathBuf>> {
        let index = self.fresh_index()?;
        let diff = self.repo.diff_index_to_workdir(Some(&index), None)?;

        let mut files = Vec::new();
        for delta in diff.deltas() {
            if delta.status() != Delta::Modified || !is_regular_file(delta.new_file().mode()) {
                continue;
            }
            if let Some(path) = delta.new_file().path() {
                files.push(path.to_path_buf());
            }
        }
        Ok(files)
    }

    fn get_untracked_files(&self) -> Result<Vec<PathBuf>> {
        let index = self.fresh_index()?;
        let mut options = DiffOptions::new();
        options.include_untracked(true).recurse_untracked_dirs(true);
        let diff = self
            .repo
            .diff_index_to_workdir(Some(&index), Some(&mut options))?;

        let mut files = Vec::new();
        for delta in diff.deltas() {
            if delta.status() != Delta::Untracked {
                continue;
            }
            if let Some(path) = delta.new_file().path() {
                files.push(path.to_path_buf());
            }
        }
        Ok(files)
    }

    fn read_staged_file_content(&self, path: &Path) -> Result<Vec<u8>> {
        let index = self.fresh_index()?;
        let entry = index
            .get_path(path, 0)
            .ok_or_else(|| anyhow!("Failed to get staged file entry for {}", path.display()))?;
        let blob = self.repo.find_blob(entry.id)?;
        Ok(blob.content().to_vec())
    }

    fn update_staged_file_content(&self, path: &Path, content: &[u8]) -> Result<()> {
        let mut index = self.fresh_index()?;
        let mut entry = index
            .get_path(path, 0)
            .ok_or_else(|| anyhow!("Failed to get staged file entry for {}", path.display()))?;

        entry.id = self
            .repo
            .blob(content)
            .with_context(|| format!("Failed to write blob for {}", path.display()))?;
        entry.file_size = u32::try_from(content.len()).unwrap_or(u32::MAX);
        // The stat data described the old content. Clearing it makes git
        // re-read the working-tree file instead of trusting a stale match.
        entry.ctime = IndexTime::new(0, 0);
        entry.mtime = IndexTime::new(0, 0);

        index.add(&entry)?;
        index.write()?;
        Ok(())
    }

    fn get_repo_root(&self) -> PathBuf {
        self.workdir.clone()
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.workdir.join(path).is_file()
    }

    fn read_working_file(&self, path: &Path) -> Result<Vec<u8>> {
        let full_path = self.workdir.join(path);
        std::fs::read(&full_path).with_context(|| format!("Failed to read {}", full_path.display()))
    }

    fn write_working_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        let full_path = self.workdir.join(path);
        std::fs::write(&full_path, content)
            .with_context(|| format!("Failed to write {}", full_path.display()))
    }
}
