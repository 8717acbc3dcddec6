//! Versioned file operations with Git-based version control.
//!
//! Every patient and family record lives in its own directory, and each of those directories
//! is a local Git repository (`git2`/libgit2). This module centralises the Git handling so that
//! every save is one commit with a structured message, and a failed save leaves no partial
//! files behind.
//!
//! ## Branch Policy
//!
//! Record repositories standardise on `refs/heads/main`.
//!
//! ## Commit Messages
//!
//! ```text
//! <domain>:<action>: <summary>
//!
//! Author-Name: <name>
//! Minor-Edit: true
//! ```
//!
//! `Minor-Edit` is only present for minor edits. Summaries are labels, not content: they never
//! carry record data.

use crate::author::Author;
use crate::error::{StoreError, StoreResult};
use famstudy_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

#[cfg(test)]
use std::collections::HashSet;
#[cfg(test)]
use std::sync::{LazyLock, Mutex};

const MAIN_REF: &str = "refs/heads/main";

/// Which kind of record a commit touches.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RecordCommitDomain {
    Patient,
    Family,
}

impl RecordCommitDomain {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Family => "family",
        }
    }
}

impl fmt::Display for RecordCommitDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a commit does to the record.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RecordCommitAction {
    Create,
    Update,
}

impl RecordCommitAction {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for RecordCommitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured commit message for a record save.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct RecordCommitMessage {
    domain: RecordCommitDomain,
    action: RecordCommitAction,
    summary: NonEmptyText,
    minor: bool,
}

impl RecordCommitMessage {
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] if `summary` is empty or spans several lines.
    pub(crate) fn new(
        domain: RecordCommitDomain,
        action: RecordCommitAction,
        summary: impl AsRef<str>,
    ) -> StoreResult<Self> {
        let summary = summary.as_ref().trim();
        if summary.contains(['\n', '\r']) {
            return Err(StoreError::InvalidInput(
                "commit summary must be single-line".into(),
            ));
        }
        let summary = NonEmptyText::new(summary)
            .map_err(|_| StoreError::InvalidInput("commit summary must be non-empty".into()))?;

        Ok(Self {
            domain,
            action,
            summary,
            minor: false,
        })
    }

    /// Marks the commit as a minor edit.
    pub(crate) fn minor(mut self, minor: bool) -> Self {
        self.minor = minor;
        self
    }

    pub(crate) fn summary(&self) -> &str {
        self.summary.as_str()
    }

    /// Renders the subject line and trailers for `author`.
    pub(crate) fn render_with_author(&self, author: &Author) -> String {
        let mut rendered = format!("{}:{}: {}", self.domain, self.action, self.summary);

        rendered.push_str("\n\nAuthor-Name: ");
        rendered.push_str(author.name.as_str().trim());

        if self.minor {
            rendered.push_str("\nMinor-Edit: true");
        }

        rendered
    }
}

/// A file to be written and committed.
#[derive(Debug, Clone)]
pub struct FileToWrite<'a> {
    /// Path relative to the repository directory.
    pub relative_path: &'a Path,
    pub content: &'a str,
    /// Previous content for rollback. `None` if this is a new file.
    pub old_content: Option<&'a str>,
}

/// Git operations on one record repository rooted at `workdir`.
pub struct VersionedFileService {
    repo: git2::Repository,
    workdir: PathBuf,
}

impl VersionedFileService {
    /// Initialise a new repository at `workdir`.
    pub(crate) fn init(workdir: &Path) -> StoreResult<Self> {
        let repo = git2::Repository::init(workdir).map_err(StoreError::GitInit)?;
        // git2 may canonicalise the path; keep its view so prefix stripping works.
        let actual_workdir = repo
            .workdir()
            .ok_or_else(|| {
                StoreError::GitInit(git2::Error::from_str("repository has no working directory"))
            })?
            .to_path_buf();
        Ok(Self {
            repo,
            workdir: actual_workdir,
        })
    }

    /// Open the repository at exactly `workdir`, without searching parent directories.
    pub(crate) fn open(workdir: &Path) -> StoreResult<Self> {
        let repo = git2::Repository::open_ext(
            workdir,
            git2::RepositoryOpenFlags::NO_SEARCH,
            std::iter::empty::<&std::ffi::OsStr>(),
        )
        .map_err(StoreError::GitOpen)?;
        let actual_workdir = repo
            .workdir()
            .ok_or_else(|| {
                StoreError::GitOpen(git2::Error::from_str("repository has no working directory"))
            })?
            .to_path_buf();
        Ok(Self {
            repo,
            workdir: actual_workdir,
        })
    }

    fn ensure_main_head(&self) -> StoreResult<()> {
        self.repo
            .set_head(MAIN_REF)
            .map_err(StoreError::GitSetHead)?;
        Ok(())
    }

    /// Commit only the given paths.
    ///
    /// Paths may be workdir-relative or absolute under the workdir. Paths containing `..` are
    /// rejected.
    pub(crate) fn commit_paths(
        &self,
        author: &Author,
        message: &RecordCommitMessage,
        relative_paths: &[PathBuf],
    ) -> StoreResult<git2::Oid> {
        let rendered = message.render_with_author(author);
        self.commit_paths_rendered(author, &rendered, relative_paths)
    }

    /// Writes `files` into the repository at `repo_path` and commits them together.
    ///
    /// On failure, files that existed are restored, new files are removed and any directories
    /// created here are removed again.
    pub(crate) fn write_and_commit_files(
        repo_path: &Path,
        author: &Author,
        msg: &RecordCommitMessage,
        files: &[FileToWrite],
    ) -> StoreResult<()> {
        let repo = Self::open(repo_path)?;

        let mut created_dirs: Vec<PathBuf> = Vec::new();
        let mut written_files: Vec<(PathBuf, Option<String>)> = Vec::new();

        let result: StoreResult<()> = (|| {
            let mut dirs_needed = std::collections::HashSet::new();
            for file in files {
                let full_path = repo.workdir.join(file.relative_path);
                if let Some(parent) = full_path.parent() {
                    let mut current = parent;
                    while current != repo.workdir && !current.exists() {
                        dirs_needed.insert(current.to_path_buf());
                        match current.parent() {
                            Some(p) => current = p,
                            None => break,
                        }
                    }
                }
            }

            // Shallowest first.
            let mut dirs_to_create: Vec<PathBuf> = dirs_needed.into_iter().collect();
            dirs_to_create.sort_by_key(|p| p.components().count());

            for dir in &dirs_to_create {
                std::fs::create_dir(dir).map_err(StoreError::FileWrite)?;
                created_dirs.push(dir.clone());
            }

            for file in files {
                let full_path = repo.workdir.join(file.relative_path);
                let old_content = file.old_content.map(str::to_string);

                std::fs::write(&full_path, file.content).map_err(StoreError::FileWrite)?;
                written_files.push((full_path, old_content));
            }

            let paths: Vec<PathBuf> = files
                .iter()
                .map(|f| f.relative_path.to_path_buf())
                .collect();
            repo.commit_paths(author, msg, &paths)?;

            Ok(())
        })();

        if let Err(write_error) = result {
            for (full_path, old_content) in written_files.iter().rev() {
                let restored = match old_content {
                    Some(contents) => std::fs::write(full_path, contents),
                    None => std::fs::remove_file(full_path),
                };
                if let Err(e) = restored {
                    tracing::warn!(path = %full_path.display(), error = %e, "rollback of record file failed");
                }
            }

            // Deepest first.
            for dir in created_dirs.iter().rev() {
                let _ = std::fs::remove_dir(dir);
            }

            return Err(write_error);
        }

        tracing::debug!(
            repo = %repo_path.display(),
            summary = msg.summary(),
            files = files.len(),
            "committed record files"
        );
        Ok(())
    }

    /// Initialise a repository in `record_dir` and commit the initial files.
    ///
    /// The whole directory is removed if any step fails. If that removal fails as well,
    /// [`StoreError::CleanupAfterCreateFailed`] carries both errors.
    pub(crate) fn init_and_commit(
        record_dir: &Path,
        author: &Author,
        message: &RecordCommitMessage,
        files: &[FileToWrite],
    ) -> StoreResult<()> {
        let result: StoreResult<()> = (|| {
            let _repo = Self::init(record_dir)?;
            Self::write_and_commit_files(record_dir, author, message, files)?;
            Ok(())
        })();

        match result {
            Ok(()) => Ok(()),
            Err(create_error) => {
                if let Err(cleanup_error) = cleanup_record_dir(record_dir) {
                    return Err(StoreError::CleanupAfterCreateFailed {
                        path: record_dir.to_path_buf(),
                        create_error: Box::new(create_error),
                        cleanup_error,
                    });
                }
                Err(create_error)
            }
        }
    }

    /// Delete a record directory together with its repository.
    pub(crate) fn remove_record(record_dir: &Path) -> StoreResult<()> {
        cleanup_record_dir(record_dir).map_err(StoreError::RecordDirRemoval)?;
        tracing::debug!(repo = %record_dir.display(), "removed record directory");
        Ok(())
    }

    fn commit_paths_rendered(
        &self,
        author: &Author,
        message: &str,
        relative_paths: &[PathBuf],
    ) -> StoreResult<git2::Oid> {
        self.ensure_main_head()?;
        let mut index = self.repo.index().map_err(StoreError::GitIndex)?;

        for path in relative_paths {
            // `git2::Index::add_path` requires workdir-relative paths.
            let rel = if path.is_absolute() {
                path.strip_prefix(&self.workdir)
                    .map_err(|_| {
                        StoreError::InvalidInput(
                            "path is outside the repository working directory".into(),
                        )
                    })?
                    .to_path_buf()
            } else {
                path.to_path_buf()
            };

            if rel.components().any(|c| matches!(c, Component::ParentDir)) {
                return Err(StoreError::InvalidInput(
                    "path must not contain parent directory references (..)".into(),
                ));
            }

            index.add_path(&rel).map_err(StoreError::GitAdd)?;
        }
        index.write().map_err(StoreError::GitIndex)?;

        self.commit_from_index(author, message, &mut index)
    }

    fn commit_from_index(
        &self,
        author: &Author,
        message: &str,
        index: &mut git2::Index,
    ) -> StoreResult<git2::Oid> {
        let tree_id = index.write_tree().map_err(StoreError::GitWriteTree)?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(StoreError::GitFindTree)?;

        let sig = author.signature()?;
        let parents = self.resolve_head_parents()?;
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .map_err(StoreError::GitCommit)
    }

    /// Parent list for the next commit: the `HEAD` commit, or none for an unborn branch.
    fn resolve_head_parents(&self) -> StoreResult<Vec<git2::Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => {
                let commit = head.peel_to_commit().map_err(StoreError::GitPeel)?;
                Ok(vec![commit])
            }
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(vec![]),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(vec![]),
            Err(e) => Err(StoreError::GitHead(e)),
        }
    }

    /// Message of the `HEAD` commit, if any.
    #[cfg(test)]
    pub(crate) fn head_message(&self) -> StoreResult<Option<String>> {
        Ok(self
            .resolve_head_parents()?
            .first()
            .and_then(|c| c.message().map(str::to_string)))
    }
}

#[cfg(test)]
static FORCE_CLEANUP_ERROR_FOR_THREADS: LazyLock<Mutex<HashSet<std::thread::ThreadId>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

fn cleanup_record_dir(record_dir: &Path) -> std::io::Result<()> {
    #[cfg(test)]
    {
        let current_id = std::thread::current().id();
        let mut guard = FORCE_CLEANUP_ERROR_FOR_THREADS
            .lock()
            .expect("FORCE_CLEANUP_ERROR_FOR_THREADS mutex poisoned");

        if guard.remove(&current_id) {
            return Err(std::io::Error::other("forced cleanup failure (test hook)"));
        }
    }

    std::fs::remove_dir_all(record_dir)
}
