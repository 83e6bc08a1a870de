//! Error types for worktree session operations.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a worktree lifecycle step.
///
/// Handled at the tool/event boundary: the message becomes the tool result
/// text and an error toast. Nothing here is fatal to the host.
#[derive(Error, Debug)]
pub enum WorktreeError {
    #[error("Not a git repo")]
    NotAGitRepo,

    #[error("Detached HEAD state")]
    DetachedHead,

    #[error("worktree path already exists: {}", path.display())]
    WorktreePathExists { path: PathBuf },

    /// A git invocation exited non-zero.
    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    /// The git executable could not be started at all.
    #[error("failed to run git in {}: {source}", dir.display())]
    GitUnavailable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Fast-forward or fetch during branch sync failed. Swallowed by the
    /// lifecycle; the local branch stays as checked out.
    #[error("could not sync '{branch}' with origin: {reason}")]
    SyncReconciliation { branch: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorktreeError {
    /// Short machine-readable kind, used in activity log entries.
    pub fn kind(&self) -> &'static str {
        match self {
            WorktreeError::NotAGitRepo => "not_a_git_repo",
            WorktreeError::DetachedHead => "detached_head",
            WorktreeError::WorktreePathExists { .. } => "worktree_path_exists",
            WorktreeError::Git { .. } => "subprocess_failure",
            WorktreeError::GitUnavailable { .. } => "git_unavailable",
            WorktreeError::SyncReconciliation { .. } => "sync_reconciliation",
            WorktreeError::Io(_) => "io",
        }
    }
}
