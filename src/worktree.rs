//! Git worktree lifecycle for agent sessions.
//!
//! Each session that asks for isolation gets a worktree at
//! `<root>/.opencode/worktrees/<branch>`, checked out from one of three
//! sources:
//! - an existing local branch, optionally synced with `origin`
//! - a branch that only exists on `origin`, checked out tracking it
//! - a new branch forked from whatever the main checkout is on
//!
//! Cleanup is save-first: uncommitted work is committed and pushed before the
//! worktree is force-removed. Nothing is rolled back on failure.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{self, SyncBehavior};
use crate::error::WorktreeError;
use crate::git::Git;
use crate::paths;

/// Create the worktree for `branch` under `root` and return its path.
pub fn create_session<G: Git + ?Sized>(
    git: &G,
    root: &Path,
    branch: &str,
) -> Result<PathBuf, WorktreeError> {
    if !git.is_repository(root) {
        return Err(WorktreeError::NotAGitRepo);
    }

    let base_branch = git.current_branch(root)?;
    if base_branch.is_empty() {
        return Err(WorktreeError::DetachedHead);
    }

    let path = paths::worktree_path(root, branch);
    let local_exists = git.local_branch_exists(branch, root);
    let remote_exists = git.remote_branch_exists(branch, root);
    debug!(
        branch,
        base = %base_branch,
        local_exists,
        remote_exists,
        "resolving worktree source"
    );

    std::fs::create_dir_all(paths::worktrees_root(root))?;
    if path.exists() {
        return Err(WorktreeError::WorktreePathExists { path });
    }

    if local_exists {
        git.checkout_existing_branch(&path, branch, root, false)?;
        let behavior = config::load_config(root).sync_behavior();
        if let Err(err) = sync_existing_branch(git, root, &path, branch, behavior) {
            warn!(branch, error = %err, "keeping local branch as checked out");
        }
    } else if remote_exists {
        git.checkout_existing_branch(&path, branch, root, true)?;
    } else {
        git.create_worktree(&path, branch, &base_branch, root)?;
    }

    info!(branch, path = %path.display(), "worktree created");
    Ok(path)
}

/// Reconcile a freshly checked out local branch with `origin`.
fn sync_existing_branch<G: Git + ?Sized>(
    git: &G,
    root: &Path,
    worktree: &Path,
    branch: &str,
    behavior: SyncBehavior,
) -> Result<(), WorktreeError> {
    let should_sync = match behavior {
        SyncBehavior::Never => false,
        SyncBehavior::Always => true,
        SyncBehavior::PreferLocal => {
            let counts = git.ahead_behind(branch, root);
            debug!(
                branch,
                origin_ahead = counts.origin_ahead,
                local_ahead = counts.local_ahead,
                "prefer-local sync check"
            );
            counts.origin_ahead > 0 && counts.local_ahead == 0
        }
    };
    if !should_sync {
        return Ok(());
    }

    let reconcile = |err: WorktreeError| WorktreeError::SyncReconciliation {
        branch: branch.to_string(),
        reason: err.to_string(),
    };
    git.fetch_branch(branch, root).map_err(reconcile)?;
    git.fast_forward_merge(branch, worktree).map_err(reconcile)?;
    info!(branch, %behavior, "fast-forwarded to origin");
    Ok(())
}

/// Save and remove a session worktree.
///
/// Prunes stale registrations, commits and pushes when the worktree has
/// changes, force-removes it, then prunes again.
pub fn cleanup_session<G: Git + ?Sized>(
    git: &G,
    root: &Path,
    worktree: &Path,
    branch: &str,
) -> Result<(), WorktreeError> {
    git.prune_worktrees(root)?;

    if git.has_uncommitted_changes(worktree)? {
        info!(branch, "committing session snapshot");
        git.commit_and_push(worktree, branch)?;
    }

    git.remove_worktree(worktree, root)?;
    git.prune_worktrees(root)?;
    info!(branch, path = %worktree.display(), "worktree cleaned up");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PluginConfig, WorktreeSyncConfig};
    use crate::git::fixtures::*;
    use crate::git::testing::FakeGit;
    use crate::git::{AheadBehind, GitCli};
    use std::fs;

    fn set_sync(root: &Path, behavior: SyncBehavior) {
        config::write_config(
            root,
            &PluginConfig {
                worktree_sync: Some(WorktreeSyncConfig { behavior }),
                ..PluginConfig::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn not_a_repository_short_circuits() {
        let tmp = tempfile::tempdir().unwrap();
        let git = FakeGit {
            repository: false,
            ..FakeGit::default()
        };

        let err = create_session(&git, tmp.path(), "feat/x").unwrap_err();
        assert!(matches!(err, WorktreeError::NotAGitRepo));
        assert_eq!(git.ops(), vec!["is_repository"]);
        assert!(!paths::worktrees_root(tmp.path()).exists());
    }

    #[test]
    fn detached_head_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let git = FakeGit {
            branch: String::new(),
            ..FakeGit::default()
        };

        let err = create_session(&git, tmp.path(), "feat/x").unwrap_err();
        assert!(matches!(err, WorktreeError::DetachedHead));
        assert_eq!(git.ops(), vec!["is_repository", "current_branch"]);
    }

    #[test]
    fn new_branch_forks_from_current_branch() {
        let tmp = tempfile::tempdir().unwrap();
        let git = FakeGit {
            branch: "develop".to_string(),
            ..FakeGit::default()
        };

        let path = create_session(&git, tmp.path(), "feat/x").unwrap();
        assert_eq!(path, tmp.path().join(".opencode/worktrees/feat/x"));
        assert_eq!(
            git.ops(),
            vec![
                "is_repository",
                "current_branch",
                "local_branch_exists",
                "remote_branch_exists",
                "create_worktree",
            ]
        );
        let create = git.calls().pop().unwrap();
        assert!(create.ends_with("feat/x develop"), "call: {create}");
        assert!(paths::worktrees_root(tmp.path()).is_dir());
    }

    #[test]
    fn remote_only_branch_is_checked_out_with_fetch() {
        let tmp = tempfile::tempdir().unwrap();
        let git = FakeGit {
            remote_exists: true,
            ..FakeGit::default()
        };

        create_session(&git, tmp.path(), "feat/x").unwrap();
        let last = git.calls().pop().unwrap();
        assert!(last.starts_with("checkout_existing_branch"));
        assert!(last.ends_with("feat/x true"), "call: {last}");
        assert!(!git.called("create_worktree"));
        assert!(!git.called("ahead_behind"));
    }

    #[test]
    fn existing_target_path_is_rejected_before_checkout() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(paths::worktree_path(tmp.path(), "feat/x")).unwrap();
        let git = FakeGit::default();

        let err = create_session(&git, tmp.path(), "feat/x").unwrap_err();
        assert!(matches!(err, WorktreeError::WorktreePathExists { .. }));
        assert!(!git.called("create_worktree"));
        assert!(!git.called("checkout_existing_branch"));
    }

    #[test]
    fn local_branch_with_never_sync_touches_no_remote() {
        let tmp = tempfile::tempdir().unwrap();
        set_sync(tmp.path(), SyncBehavior::Never);
        let git = FakeGit {
            local_exists: true,
            remote_exists: true,
            counts: AheadBehind {
                origin_ahead: 5,
                local_ahead: 0,
            },
            ..FakeGit::default()
        };

        create_session(&git, tmp.path(), "feat/x").unwrap();
        let last = git.calls().pop().unwrap();
        assert!(last.ends_with("feat/x false"), "call: {last}");
        assert!(!git.called("fetch_branch"));
        assert!(!git.called("fast_forward_merge"));
        assert!(!git.called("ahead_behind"));
    }

    #[test]
    fn local_branch_with_always_sync_fetches_and_fast_forwards() {
        let tmp = tempfile::tempdir().unwrap();
        set_sync(tmp.path(), SyncBehavior::Always);
        let git = FakeGit {
            local_exists: true,
            ..FakeGit::default()
        };

        create_session(&git, tmp.path(), "feat/x").unwrap();
        let ops = git.ops();
        assert_eq!(
            &ops[ops.len() - 3..],
            ["checkout_existing_branch", "fetch_branch", "fast_forward_merge"]
        );
        assert!(!git.called("ahead_behind"));
    }

    #[test]
    fn prefer_local_syncs_only_when_strictly_behind() {
        let cases = [
            (3, 0, true),
            (0, 0, false),
            (0, 2, false),
            (3, 2, false),
        ];
        for (origin_ahead, local_ahead, expect_sync) in cases {
            let tmp = tempfile::tempdir().unwrap();
            let git = FakeGit {
                local_exists: true,
                counts: AheadBehind {
                    origin_ahead,
                    local_ahead,
                },
                ..FakeGit::default()
            };

            create_session(&git, tmp.path(), "feat/x").unwrap();
            assert!(git.called("ahead_behind"));
            assert_eq!(
                git.called("fetch_branch"),
                expect_sync,
                "origin_ahead={origin_ahead} local_ahead={local_ahead}"
            );
            assert_eq!(git.called("fast_forward_merge"), expect_sync);
        }
    }

    #[test]
    fn fast_forward_failure_is_swallowed() {
        let tmp = tempfile::tempdir().unwrap();
        set_sync(tmp.path(), SyncBehavior::Always);
        let git = FakeGit {
            local_exists: true,
            fail_on: Some("fast_forward_merge"),
            ..FakeGit::default()
        };

        let path = create_session(&git, tmp.path(), "feat/x").unwrap();
        assert_eq!(path, paths::worktree_path(tmp.path(), "feat/x"));
    }

    #[test]
    fn sync_failure_maps_to_reconciliation_error() {
        let git = FakeGit {
            fail_on: Some("fetch_branch"),
            ..FakeGit::default()
        };
        let err = sync_existing_branch(
            &git,
            Path::new("/repo"),
            Path::new("/repo/.opencode/worktrees/feat/x"),
            "feat/x",
            SyncBehavior::Always,
        )
        .unwrap_err();
        assert!(matches!(err, WorktreeError::SyncReconciliation { ref branch, .. } if branch == "feat/x"));
        assert!(!git.called("fast_forward_merge"));
    }

    #[test]
    fn checkout_failure_propagates() {
        let tmp = tempfile::tempdir().unwrap();
        let git = FakeGit {
            fail_on: Some("create_worktree"),
            ..FakeGit::default()
        };
        let err = create_session(&git, tmp.path(), "feat/x").unwrap_err();
        assert_eq!(err.kind(), "subprocess_failure");
    }

    #[test]
    fn cleanup_clean_worktree_skips_commit() {
        let git = FakeGit::default();
        cleanup_session(
            &git,
            Path::new("/repo"),
            Path::new("/repo/.opencode/worktrees/feat/x"),
            "feat/x",
        )
        .unwrap();
        assert_eq!(
            git.ops(),
            vec![
                "prune_worktrees",
                "has_uncommitted_changes",
                "remove_worktree",
                "prune_worktrees",
            ]
        );
    }

    #[test]
    fn cleanup_dirty_worktree_commits_then_removes() {
        let git = FakeGit {
            dirty: true,
            ..FakeGit::default()
        };
        cleanup_session(
            &git,
            Path::new("/repo"),
            Path::new("/repo/.opencode/worktrees/feat/x"),
            "feat/x",
        )
        .unwrap();
        assert_eq!(
            git.ops(),
            vec![
                "prune_worktrees",
                "has_uncommitted_changes",
                "commit_and_push",
                "remove_worktree",
                "prune_worktrees",
            ]
        );
    }

    #[test]
    fn cleanup_stops_at_first_failure() {
        let git = FakeGit {
            dirty: true,
            fail_on: Some("commit_and_push"),
            ..FakeGit::default()
        };
        let err = cleanup_session(
            &git,
            Path::new("/repo"),
            Path::new("/repo/.opencode/worktrees/feat/x"),
            "feat/x",
        )
        .unwrap_err();
        assert!(matches!(err, WorktreeError::Git { .. }));
        assert!(!git.called("remove_worktree"));
    }

    #[test]
    fn real_git_new_branch_round_trip() {
        let Some((_tmp, repo, origin)) = init_repo_with_origin() else {
            return;
        };
        let cli = GitCli::new();

        let path = create_session(&cli, &repo, "feat/x").unwrap();
        assert_eq!(path, repo.join(".opencode/worktrees/feat/x"));
        assert!(path.join("README.md").is_file());
        assert_eq!(cli.current_branch(&path).unwrap(), "feat/x");

        fs::write(path.join("work.txt"), "session output\n").unwrap();
        cleanup_session(&cli, &repo, &path, "feat/x").unwrap();

        assert!(!path.exists());
        let pushed = git_ok(&origin, &["log", "-1", "--format=%s", "feat/x"]);
        assert_eq!(pushed, crate::git::SNAPSHOT_COMMIT_MESSAGE);
    }

    #[test]
    fn real_git_second_create_for_same_branch_fails() {
        let Some((_tmp, repo, _origin)) = init_repo_with_origin() else {
            return;
        };
        let cli = GitCli::new();

        create_session(&cli, &repo, "feat/x").unwrap();
        let err = create_session(&cli, &repo, "feat/x").unwrap_err();
        assert!(matches!(err, WorktreeError::WorktreePathExists { .. }));
    }

    #[test]
    fn real_git_remote_only_branch_tracks_origin() {
        let Some((tmp, repo, origin)) = init_repo_with_origin() else {
            return;
        };
        let upstream = clone_origin(tmp.path(), &origin, "upstream");
        git_ok(&upstream, &["checkout", "-q", "-b", "feat/remote"]);
        commit_file(&upstream, "r.txt", "r", "remote work");
        git_ok(&upstream, &["push", "-q", "-u", "origin", "feat/remote"]);

        let cli = GitCli::new();
        let path = create_session(&cli, &repo, "feat/remote").unwrap();
        assert!(path.join("r.txt").is_file());
        assert!(cli.local_branch_exists("feat/remote", &repo));
    }

    #[test]
    fn real_git_name_suffix_of_remote_branch_creates_new_branch() {
        let Some((tmp, repo, origin)) = init_repo_with_origin() else {
            return;
        };
        let upstream = clone_origin(tmp.path(), &origin, "upstream");
        git_ok(&upstream, &["checkout", "-q", "-b", "feat/x"]);
        commit_file(&upstream, "x.txt", "x", "remote work");
        git_ok(&upstream, &["push", "-q", "origin", "feat/x"]);

        let cli = GitCli::new();
        let path = create_session(&cli, &repo, "x").unwrap();
        assert_eq!(path, repo.join(".opencode/worktrees/x"));
        assert_eq!(cli.current_branch(&path).unwrap(), "x");
        assert!(!path.join("x.txt").exists());
    }

    #[test]
    fn real_git_prefer_local_fast_forwards_stale_branch() {
        let Some((tmp, repo, origin)) = init_repo_with_origin() else {
            return;
        };
        git_ok(&repo, &["branch", "feat/y"]);
        git_ok(&repo, &["push", "-q", "origin", "feat/y"]);

        let upstream = clone_origin(tmp.path(), &origin, "upstream");
        git_ok(&upstream, &["checkout", "-q", "feat/y"]);
        commit_file(&upstream, "u.txt", "u", "upstream work");
        git_ok(&upstream, &["push", "-q", "origin", "feat/y"]);
        git_ok(&repo, &["fetch", "-q", "origin"]);

        let cli = GitCli::new();
        let path = create_session(&cli, &repo, "feat/y").unwrap();
        assert!(path.join("u.txt").is_file());
    }

    #[test]
    fn real_git_never_sync_keeps_local_branch() {
        let Some((tmp, repo, origin)) = init_repo_with_origin() else {
            return;
        };
        set_sync(&repo, SyncBehavior::Never);
        git_ok(&repo, &["branch", "feat/y"]);
        git_ok(&repo, &["push", "-q", "origin", "feat/y"]);

        let upstream = clone_origin(tmp.path(), &origin, "upstream");
        git_ok(&upstream, &["checkout", "-q", "feat/y"]);
        commit_file(&upstream, "u.txt", "u", "upstream work");
        git_ok(&upstream, &["push", "-q", "origin", "feat/y"]);
        git_ok(&repo, &["fetch", "-q", "origin"]);

        let cli = GitCli::new();
        let path = create_session(&cli, &repo, "feat/y").unwrap();
        assert!(!path.join("u.txt").exists());
    }
}
