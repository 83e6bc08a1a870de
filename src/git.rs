//! Git command facade.
//!
//! Every operation is one or more blocking `git` subprocess calls run in a
//! given working directory. Branch names and paths are passed as discrete
//! argv entries, never through a shell. Probes (`is_repository`,
//! `*_branch_exists`) fold failure into `false`; `ahead_behind` folds it into
//! "in sync"; everything else propagates [`WorktreeError::Git`].

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::{Command, Output};

use tracing::debug;

use crate::error::WorktreeError;

/// Message used for the snapshot commit made during cleanup.
pub const SNAPSHOT_COMMIT_MESSAGE: &str = "chore(opencode): session snapshot";

/// Remote every sync/push operation talks to.
pub const REMOTE: &str = "origin";

/// Commits each side has that the other lacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AheadBehind {
    /// Commits on `origin/<branch>` missing locally.
    pub origin_ahead: u32,
    /// Commits on the local branch missing from `origin/<branch>`.
    pub local_ahead: u32,
}

/// Operations the lifecycle needs from git.
///
/// `GitCli` is the real implementation; tests substitute a recording fake.
pub trait Git {
    fn is_repository(&self, dir: &Path) -> bool;

    /// Current branch name; empty string on detached HEAD.
    fn current_branch(&self, dir: &Path) -> Result<String, WorktreeError>;

    fn has_uncommitted_changes(&self, dir: &Path) -> Result<bool, WorktreeError>;

    fn local_branch_exists(&self, branch: &str, dir: &Path) -> bool;

    fn remote_branch_exists(&self, branch: &str, dir: &Path) -> bool;

    /// Create `new_branch` from `base_branch` and check it out at `path`.
    fn create_worktree(
        &self,
        path: &Path,
        new_branch: &str,
        base_branch: &str,
        dir: &Path,
    ) -> Result<(), WorktreeError>;

    /// Check out an existing branch at `path`.
    ///
    /// With `fetch_first` the branch only exists on origin: it is fetched and
    /// a local branch tracking `origin/<branch>` is created for the worktree.
    fn checkout_existing_branch(
        &self,
        path: &Path,
        branch: &str,
        dir: &Path,
        fetch_first: bool,
    ) -> Result<(), WorktreeError>;

    fn fetch_branch(&self, branch: &str, dir: &Path) -> Result<(), WorktreeError>;

    fn ahead_behind(&self, branch: &str, dir: &Path) -> AheadBehind;

    /// Fast-forward the worktree's branch to `origin/<branch>`. Fails when
    /// histories diverged.
    fn fast_forward_merge(&self, branch: &str, worktree: &Path) -> Result<(), WorktreeError>;

    /// Stage everything, commit with [`SNAPSHOT_COMMIT_MESSAGE`] and push
    /// with upstream tracking.
    fn commit_and_push(&self, worktree: &Path, branch: &str) -> Result<(), WorktreeError>;

    fn remove_worktree(&self, path: &Path, dir: &Path) -> Result<(), WorktreeError>;

    fn prune_worktrees(&self, dir: &Path) -> Result<(), WorktreeError>;
}

/// [`Git`] backed by the `git` executable on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }
}

fn run_git<I, S>(dir: &Path, args: I) -> Result<(Vec<OsString>, Output), WorktreeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<OsString> = args
        .into_iter()
        .map(|arg| arg.as_ref().to_os_string())
        .collect();
    debug!(dir = %dir.display(), args = %render_args(&args), "git");
    let output = Command::new("git")
        .current_dir(dir)
        .args(&args)
        .output()
        .map_err(|source| WorktreeError::GitUnavailable {
            dir: dir.to_path_buf(),
            source,
        })?;
    Ok((args, output))
}

fn render_args(args: &[OsString]) -> String {
    args.iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run git and return trimmed stdout, or the failure with stderr attached.
fn git<I, S>(dir: &Path, args: I) -> Result<String, WorktreeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let (args, output) = run_git(dir, args)?;
    if !output.status.success() {
        return Err(WorktreeError::Git {
            command: render_args(&args),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run git purely for its exit status. Spawn failures count as `false`.
fn git_succeeds<I, S>(dir: &Path, args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_git(dir, args)
        .map(|(_, output)| output.status.success())
        .unwrap_or(false)
}

fn remote_ref(branch: &str) -> String {
    format!("{REMOTE}/{branch}")
}

/// Parse `rev-list --left-right --count` output (`"<left>\t<right>"`).
fn parse_left_right(stdout: &str) -> Option<AheadBehind> {
    let mut counts = stdout.split_whitespace();
    let origin_ahead = counts.next()?.parse().ok()?;
    let local_ahead = counts.next()?.parse().ok()?;
    if counts.next().is_some() {
        return None;
    }
    Some(AheadBehind {
        origin_ahead,
        local_ahead,
    })
}

impl Git for GitCli {
    fn is_repository(&self, dir: &Path) -> bool {
        git_succeeds(dir, ["rev-parse", "--is-inside-work-tree"])
    }

    fn current_branch(&self, dir: &Path) -> Result<String, WorktreeError> {
        git(dir, ["branch", "--show-current"])
    }

    fn has_uncommitted_changes(&self, dir: &Path) -> Result<bool, WorktreeError> {
        Ok(!git(dir, ["status", "--porcelain"])?.is_empty())
    }

    fn local_branch_exists(&self, branch: &str, dir: &Path) -> bool {
        let ref_name = format!("refs/heads/{branch}");
        git_succeeds(dir, ["show-ref", "--verify", "--quiet", ref_name.as_str()])
    }

    fn remote_branch_exists(&self, branch: &str, dir: &Path) -> bool {
        // A bare name is a tail match; `feat/x` would satisfy `x`.
        let ref_name = format!("refs/heads/{branch}");
        git_succeeds(
            dir,
            ["ls-remote", "--exit-code", "--heads", REMOTE, ref_name.as_str()],
        )
    }

    fn create_worktree(
        &self,
        path: &Path,
        new_branch: &str,
        base_branch: &str,
        dir: &Path,
    ) -> Result<(), WorktreeError> {
        git(
            dir,
            [
                OsStr::new("worktree"),
                OsStr::new("add"),
                path.as_os_str(),
                OsStr::new("-b"),
                OsStr::new(new_branch),
                OsStr::new(base_branch),
            ],
        )
        .map(drop)
    }

    fn checkout_existing_branch(
        &self,
        path: &Path,
        branch: &str,
        dir: &Path,
        fetch_first: bool,
    ) -> Result<(), WorktreeError> {
        if !fetch_first {
            return git(
                dir,
                [
                    OsStr::new("worktree"),
                    OsStr::new("add"),
                    path.as_os_str(),
                    OsStr::new(branch),
                ],
            )
            .map(drop);
        }

        self.fetch_branch(branch, dir)?;
        let upstream = remote_ref(branch);
        git(
            dir,
            [
                OsStr::new("worktree"),
                OsStr::new("add"),
                OsStr::new("--track"),
                OsStr::new("-b"),
                OsStr::new(branch),
                path.as_os_str(),
                OsStr::new(&upstream),
            ],
        )
        .map(drop)
    }

    fn fetch_branch(&self, branch: &str, dir: &Path) -> Result<(), WorktreeError> {
        let refspec = format!("+refs/heads/{branch}:refs/remotes/{REMOTE}/{branch}");
        git(dir, ["fetch", REMOTE, refspec.as_str()]).map(drop)
    }

    fn ahead_behind(&self, branch: &str, dir: &Path) -> AheadBehind {
        let range = format!("{}...{branch}", remote_ref(branch));
        match git(dir, ["rev-list", "--left-right", "--count", range.as_str()]) {
            Ok(stdout) => parse_left_right(&stdout).unwrap_or_default(),
            Err(err) => {
                debug!(branch, error = %err, "ahead/behind unavailable; treating as in sync");
                AheadBehind::default()
            }
        }
    }

    fn fast_forward_merge(&self, branch: &str, worktree: &Path) -> Result<(), WorktreeError> {
        let upstream = remote_ref(branch);
        git(worktree, ["merge", "--ff-only", upstream.as_str()]).map(drop)
    }

    fn commit_and_push(&self, worktree: &Path, branch: &str) -> Result<(), WorktreeError> {
        git(worktree, ["add", "-A"])?;
        git(worktree, ["commit", "-m", SNAPSHOT_COMMIT_MESSAGE])?;
        git(worktree, ["push", "-u", REMOTE, branch])?;
        Ok(())
    }

    fn remove_worktree(&self, path: &Path, dir: &Path) -> Result<(), WorktreeError> {
        git(
            dir,
            [
                OsStr::new("worktree"),
                OsStr::new("remove"),
                path.as_os_str(),
                OsStr::new("--force"),
            ],
        )
        .map(drop)
    }

    fn prune_worktrees(&self, dir: &Path) -> Result<(), WorktreeError> {
        git(dir, ["worktree", "prune"]).map(drop)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording [`Git`] double for lifecycle and adapter tests.

    use std::cell::RefCell;
    use std::path::Path;

    use super::{AheadBehind, Git};
    use crate::error::WorktreeError;

    #[derive(Debug)]
    pub struct FakeGit {
        pub repository: bool,
        pub branch: String,
        pub local_exists: bool,
        pub remote_exists: bool,
        pub dirty: bool,
        pub counts: AheadBehind,
        /// Operation name that should fail (e.g. `"fast_forward_merge"`).
        pub fail_on: Option<&'static str>,
        pub calls: RefCell<Vec<String>>,
    }

    impl Default for FakeGit {
        fn default() -> Self {
            Self {
                repository: true,
                branch: "main".to_string(),
                local_exists: false,
                remote_exists: false,
                dirty: false,
                counts: AheadBehind::default(),
                fail_on: None,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl FakeGit {
        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        /// Names of the recorded operations, without arguments.
        pub fn ops(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|call| call.split(' ').next().unwrap_or_default().to_string())
                .collect()
        }

        pub fn called(&self, op: &str) -> bool {
            self.ops().iter().any(|name| name == op)
        }

        fn record(&self, op: &'static str, detail: String) -> Result<(), WorktreeError> {
            self.calls.borrow_mut().push(format!("{op} {detail}"));
            if self.fail_on == Some(op) {
                return Err(WorktreeError::Git {
                    command: op.to_string(),
                    stderr: format!("{op} failed"),
                });
            }
            Ok(())
        }
    }

    impl Git for FakeGit {
        fn is_repository(&self, dir: &Path) -> bool {
            let _ = self.record("is_repository", dir.display().to_string());
            self.repository
        }

        fn current_branch(&self, dir: &Path) -> Result<String, WorktreeError> {
            self.record("current_branch", dir.display().to_string())?;
            Ok(self.branch.clone())
        }

        fn has_uncommitted_changes(&self, dir: &Path) -> Result<bool, WorktreeError> {
            self.record("has_uncommitted_changes", dir.display().to_string())?;
            Ok(self.dirty)
        }

        fn local_branch_exists(&self, branch: &str, _dir: &Path) -> bool {
            let _ = self.record("local_branch_exists", branch.to_string());
            self.local_exists
        }

        fn remote_branch_exists(&self, branch: &str, _dir: &Path) -> bool {
            let _ = self.record("remote_branch_exists", branch.to_string());
            self.remote_exists
        }

        fn create_worktree(
            &self,
            path: &Path,
            new_branch: &str,
            base_branch: &str,
            _dir: &Path,
        ) -> Result<(), WorktreeError> {
            self.record(
                "create_worktree",
                format!("{} {new_branch} {base_branch}", path.display()),
            )
        }

        fn checkout_existing_branch(
            &self,
            path: &Path,
            branch: &str,
            _dir: &Path,
            fetch_first: bool,
        ) -> Result<(), WorktreeError> {
            self.record(
                "checkout_existing_branch",
                format!("{} {branch} {fetch_first}", path.display()),
            )
        }

        fn fetch_branch(&self, branch: &str, _dir: &Path) -> Result<(), WorktreeError> {
            self.record("fetch_branch", branch.to_string())
        }

        fn ahead_behind(&self, branch: &str, _dir: &Path) -> AheadBehind {
            let _ = self.record("ahead_behind", branch.to_string());
            self.counts
        }

        fn fast_forward_merge(&self, branch: &str, worktree: &Path) -> Result<(), WorktreeError> {
            self.record(
                "fast_forward_merge",
                format!("{branch} {}", worktree.display()),
            )
        }

        fn commit_and_push(&self, worktree: &Path, branch: &str) -> Result<(), WorktreeError> {
            self.record("commit_and_push", format!("{} {branch}", worktree.display()))
        }

        fn remove_worktree(&self, path: &Path, _dir: &Path) -> Result<(), WorktreeError> {
            self.record("remove_worktree", path.display().to_string())
        }

        fn prune_worktrees(&self, dir: &Path) -> Result<(), WorktreeError> {
            self.record("prune_worktrees", dir.display().to_string())
        }
    }
}
