use std::path::{Component, Path, PathBuf};

/// Per-repository directory holding state, config, logs and worktrees.
pub const CONFIG_DIR: &str = ".opencode";
/// Subdirectory of [`CONFIG_DIR`] that holds session worktrees.
pub const WORKTREES_DIR: &str = "worktrees";

pub const STATE_FILE_NAME: &str = "worktree-session-state.json";
pub const CONFIG_FILE_NAME: &str = "opencode-worktree-session-config.json";
pub const ACTIVITY_LOG_FILE_NAME: &str = "worktree-session.log.jsonl";

/// Resolve the repository root that owns `dir`.
///
/// A session worktree lives at `<root>/.opencode/worktrees/<branch>`, so any
/// path containing the `.opencode/worktrees` pair resolves to everything
/// before it. Any other path is its own root.
pub fn resolve_repo_root(dir: &Path) -> PathBuf {
    main_repo_from_worktree(dir).unwrap_or_else(|| dir.to_path_buf())
}

/// Root of the main checkout when `dir` is inside a session worktree.
pub fn main_repo_from_worktree(dir: &Path) -> Option<PathBuf> {
    let components: Vec<Component<'_>> = dir.components().collect();
    let split = components.windows(2).position(|pair| {
        pair[0].as_os_str() == CONFIG_DIR && pair[1].as_os_str() == WORKTREES_DIR
    })?;
    Some(components[..split].iter().collect())
}

/// Whether `dir` is (inside) a session worktree.
pub fn is_session_worktree(dir: &Path) -> bool {
    main_repo_from_worktree(dir).is_some()
}

pub fn config_dir(root: &Path) -> PathBuf {
    root.join(CONFIG_DIR)
}

pub fn worktrees_root(root: &Path) -> PathBuf {
    config_dir(root).join(WORKTREES_DIR)
}

/// Target worktree directory for `branch`. Slashes in the branch name nest.
pub fn worktree_path(root: &Path, branch: &str) -> PathBuf {
    branch
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(worktrees_root(root), |path, segment| path.join(segment))
}

pub fn state_file(root: &Path) -> PathBuf {
    config_dir(root).join(STATE_FILE_NAME)
}

pub fn config_file(root: &Path) -> PathBuf {
    config_dir(root).join(CONFIG_FILE_NAME)
}

pub fn activity_log_file(root: &Path) -> PathBuf {
    config_dir(root).join(ACTIVITY_LOG_FILE_NAME)
}
