//! System-prompt additions for the host agent.
//!
//! An agent running in the main checkout is nudged toward `createWorktree`;
//! one running inside a session worktree gets strict rules about what it may
//! do once `deleteWorktree` has been called, since the directory it is
//! sitting in will disappear.

use std::path::Path;

use crate::paths;

pub const CREATE_WORKTREE_HINT: &str = "IMPORTANT: A 'createWorktree' tool is available for creating isolated git worktrees. \
When the user mentions creating a branch or wants to start a new feature, proactively suggest or use this tool. \
Ask for a branch name if not provided.";

pub const WORKTREE_SESSION_RULES: &str = "WORKTREE SESSION RULES (STRICT):\n\
1) When finished, tell the user they can run the 'deleteWorktree' tool.\n\
2) If 'deleteWorktree' is executed: STOP. Do not run ANY shell commands (no git/pwd/ls/cat), do not list/read files, \
and do not call any other tools afterward. The worktree directory may no longer exist and the working directory can be invalid.\n\
3) If verification is needed, ASK the user to run verification commands from the repository root \
(outside the deleted worktree) and paste the output.";

/// Prompt fragments for an agent whose host worktree is `worktree`.
pub fn system_prompts(worktree: &Path) -> Vec<&'static str> {
    if paths::is_session_worktree(worktree) {
        vec![WORKTREE_SESSION_RULES]
    } else {
        vec![CREATE_WORKTREE_HINT]
    }
}
