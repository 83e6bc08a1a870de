//! Post-worktree hook: an editor or script started once a worktree opens.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::config;
use crate::terminal::LaunchCommand;

pub const POST_CMD_ENV: &str = "OPENCODE_POST_CMD";
pub const POST_CMD_ARGS_ENV: &str = "OPENCODE_POST_CMD_ARGS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookOutcome {
    pub executed: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookSource {
    Env,
    Config,
}

impl HookSource {
    fn label(self) -> &'static str {
        match self {
            HookSource::Env => "env",
            HookSource::Config => "config",
        }
    }
}

/// The hook to run for `worktree`, if any. Environment wins over config.
pub fn resolve_post_worktree_hook(root: &Path, worktree: &Path) -> Option<LaunchCommand> {
    resolve_with_source(root, worktree).map(|(_, command)| command)
}

fn resolve_with_source(root: &Path, worktree: &Path) -> Option<(HookSource, LaunchCommand)> {
    let env_cmd = std::env::var(POST_CMD_ENV)
        .ok()
        .filter(|cmd| !cmd.trim().is_empty());
    let (source, cmd, args) = match env_cmd {
        Some(cmd) => (
            HookSource::Env,
            cmd,
            std::env::var(POST_CMD_ARGS_ENV).unwrap_or_default(),
        ),
        None => {
            let post = config::load_config(root).post_worktree?;
            if post.cmd.trim().is_empty() {
                return None;
            }
            (HookSource::Config, post.cmd, post.args.unwrap_or_default())
        }
    };

    let command = LaunchCommand::new(cmd.trim())
        .args(args.split_whitespace())
        .arg(worktree.display().to_string());
    Some((source, command))
}

/// Start the post-worktree hook for `worktree`, detached.
///
/// Never fails: a missing hook or a spawn error is reported in the outcome.
pub fn run_post_worktree_hook(root: &Path, worktree: &Path) -> HookOutcome {
    let Some((source, command)) = resolve_with_source(root, worktree) else {
        return HookOutcome {
            executed: false,
            message: "No post-worktree hook configured".to_string(),
        };
    };

    match command.spawn_detached() {
        Ok(()) => {
            info!(source = source.label(), command = %command.display(), "post-worktree hook started");
            HookOutcome {
                executed: true,
                message: format!("Executed {} hook: {}", source.label(), command.display()),
            }
        }
        Err(err) => {
            warn!(source = source.label(), command = %command.display(), error = %err, "post-worktree hook failed to start");
            HookOutcome {
                executed: false,
                message: format!("Failed to execute {} hook: {err}", source.label()),
            }
        }
    }
}
