//! Per-session git worktrees for AI coding agents.
//!
//! An agent session can ask for its own branch checked out in
//! `<repo>/.opencode/worktrees/<branch>`. Opening the new terminal and
//! removing the worktree are deferred until the agent's turn has finished,
//! tracked per session in a small JSON state file.

pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod hooks;
pub mod log;
pub mod paths;
pub mod plugin;
pub mod prompt;
pub mod render;
pub mod shell_completion;
pub mod state;
pub mod terminal;
pub mod worktree;

pub use error::WorktreeError;
pub use git::{Git, GitCli};
pub use plugin::{
    HostEvent, Launcher, PluginContext, Response, SystemLauncher, Toast, ToastVariant,
    WorktreeSessionPlugin,
};
