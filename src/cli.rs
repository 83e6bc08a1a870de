use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "worktree-session",
    about = "Per-session git worktrees for AI coding agents",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory the host instance was opened in (default: current directory)
    #[arg(long, global = true)]
    pub directory: Option<PathBuf>,

    /// Worktree reported by the host (default: the directory)
    #[arg(long, global = true)]
    pub worktree: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Handle one host lifecycle event (JSON)
    Event {
        /// Event document; read from stdin when omitted
        #[arg(long)]
        json: Option<String>,
    },

    /// Create a worktree for a session and schedule its terminal
    CreateWorktree {
        #[arg(long)]
        session: String,

        #[arg(long)]
        branch: String,
    },

    /// Schedule commit, push and removal of the current session worktree
    DeleteWorktree {
        #[arg(long)]
        session: String,
    },

    /// Configure the command run after a worktree opens
    SetPostWorktreeHook {
        #[arg(long)]
        cmd: String,

        /// Arguments placed before the worktree path
        #[arg(long, allow_hyphen_values = true)]
        args: Option<String>,
    },

    /// Configure how existing local branches sync with origin
    SetWorktreeSync {
        /// always, never or prefer-local
        #[arg(long)]
        behavior: String,
    },

    /// Configure the terminal used to open worktrees
    SetTerminal {
        /// default, custom or specific
        #[arg(long)]
        mode: String,

        #[arg(long)]
        bin: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        args: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        working_directory_argument: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        command_flag: Option<String>,

        /// Alacritty, iTerm, iTerm2 or Terminal
        #[arg(long)]
        terminal: Option<String>,
    },

    /// Print system prompt additions for the host
    SystemPrompt,

    /// List the tools offered to the host
    Tools,

    /// List recorded sessions
    Sessions,

    /// Show effective configuration
    Config {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
