//! Shell completion generation for the worktree-session CLI.

use std::io;

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{Shell, generate};

use crate::cli::{Cli, CompletionShell};

pub const BIN_NAME: &str = "worktree-session";

fn shell_for(shell: CompletionShell) -> Shell {
    match shell {
        CompletionShell::Bash => Shell::Bash,
        CompletionShell::Zsh => Shell::Zsh,
        CompletionShell::Fish => Shell::Fish,
    }
}

pub fn write_to(shell: CompletionShell, out: &mut dyn io::Write) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell_for(shell), &mut cmd, BIN_NAME, out);
    Ok(())
}

pub fn print(shell: CompletionShell) -> Result<()> {
    write_to(shell, &mut io::stdout())
}
