use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use worktree_session::cli::{Cli, Command};
use worktree_session::plugin::SetTerminalArgs;
use worktree_session::{
    GitCli, PluginContext, SystemLauncher, WorktreeSessionPlugin, config, paths, render,
    shell_completion, state,
};

fn emit(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string(value).context("failed to serialize response")?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{json}").context("failed to write response")?;
    Ok(())
}

fn read_event(json: Option<String>) -> Result<String> {
    match json {
        Some(json) => Ok(json),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read event from stdin")?;
            Ok(buf)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the host response; diagnostics go to stderr.
    let default_filter = match cli.verbose {
        0 => "worktree_session=warn",
        1 => "worktree_session=info",
        2 => "worktree_session=debug",
        _ => "worktree_session=trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let directory = match cli.directory {
        Some(dir) => dir,
        None => std::env::current_dir()
            .context("failed to get current directory (was it deleted?)")?,
    };
    let worktree: PathBuf = cli.worktree.unwrap_or_else(|| directory.clone());
    debug!(directory = %directory.display(), worktree = %worktree.display(), "plugin context");

    let plugin = WorktreeSessionPlugin::new(
        GitCli::new(),
        SystemLauncher,
        PluginContext {
            directory: directory.clone(),
            worktree,
        },
    );

    match cli.command {
        Command::Event { json } => {
            let raw = read_event(json)?;
            emit(&plugin.handle_raw_event(&raw))
        }
        Command::CreateWorktree { session, branch } => {
            emit(&plugin.create_worktree(&session, &branch))
        }
        Command::DeleteWorktree { session } => emit(&plugin.delete_worktree(&session)),
        Command::SetPostWorktreeHook { cmd, args } => {
            emit(&plugin.set_post_worktree_hook(&cmd, args.as_deref()))
        }
        Command::SetWorktreeSync { behavior } => emit(&plugin.set_worktree_sync(&behavior)),
        Command::SetTerminal {
            mode,
            bin,
            args,
            working_directory_argument,
            command_flag,
            terminal,
        } => emit(&plugin.set_terminal(&SetTerminalArgs {
            mode,
            bin,
            args,
            working_directory_argument,
            command_flag,
            terminal,
        })),
        Command::SystemPrompt => emit(&plugin.system_prompts()),
        Command::Tools => emit(&plugin.tool_names()),
        Command::Sessions => {
            let sessions = state::list_sessions(&directory);
            print!("{}", render::render_sessions_human(&sessions));
            Ok(())
        }
        Command::Config { json } => {
            let config = config::load_config(&directory);
            let config_path = paths::config_file(&paths::resolve_repo_root(&directory));
            if json {
                println!("{}", render::render_config_json(&config, &config_path)?);
            } else {
                print!("{}", render::render_config_human(&config, &config_path));
            }
            Ok(())
        }
        Command::Completions { shell } => shell_completion::print(shell),
    }
}
