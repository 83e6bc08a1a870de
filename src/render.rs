//! Text and JSON renderings for the `config` and `sessions` commands.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{PluginConfig, TerminalConfig};
use crate::plugin;
use crate::state::{DeferredAction, SessionRecord};

fn config_source_label(config_path: &Path) -> String {
    if config_path.is_file() {
        config_path.display().to_string()
    } else {
        format!("(defaults; no {} found)", config_path.display())
    }
}

fn push_kv(output: &mut String, key: &str, value: impl std::fmt::Display) {
    output.push_str(&format!("  {key:<28} {value}\n"));
}

fn terminal_label(terminal: &TerminalConfig) -> String {
    match terminal {
        TerminalConfig::Default => "default (auto-detection)".to_string(),
        TerminalConfig::Custom {
            bin,
            args,
            working_directory_argument,
            command_flag,
        } => {
            let mut parts = vec![bin.as_str()];
            parts.extend(args.as_deref());
            parts.extend([
                working_directory_argument.as_str(),
                "<path>",
                command_flag.as_str(),
            ]);
            format!("custom ({})", parts.join(" "))
        }
        TerminalConfig::Specific { terminal } => format!("specific ({terminal})"),
    }
}

pub fn render_config_human(config: &PluginConfig, config_path: &Path) -> String {
    let mut output = String::new();
    output.push_str("Worktree Sync\n");
    push_kv(&mut output, "behavior", config.sync_behavior());
    output.push('\n');

    output.push_str("Post-Worktree Hook\n");
    match &config.post_worktree {
        Some(post) => {
            push_kv(&mut output, "cmd", &post.cmd);
            push_kv(&mut output, "args", post.args.as_deref().unwrap_or("(none)"));
        }
        None => push_kv(&mut output, "cmd", "(none)"),
    }
    output.push('\n');

    output.push_str("Terminal\n");
    push_kv(&mut output, "mode", terminal_label(config.terminal()));
    output.push('\n');

    output.push_str("Tools\n");
    push_kv(&mut output, "tools_exposed", config.tools_exposed());
    push_kv(&mut output, "offered", plugin::tool_names(config).join(", "));
    output.push('\n');

    output.push_str("Source Path\n");
    push_kv(&mut output, "path", config_source_label(config_path));

    output
}

pub fn render_config_json(config: &PluginConfig, config_path: &Path) -> Result<String> {
    let payload = serde_json::json!({
        "worktreeSync": { "behavior": config.sync_behavior() },
        "postWorktree": config.post_worktree,
        "terminal": config.terminal(),
        "toolsExposed": config.tools_exposed(),
        "tools": plugin::tool_names(config),
        "source_path": config_source_label(config_path),
    });

    serde_json::to_string_pretty(&payload).context("failed to serialize config to JSON")
}

fn deferred_label(deferred: &DeferredAction) -> &'static str {
    match deferred {
        DeferredAction::Idle => "idle",
        DeferredAction::AwaitingSpawn(_) => "awaiting spawn",
        DeferredAction::AwaitingDeletion(_) => "awaiting deletion",
    }
}

pub fn render_sessions_human(sessions: &[SessionRecord]) -> String {
    if sessions.is_empty() {
        return "No recorded sessions\n".to_string();
    }

    let mut output = String::new();
    for record in sessions {
        let created = chrono::DateTime::from_timestamp_millis(record.created_at)
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| record.created_at.to_string());
        output.push_str(&format!("{}\n", record.session_id));
        match &record.worktree {
            Some(binding) => {
                push_kv(&mut output, "branch", &binding.branch);
                push_kv(&mut output, "worktree", binding.worktree_path.display());
            }
            None => push_kv(&mut output, "worktree", "(none)"),
        }
        push_kv(&mut output, "created", created);
        push_kv(&mut output, "deferred", deferred_label(&record.deferred));
    }
    output
}
