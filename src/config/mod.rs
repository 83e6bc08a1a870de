//! Per-repository plugin configuration.
//!
//! Lives at `<root>/.opencode/opencode-worktree-session-config.json`. Every
//! field is optional; a missing or unreadable file is the default config.
//! Updates go through [`update_config`], which merges top-level keys into
//! whatever JSON object is on disk so keys this crate does not know survive.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::paths;

/// How an existing local branch is reconciled with `origin` on checkout.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncBehavior {
    /// Always fetch and fast-forward.
    Always,
    /// Use the local branch as-is. No network access.
    Never,
    /// Fetch and fast-forward only when origin is ahead and local is not.
    #[default]
    PreferLocal,
}

impl SyncBehavior {
    pub const ALL: [SyncBehavior; 3] = [
        SyncBehavior::Always,
        SyncBehavior::Never,
        SyncBehavior::PreferLocal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SyncBehavior::Always => "always",
            SyncBehavior::Never => "never",
            SyncBehavior::PreferLocal => "prefer-local",
        }
    }
}

impl fmt::Display for SyncBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncBehavior {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SyncBehavior::ALL
            .into_iter()
            .find(|behavior| behavior.as_str() == s)
            .ok_or_else(|| format!("unknown sync behavior '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeSyncConfig {
    pub behavior: SyncBehavior,
}

/// Command run after a worktree opens. The worktree path is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostWorktreeConfig {
    pub cmd: String,
    /// Whitespace-separated arguments placed before the worktree path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
}

/// Terminal emulators with a built-in launch recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupportedTerminal {
    Alacritty,
    #[serde(rename = "iTerm")]
    ITerm,
    #[serde(rename = "iTerm2")]
    ITerm2,
    Terminal,
}

impl SupportedTerminal {
    pub const ALL: [SupportedTerminal; 4] = [
        SupportedTerminal::Alacritty,
        SupportedTerminal::ITerm,
        SupportedTerminal::ITerm2,
        SupportedTerminal::Terminal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SupportedTerminal::Alacritty => "Alacritty",
            SupportedTerminal::ITerm => "iTerm",
            SupportedTerminal::ITerm2 => "iTerm2",
            SupportedTerminal::Terminal => "Terminal",
        }
    }

    /// Exact-name lookup, as accepted by the `setTerminal` tool.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Case-insensitive lookup, as accepted from environment variables.
    pub fn from_name_ignore_case(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for SupportedTerminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TerminalConfig {
    /// Platform auto-detection.
    Default,
    /// `<bin> <args> <workingDirectoryArgument> <worktree> <commandFlag> opencode --session <id>`.
    #[serde(rename_all = "camelCase")]
    Custom {
        bin: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<String>,
        working_directory_argument: String,
        command_flag: String,
    },
    Specific { terminal: SupportedTerminal },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_worktree: Option<PostWorktreeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_sync: Option<WorktreeSyncConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalConfig>,
    /// Whether the configuration tools are offered to the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_exposed: Option<bool>,
}

impl PluginConfig {
    pub fn sync_behavior(&self) -> SyncBehavior {
        self.worktree_sync
            .as_ref()
            .map(|sync| sync.behavior)
            .unwrap_or_default()
    }

    pub fn tools_exposed(&self) -> bool {
        self.tools_exposed.unwrap_or(true)
    }

    pub fn terminal(&self) -> &TerminalConfig {
        self.terminal.as_ref().unwrap_or(&TerminalConfig::Default)
    }
}

fn read_raw(root: &Path) -> Option<Map<String, Value>> {
    let path = paths::config_file(root);
    if !path.is_file() {
        return None;
    }
    let parsed = std::fs::read_to_string(&path)
        .map_err(anyhow::Error::from)
        .and_then(|contents| serde_json::from_str::<Value>(&contents).map_err(anyhow::Error::from));
    match parsed {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!(path = %path.display(), "config is not a JSON object; ignoring");
            None
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "config unreadable; ignoring");
            None
        }
    }
}

fn write_raw(root: &Path, map: &Map<String, Value>) -> Result<()> {
    let dir = paths::config_dir(root);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = paths::config_file(root);
    let json = serde_json::to_string_pretty(map).context("failed to serialize config")?;
    std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// Read one top-level key. An invalid value is dropped on its own so the
/// other keys still load.
fn read_key<T: DeserializeOwned>(map: &Map<String, Value>, key: &str, path: &Path) -> Option<T> {
    let value = map.get(key).filter(|value| !value.is_null())?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(path = %path.display(), key, error = %err, "invalid config value; using its default");
            None
        }
    }
}

/// Load the config for the repository owning `dir`.
pub fn load_config(dir: &Path) -> PluginConfig {
    let root = paths::resolve_repo_root(dir);
    let Some(map) = read_raw(&root) else {
        return PluginConfig::default();
    };
    let path = paths::config_file(&root);
    PluginConfig {
        post_worktree: read_key(&map, "postWorktree", &path),
        worktree_sync: read_key(&map, "worktreeSync", &path),
        terminal: read_key(&map, "terminal", &path),
        tools_exposed: read_key(&map, "toolsExposed", &path),
    }
}

/// Overwrite the config file with `config`.
pub fn write_config(dir: &Path, config: &PluginConfig) -> Result<()> {
    let root = paths::resolve_repo_root(dir);
    let value = serde_json::to_value(config).context("failed to serialize config")?;
    let map = match value {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    write_raw(&root, &map)
}

/// Shallow-merge the fields set in `patch` into the stored config.
///
/// Each present top-level key replaces the stored key wholesale. Keys absent
/// from the patch, including ones this crate does not model, are kept.
pub fn update_config(dir: &Path, patch: &PluginConfig) -> Result<PluginConfig> {
    let root = paths::resolve_repo_root(dir);
    let mut map = read_raw(&root).unwrap_or_default();

    let patch = serde_json::to_value(patch).context("failed to serialize config patch")?;
    if let Value::Object(fields) = patch {
        for (key, value) in fields {
            debug!(key = %key, "config key updated");
            map.insert(key, value);
        }
    }

    write_raw(&root, &map)?;
    Ok(load_config(&root))
}
