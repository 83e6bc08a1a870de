//! Host adapter: lifecycle events and agent tools.
//!
//! The host delivers four session events and invokes five tools. Each entry
//! point returns a [`Response`] describing what the host should show or run;
//! every failure is folded into that response so nothing here can take the
//! host down.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{
    self, PluginConfig, PostWorktreeConfig, SupportedTerminal, SyncBehavior, TerminalConfig,
    WorktreeSyncConfig,
};
use crate::git::Git;
use crate::hooks::{self, HookOutcome};
use crate::log::{self, LogEvent};
use crate::paths;
use crate::prompt;
use crate::state::{
    self, DeferredAction, DeferredDetails, Resolution, SessionPatch, WorktreeBinding,
};
use crate::terminal::{self, Platform};
use crate::worktree;

/// Host command that opens a fresh chat in the main checkout.
pub const NEW_SESSION_COMMAND: &str = "session_new";

pub const CREATE_WORKTREE_TOOL: &str = "createWorktree";
pub const DELETE_WORKTREE_TOOL: &str = "deleteWorktree";
pub const SET_POST_WORKTREE_HOOK_TOOL: &str = "setPostWorktreeHook";
pub const SET_WORKTREE_SYNC_TOOL: &str = "setWorktreeSync";
pub const SET_TERMINAL_TOOL: &str = "setTerminal";

#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfoProperties {
    pub info: SessionInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionIdProperties {
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionErrorProperties {
    #[serde(rename = "sessionID", default)]
    pub session_id: Option<String>,
}

/// Session lifecycle events the plugin reacts to.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum HostEvent {
    #[serde(rename = "session.created")]
    SessionCreated { properties: SessionInfoProperties },
    #[serde(rename = "session.idle")]
    SessionIdle { properties: SessionIdProperties },
    #[serde(rename = "session.error")]
    SessionError {
        #[serde(default)]
        properties: SessionErrorProperties,
    },
    #[serde(rename = "session.deleted")]
    SessionDeleted { properties: SessionInfoProperties },
}

impl HostEvent {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HostEvent::SessionCreated { .. } => "session.created",
            HostEvent::SessionIdle { .. } => "session.idle",
            HostEvent::SessionError { .. } => "session.error",
            HostEvent::SessionDeleted { .. } => "session.deleted",
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            HostEvent::SessionCreated { properties } | HostEvent::SessionDeleted { properties } => {
                Some(&properties.info.id)
            }
            HostEvent::SessionIdle { properties } => Some(&properties.session_id),
            HostEvent::SessionError { properties } => properties.session_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub title: String,
    pub message: String,
    pub variant: ToastVariant,
}

/// What the host should do after an event or tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Response {
    /// Tool result text handed back to the agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub toasts: Vec<Toast>,
    /// Host TUI command to execute, e.g. [`NEW_SESSION_COMMAND`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Set when the event was not understood and nothing was done.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ignored: bool,
}

impl Response {
    pub fn text(result: impl Into<String>) -> Self {
        Self {
            result: Some(result.into()),
            ..Self::default()
        }
    }

    pub fn ignored() -> Self {
        Self {
            ignored: true,
            ..Self::default()
        }
    }

    pub fn toast(
        mut self,
        title: impl Into<String>,
        message: impl Into<String>,
        variant: ToastVariant,
    ) -> Self {
        self.push_toast(title, message, variant);
        self
    }

    fn push_toast(
        &mut self,
        title: impl Into<String>,
        message: impl Into<String>,
        variant: ToastVariant,
    ) {
        self.toasts.push(Toast {
            title: title.into(),
            message: message.into(),
            variant,
        });
    }
}

/// Directories the host runs the plugin in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginContext {
    /// Directory the host instance was opened in.
    pub directory: PathBuf,
    /// Worktree the host reports for that instance.
    pub worktree: PathBuf,
}

/// Side effects outside git: terminals and the post-worktree hook.
pub trait Launcher {
    /// Open a terminal running the agent on `session_id` in `worktree`.
    /// Returns the rendered command on success.
    fn open_agent_terminal(
        &self,
        root: &Path,
        worktree: &Path,
        session_id: &str,
    ) -> std::io::Result<String>;

    fn run_post_worktree_hook(&self, root: &Path, worktree: &Path) -> HookOutcome;
}

/// [`Launcher`] that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn open_agent_terminal(
        &self,
        root: &Path,
        worktree: &Path,
        session_id: &str,
    ) -> std::io::Result<String> {
        let config = config::load_config(root);
        let launch = terminal::resolve_launch(
            terminal::env_terminal_override().as_deref(),
            config.terminal(),
            Platform::current(),
            worktree,
            session_id,
            terminal::mac_app_installed,
        );
        launch.spawn_detached()?;
        Ok(launch.display())
    }

    fn run_post_worktree_hook(&self, root: &Path, worktree: &Path) -> HookOutcome {
        hooks::run_post_worktree_hook(root, worktree)
    }
}

/// Arguments of the `setTerminal` tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTerminalArgs {
    pub mode: String,
    #[serde(default)]
    pub bin: Option<String>,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub working_directory_argument: Option<String>,
    #[serde(default)]
    pub command_flag: Option<String>,
    #[serde(default)]
    pub terminal: Option<String>,
}

/// Tool names offered to the host for `config`.
pub fn tool_names(config: &PluginConfig) -> Vec<&'static str> {
    let mut names = vec![CREATE_WORKTREE_TOOL, DELETE_WORKTREE_TOOL];
    if config.tools_exposed() {
        names.extend([
            SET_POST_WORKTREE_HOOK_TOOL,
            SET_WORKTREE_SYNC_TOOL,
            SET_TERMINAL_TOOL,
        ]);
    }
    names
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub struct WorktreeSessionPlugin<G: Git, L: Launcher> {
    git: G,
    launcher: L,
    ctx: PluginContext,
}

impl<G: Git, L: Launcher> WorktreeSessionPlugin<G, L> {
    pub fn new(git: G, launcher: L, ctx: PluginContext) -> Self {
        Self { git, launcher, ctx }
    }

    pub fn git(&self) -> &G {
        &self.git
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn context(&self) -> &PluginContext {
        &self.ctx
    }

    fn directory(&self) -> &Path {
        &self.ctx.directory
    }

    fn root(&self) -> PathBuf {
        paths::resolve_repo_root(&self.ctx.directory)
    }

    fn in_session_worktree(&self) -> bool {
        paths::is_session_worktree(&self.ctx.worktree)
    }

    /// Parse and dispatch a raw event document. Unparsable or unknown events
    /// are ignored.
    pub fn handle_raw_event(&self, raw: &str) -> Response {
        match HostEvent::parse(raw) {
            Ok(event) => self.handle_event(&event),
            Err(err) => {
                debug!(error = %err, "ignoring unrecognized host event");
                Response::ignored()
            }
        }
    }

    pub fn handle_event(&self, event: &HostEvent) -> Response {
        debug!(kind = event.kind(), session = ?event.session_id(), "host event");
        match event {
            HostEvent::SessionCreated { properties } => self.on_session_created(&properties.info.id),
            HostEvent::SessionIdle { properties } => self.on_session_idle(&properties.session_id),
            HostEvent::SessionError { properties } => match properties.session_id.as_deref() {
                Some(id) => self.on_session_error(id),
                None => Response::default(),
            },
            HostEvent::SessionDeleted { properties } => self.on_session_deleted(&properties.info.id),
        }
    }

    fn on_session_created(&self, session_id: &str) -> Response {
        if !self.git.is_repository(self.directory()) || self.in_session_worktree() {
            return Response::default();
        }
        match state::upsert_session(self.directory(), session_id, SessionPatch::default()) {
            Ok(_) => Response::default(),
            Err(err) => {
                warn!(session = session_id, error = %err, "failed to record session");
                Response::default().toast("Session State Error", err.to_string(), ToastVariant::Error)
            }
        }
    }

    fn on_session_idle(&self, session_id: &str) -> Response {
        let Some(record) = state::get_session(self.directory(), session_id) else {
            return Response::default();
        };
        let (next, resolution) = record.deferred.clone().on_idle(session_id);
        if resolution == Resolution::Nothing {
            return Response::default();
        }

        // Clear the marker before acting, so a repeated idle cannot act twice.
        if let Err(err) = state::upsert_session(
            self.directory(),
            &record.session_id,
            SessionPatch::deferred(next),
        ) {
            warn!(session = %record.session_id, error = %err, "failed to clear deferred action");
            return Response::default().toast(
                "Session Idle Error",
                err.to_string(),
                ToastVariant::Error,
            );
        }

        match resolution {
            Resolution::OpenTerminal(details) => self.resolve_spawn(&details),
            Resolution::Cleanup(details) => self.resolve_deletion(&record.session_id, &details),
            Resolution::Nothing | Resolution::CancelSpawn(_) => Response::default(),
        }
    }

    fn resolve_spawn(&self, details: &DeferredDetails) -> Response {
        let root = self.root();
        let mut response = Response {
            command: Some(NEW_SESSION_COMMAND.to_string()),
            ..Response::default()
        };

        let launched = match self.launcher.open_agent_terminal(
            &root,
            &details.worktree_path,
            &details.session_id,
        ) {
            Ok(command) => {
                info!(branch = %details.branch, command = %command, "terminal opened");
                response.push_toast(
                    "Opening Worktree",
                    format!("Launching terminal in {}", details.branch),
                    ToastVariant::Info,
                );
                true
            }
            Err(err) => {
                warn!(branch = %details.branch, error = %err, "failed to open terminal");
                response.push_toast("Terminal Launch Failed", err.to_string(), ToastVariant::Error);
                false
            }
        };
        log::record(
            &root,
            LogEvent::SpawnResolved {
                session_id: details.session_id.clone(),
                branch: details.branch.clone(),
                launched,
            },
        );

        let outcome = self
            .launcher
            .run_post_worktree_hook(&root, &details.worktree_path);
        if outcome.executed {
            response.push_toast("Post-Worktree Hook", outcome.message.clone(), ToastVariant::Info);
        }
        log::record(
            &root,
            LogEvent::HookRan {
                executed: outcome.executed,
                message: outcome.message,
            },
        );

        response
    }

    fn resolve_deletion(&self, record_id: &str, details: &DeferredDetails) -> Response {
        let root = self.root();
        match worktree::cleanup_session(&self.git, &root, &details.worktree_path, &details.branch)
        {
            Ok(()) => {
                log::record(
                    &root,
                    LogEvent::WorktreeCleaned {
                        session_id: record_id.to_string(),
                        branch: details.branch.clone(),
                        path: details.worktree_path.display().to_string(),
                    },
                );
                let mut response = Response::default().toast(
                    "Worktree Deleted",
                    format!("Committed & cleaned {}", details.branch),
                    ToastVariant::Success,
                );
                if let Err(err) = state::delete_session(self.directory(), record_id) {
                    warn!(session = record_id, error = %err, "failed to remove session record");
                    response.push_toast("Session State Error", err.to_string(), ToastVariant::Warning);
                }
                response
            }
            Err(err) => {
                warn!(branch = %details.branch, error = %err, kind = err.kind(), "deferred deletion failed");
                log::record(
                    &root,
                    LogEvent::CleanupFailed {
                        session_id: record_id.to_string(),
                        branch: details.branch.clone(),
                        error: err.to_string(),
                    },
                );
                Response::default().toast("Deletion Failed", err.to_string(), ToastVariant::Error)
            }
        }
    }

    fn on_session_error(&self, session_id: &str) -> Response {
        let Some(record) = state::get_session(self.directory(), session_id) else {
            return Response::default();
        };
        let (next, resolution) = record.deferred.clone().on_error(session_id);
        let Resolution::CancelSpawn(details) = resolution else {
            return Response::default();
        };

        if let Err(err) = state::upsert_session(
            self.directory(),
            &record.session_id,
            SessionPatch::deferred(next),
        ) {
            warn!(session = %record.session_id, error = %err, "failed to cancel pending spawn");
            return Response::default().toast(
                "Session State Error",
                err.to_string(),
                ToastVariant::Error,
            );
        }
        info!(branch = %details.branch, "pending terminal spawn cancelled");
        log::record(
            &self.root(),
            LogEvent::SpawnCancelled {
                session_id: record.session_id.clone(),
                branch: details.branch,
            },
        );
        Response::default().toast(
            "Worktree Spawn Cancelled",
            "Response was interrupted",
            ToastVariant::Info,
        )
    }

    fn on_session_deleted(&self, session_id: &str) -> Response {
        let Some(record) = state::get_session(self.directory(), session_id) else {
            return Response::default();
        };

        let mut response = Response::default();
        if let Some(binding) = &record.worktree {
            let root = self.root();
            match worktree::cleanup_session(&self.git, &root, &binding.worktree_path, &binding.branch)
            {
                Ok(()) => {
                    log::record(
                        &root,
                        LogEvent::WorktreeCleaned {
                            session_id: record.session_id.clone(),
                            branch: binding.branch.clone(),
                            path: binding.worktree_path.display().to_string(),
                        },
                    );
                    response.push_toast(
                        "Session Saved",
                        format!("Committed & cleaned {}", binding.branch),
                        ToastVariant::Success,
                    );
                }
                Err(err) => {
                    warn!(branch = %binding.branch, error = %err, "cleanup on session delete failed");
                    log::record(
                        &root,
                        LogEvent::CleanupFailed {
                            session_id: record.session_id.clone(),
                            branch: binding.branch.clone(),
                            error: err.to_string(),
                        },
                    );
                    response.push_toast("Cleanup Failed", err.to_string(), ToastVariant::Error);
                }
            }
        }

        // The session is gone either way; its record goes with it.
        if let Err(err) = state::delete_session(self.directory(), &record.session_id) {
            warn!(session = %record.session_id, error = %err, "failed to remove session record");
            response.push_toast("Session State Error", err.to_string(), ToastVariant::Warning);
        }
        response
    }

    /// System prompt fragments for this instance. Empty outside a repository.
    pub fn system_prompts(&self) -> Vec<&'static str> {
        if !self.git.is_repository(self.directory()) {
            return Vec::new();
        }
        prompt::system_prompts(&self.ctx.worktree)
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        tool_names(&config::load_config(self.directory()))
    }

    /// `createWorktree{branch}`: check out a worktree and schedule the
    /// terminal for when the current response completes.
    pub fn create_worktree(&self, session_id: &str, branch: &str) -> Response {
        let branch = branch.trim();
        if branch.is_empty() {
            return Response::text("Error: A branch name is required").toast(
                "Invalid Branch",
                "A branch name is required",
                ToastVariant::Error,
            );
        }

        let root = self.root();
        let path = match worktree::create_session(&self.git, &root, branch) {
            Ok(path) => path,
            Err(err) => {
                warn!(branch, error = %err, kind = err.kind(), "worktree creation failed");
                return Response::text(err.to_string()).toast(
                    "Worktree Creation Failed",
                    err.to_string(),
                    ToastVariant::Error,
                );
            }
        };

        let pending = DeferredAction::AwaitingSpawn(DeferredDetails {
            worktree_path: path.clone(),
            branch: branch.to_string(),
            session_id: session_id.to_string(),
        });
        let patch = SessionPatch {
            worktree: Some(WorktreeBinding {
                branch: branch.to_string(),
                worktree_path: path.clone(),
            }),
            deferred: Some(pending),
        };
        if let Err(err) = state::upsert_session(self.directory(), session_id, patch) {
            warn!(session = session_id, error = %err, "failed to record worktree session");
            return Response::text(format!(
                "Error: Created worktree at {} but failed to record the session: {err}",
                path.display()
            ))
            .toast("Session State Error", err.to_string(), ToastVariant::Error);
        }

        log::record(
            &root,
            LogEvent::WorktreeCreated {
                session_id: session_id.to_string(),
                branch: branch.to_string(),
                path: path.display().to_string(),
            },
        );
        log::record(
            &root,
            LogEvent::SpawnDeferred {
                session_id: session_id.to_string(),
                branch: branch.to_string(),
            },
        );

        Response::text(format!(
            "Created worktree at {} for branch {branch}. Terminal will open when this response completes...",
            path.display()
        ))
        .toast(
            "Worktree Created",
            format!("Branch {branch} at {}", path.display()),
            ToastVariant::Success,
        )
    }

    /// `deleteWorktree{}`: schedule commit, push and removal of the worktree
    /// this instance runs in.
    pub fn delete_worktree(&self, session_id: &str) -> Response {
        let directory = self.directory();
        if !self.git.is_repository(directory) {
            return Response::text(format!(
                "Error: Not a git repo\nDirectory: {}",
                directory.display()
            ))
            .toast("Deletion Failed", "Not a git repo", ToastVariant::Error);
        }

        if !self.in_session_worktree() {
            return Response::text(format!(
                "Error: Not in a worktree session\nCurrent directory: {}\nWorktree value: {}",
                directory.display(),
                self.ctx.worktree.display()
            ))
            .toast("Deletion Failed", "Not in a worktree session", ToastVariant::Error);
        }

        let record = state::get_session(directory, session_id);
        let Some((record_id, binding)) = record
            .as_ref()
            .and_then(|r| r.worktree.clone().map(|b| (r.session_id.clone(), b)))
        else {
            let debug_info = serde_json::json!({
                "sessionId": session_id,
                "currentDirectory": directory.display().to_string(),
                "worktreeValue": self.ctx.worktree.display().to_string(),
                "resolvedMainRepo": paths::main_repo_from_worktree(directory)
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "Not in worktree path".to_string()),
                "stateFound": record.is_some(),
                "state": record,
            });
            let pretty = serde_json::to_string_pretty(&debug_info).unwrap_or_default();
            return Response::text(
                [
                    "Error: No worktree session found",
                    "",
                    "Debug Information:",
                    pretty.as_str(),
                    "",
                    "Possible causes:",
                    "- Session was not properly created",
                    "- State file is missing or corrupted",
                    "- Session ID mismatch",
                ]
                .join("\n"),
            )
            .toast("Deletion Failed", "No worktree session found", ToastVariant::Error);
        };

        let pending = DeferredAction::AwaitingDeletion(DeferredDetails {
            worktree_path: binding.worktree_path.clone(),
            branch: binding.branch.clone(),
            session_id: session_id.to_string(),
        });
        if let Err(err) =
            state::upsert_session(directory, &record_id, SessionPatch::deferred(pending))
        {
            warn!(session = %record_id, error = %err, "failed to schedule deletion");
            return Response::text(format!("Error: Failed to schedule worktree deletion: {err}"))
                .toast("Deletion Failed", err.to_string(), ToastVariant::Error);
        }

        info!(branch = %binding.branch, "worktree deletion scheduled");
        log::record(
            directory,
            LogEvent::DeletionDeferred {
                session_id: record_id.clone(),
                branch: binding.branch.clone(),
            },
        );

        Response::text(format!(
            "Worktree {} will be committed, pushed and removed when this response completes. \
             STOP: do not run any further shell commands or access files; the worktree path will become invalid.",
            binding.branch
        ))
        .toast(
            "Worktree Deletion Scheduled",
            format!("{} will be committed & cleaned when this response completes", binding.branch),
            ToastVariant::Info,
        )
    }

    fn tools_disabled(&self) -> Option<Response> {
        if config::load_config(self.directory()).tools_exposed() {
            return None;
        }
        Some(
            Response::text("Error: Configuration tools are disabled (toolsExposed is false)")
                .toast(
                    "Tools Disabled",
                    "Configuration tools are disabled for this repository",
                    ToastVariant::Error,
                ),
        )
    }

    fn apply_config(&self, key: &str, value: String, patch: PluginConfig) -> Result<(), Response> {
        match config::update_config(self.directory(), &patch) {
            Ok(_) => {
                log::record(
                    self.directory(),
                    LogEvent::ConfigUpdated {
                        key: key.to_string(),
                        value,
                    },
                );
                Ok(())
            }
            Err(err) => {
                warn!(key, error = %err, "config update failed");
                Err(Response::text(format!("Error: Failed to update config: {err:#}")).toast(
                    "Config Update Failed",
                    err.to_string(),
                    ToastVariant::Error,
                ))
            }
        }
    }

    /// `setPostWorktreeHook{cmd, args?}`.
    pub fn set_post_worktree_hook(&self, cmd: &str, args: Option<&str>) -> Response {
        if let Some(refused) = self.tools_disabled() {
            return refused;
        }
        let Some(cmd) = non_empty(Some(cmd)) else {
            return Response::text("Error: A command is required (cmd parameter)").toast(
                "Invalid Config",
                "Post-worktree hook requires a command",
                ToastVariant::Error,
            );
        };
        let args = non_empty(args);
        let full = match args {
            Some(args) => format!("{cmd} {args}"),
            None => cmd.to_string(),
        };

        let patch = PluginConfig {
            post_worktree: Some(PostWorktreeConfig {
                cmd: cmd.to_string(),
                args: args.map(str::to_string),
            }),
            ..PluginConfig::default()
        };
        if let Err(response) = self.apply_config("postWorktree", full.clone(), patch) {
            return response;
        }

        Response::text(format!("Post-worktree hook configured: {full} <worktree-path>")).toast(
            "Post-Worktree Hook Updated",
            format!("Will execute: {full} <worktree-path>"),
            ToastVariant::Success,
        )
    }

    /// `setWorktreeSync{behavior}`.
    pub fn set_worktree_sync(&self, behavior: &str) -> Response {
        if let Some(refused) = self.tools_disabled() {
            return refused;
        }
        let valid = SyncBehavior::ALL.map(SyncBehavior::as_str).join(", ");
        let Ok(behavior) = behavior.trim().parse::<SyncBehavior>() else {
            return Response::text(format!("Invalid behavior. Use one of: {valid}")).toast(
                "Invalid Sync Behavior",
                format!("Behavior must be one of: {valid}"),
                ToastVariant::Error,
            );
        };

        let patch = PluginConfig {
            worktree_sync: Some(WorktreeSyncConfig { behavior }),
            ..PluginConfig::default()
        };
        if let Err(response) = self.apply_config("worktreeSync", behavior.to_string(), patch) {
            return response;
        }

        Response::text(format!("Worktree sync behavior set to: {behavior}")).toast(
            "Worktree Sync Updated",
            format!("Sync behavior: {behavior}"),
            ToastVariant::Success,
        )
    }

    /// `setTerminal{mode, ...}`.
    pub fn set_terminal(&self, args: &SetTerminalArgs) -> Response {
        if let Some(refused) = self.tools_disabled() {
            return refused;
        }

        let (terminal, summary) = match args.mode.trim() {
            "default" => (TerminalConfig::Default, "default (auto-detection)".to_string()),
            "custom" => match custom_terminal(args) {
                Ok(pair) => pair,
                Err(response) => return response,
            },
            "specific" => {
                let valid = SupportedTerminal::ALL.map(SupportedTerminal::name).join(", ");
                let Some(terminal) =
                    non_empty(args.terminal.as_deref()).and_then(SupportedTerminal::from_name)
                else {
                    return Response::text(format!("Error: Terminal must be one of: {valid}"))
                        .toast(
                            "Invalid Terminal",
                            format!("Terminal must be one of: {valid}"),
                            ToastVariant::Error,
                        );
                };
                (
                    TerminalConfig::Specific { terminal },
                    format!("specific ({terminal})"),
                )
            }
            _ => {
                return Response::text("Error: Mode must be one of: default, custom, specific")
                    .toast(
                        "Invalid Mode",
                        "Mode must be: default, custom, or specific",
                        ToastVariant::Error,
                    );
            }
        };

        let patch = PluginConfig {
            terminal: Some(terminal),
            ..PluginConfig::default()
        };
        if let Err(response) = self.apply_config("terminal", summary.clone(), patch) {
            return response;
        }

        Response::text(format!("Terminal mode set to: {summary}")).toast(
            "Terminal Config Updated",
            format!("Using {summary}"),
            ToastVariant::Success,
        )
    }
}

fn invalid_custom(field_hint: &str, toast: &str) -> Response {
    Response::text(format!("Error: Custom mode requires {field_hint}")).toast(
        "Invalid Config",
        toast,
        ToastVariant::Error,
    )
}

fn custom_terminal(args: &SetTerminalArgs) -> Result<(TerminalConfig, String), Response> {
    let bin = non_empty(args.bin.as_deref()).ok_or_else(|| {
        invalid_custom(
            "a binary path (bin parameter)",
            "Custom mode requires a binary path",
        )
    })?;
    let working_directory_argument = non_empty(args.working_directory_argument.as_deref())
        .ok_or_else(|| {
            invalid_custom(
                "workingDirectoryArgument (e.g., \"--working-directory\", \"--cwd\", \"-d\")",
                "Custom mode requires workingDirectoryArgument",
            )
        })?;
    let command_flag = non_empty(args.command_flag.as_deref()).ok_or_else(|| {
        invalid_custom(
            "commandFlag (e.g., \"-e\", \"start --\")",
            "Custom mode requires commandFlag",
        )
    })?;
    let extra = non_empty(args.args.as_deref());

    let mut parts = vec![bin.to_string()];
    parts.extend(extra.map(str::to_string));
    parts.push(format!("{working_directory_argument} <path>"));
    parts.push(command_flag.to_string());
    parts.push("opencode --session <id>".to_string());

    Ok((
        TerminalConfig::Custom {
            bin: bin.to_string(),
            args: extra.map(str::to_string),
            working_directory_argument: working_directory_argument.to_string(),
            command_flag: command_flag.to_string(),
        },
        format!("custom ({})", parts.join(" ")),
    ))
}
