//! Session state store.
//!
//! One JSON document per repository, `{"sessions": {<id>: record}}`, kept at
//! `<root>/.opencode/worktree-session-state.json`. Callers may pass any
//! directory, including one inside a session worktree; it is resolved to the
//! owning root before the file is touched. A missing or corrupt document reads
//! as empty. Writes overwrite the whole file; there is no locking, so two
//! processes writing at once can clobber each other.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::paths;

/// Where a deferred action should take place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredDetails {
    pub worktree_path: PathBuf,
    pub branch: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

/// Per-session deferred action, resolved on the next idle transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeferredAction {
    #[default]
    Idle,
    /// Open a terminal in the worktree once the agent turn completes.
    AwaitingSpawn(DeferredDetails),
    /// Commit, push and remove the worktree once the agent turn completes.
    AwaitingDeletion(DeferredDetails),
}

/// Side effect chosen by a [`DeferredAction`] transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Nothing,
    OpenTerminal(DeferredDetails),
    Cleanup(DeferredDetails),
    CancelSpawn(DeferredDetails),
}

impl DeferredAction {
    fn scheduled_by(&self, session_id: &str) -> bool {
        match self {
            DeferredAction::Idle => false,
            DeferredAction::AwaitingSpawn(details) | DeferredAction::AwaitingDeletion(details) => {
                details.session_id == session_id
            }
        }
    }

    /// Transition on `session.idle` of `session_id`.
    ///
    /// A marker only resolves on the idle of the session that scheduled it.
    /// The same record is reachable from the main checkout and, through the
    /// worktree path alias, from the instance running inside the worktree.
    pub fn on_idle(self, session_id: &str) -> (DeferredAction, Resolution) {
        if !self.scheduled_by(session_id) {
            return (self, Resolution::Nothing);
        }
        match self {
            DeferredAction::Idle => (DeferredAction::Idle, Resolution::Nothing),
            DeferredAction::AwaitingSpawn(details) => {
                (DeferredAction::Idle, Resolution::OpenTerminal(details))
            }
            DeferredAction::AwaitingDeletion(details) => {
                (DeferredAction::Idle, Resolution::Cleanup(details))
            }
        }
    }

    /// Transition on `session.error` of `session_id`. Only a pending spawn is
    /// cancelled; a pending deletion still runs on the next idle.
    pub fn on_error(self, session_id: &str) -> (DeferredAction, Resolution) {
        match self {
            DeferredAction::AwaitingSpawn(details) if details.session_id == session_id => {
                (DeferredAction::Idle, Resolution::CancelSpawn(details))
            }
            other => (other, Resolution::Nothing),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, DeferredAction::Idle)
    }
}

/// Branch and worktree bound to a session. Always set together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeBinding {
    pub branch: String,
    pub worktree_path: PathBuf,
}

/// One chat session that has touched worktree functionality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredRecord", into = "StoredRecord")]
pub struct SessionRecord {
    pub session_id: String,
    pub worktree: Option<WorktreeBinding>,
    /// Unix epoch milliseconds of first observation.
    pub created_at: i64,
    pub deferred: DeferredAction,
}

impl SessionRecord {
    fn fresh(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            worktree: None,
            created_at: chrono::Utc::now().timestamp_millis(),
            deferred: DeferredAction::Idle,
        }
    }
}

/// On-disk shape, field-compatible with the host plugin's state file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    #[serde(default)]
    session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    worktree_path: Option<PathBuf>,
    #[serde(default)]
    created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending_worktree_spawn: Option<DeferredDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending_worktree_deletion: Option<DeferredDetails>,
}

impl From<StoredRecord> for SessionRecord {
    fn from(stored: StoredRecord) -> Self {
        let worktree = match (stored.branch, stored.worktree_path) {
            (Some(branch), Some(worktree_path)) => Some(WorktreeBinding {
                branch,
                worktree_path,
            }),
            _ => None,
        };
        // Deletion makes any pending spawn moot.
        let deferred = match (stored.pending_worktree_deletion, stored.pending_worktree_spawn) {
            (Some(details), _) => DeferredAction::AwaitingDeletion(details),
            (None, Some(details)) => DeferredAction::AwaitingSpawn(details),
            (None, None) => DeferredAction::Idle,
        };
        Self {
            session_id: stored.session_id,
            worktree,
            created_at: stored.created_at,
            deferred,
        }
    }
}

impl From<SessionRecord> for StoredRecord {
    fn from(record: SessionRecord) -> Self {
        let (branch, worktree_path) = match record.worktree {
            Some(binding) => (Some(binding.branch), Some(binding.worktree_path)),
            None => (None, None),
        };
        let (pending_worktree_spawn, pending_worktree_deletion) = match record.deferred {
            DeferredAction::Idle => (None, None),
            DeferredAction::AwaitingSpawn(details) => (Some(details), None),
            DeferredAction::AwaitingDeletion(details) => (None, Some(details)),
        };
        Self {
            session_id: record.session_id,
            branch,
            worktree_path,
            created_at: record.created_at,
            pending_worktree_spawn,
            pending_worktree_deletion,
        }
    }
}

/// Partial update applied by [`upsert_session`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub worktree: Option<WorktreeBinding>,
    pub deferred: Option<DeferredAction>,
}

impl SessionPatch {
    pub fn deferred(action: DeferredAction) -> Self {
        Self {
            worktree: None,
            deferred: Some(action),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    sessions: BTreeMap<String, SessionRecord>,
}

fn read_state(root: &Path) -> StateFile {
    let path = paths::state_file(root);
    if !path.is_file() {
        return StateFile::default();
    }

    let parsed = std::fs::read_to_string(&path)
        .map_err(anyhow::Error::from)
        .and_then(|contents| serde_json::from_str(&contents).map_err(anyhow::Error::from));
    match parsed {
        Ok(state) => state,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "session state unreadable; starting empty");
            StateFile::default()
        }
    }
}

fn write_state(root: &Path, state: &StateFile) -> Result<()> {
    let dir = paths::config_dir(root);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = paths::state_file(root);
    let json = serde_json::to_string_pretty(state).context("failed to serialize session state")?;
    std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// Key of the record that `session_id` refers to when looked up from `dir`.
///
/// Exact id wins. Otherwise a record bound to the literal `dir` is an alias:
/// a second agent instance inside the worktree has its own session id.
/// Nothing stops two records from naming the same worktree path; the first
/// in key order wins.
fn lookup_key(state: &StateFile, dir: &Path, session_id: &str) -> Option<String> {
    if state.sessions.contains_key(session_id) {
        return Some(session_id.to_string());
    }
    state
        .sessions
        .iter()
        .find(|(_, record)| {
            record
                .worktree
                .as_ref()
                .is_some_and(|binding| binding.worktree_path == dir)
        })
        .map(|(key, _)| key.clone())
}

/// Merge `patch` into the record for `session_id`, creating it if needed.
pub fn upsert_session(dir: &Path, session_id: &str, patch: SessionPatch) -> Result<SessionRecord> {
    let root = paths::resolve_repo_root(dir);
    let mut state = read_state(&root);

    let mut record = state
        .sessions
        .remove(session_id)
        .unwrap_or_else(|| SessionRecord::fresh(session_id));
    record.session_id = session_id.to_string();
    if let Some(binding) = patch.worktree {
        record.worktree = Some(binding);
    }
    if let Some(deferred) = patch.deferred {
        record.deferred = deferred;
    }

    state
        .sessions
        .insert(session_id.to_string(), record.clone());
    write_state(&root, &state)?;
    debug!(session = session_id, root = %root.display(), "session upserted");
    Ok(record)
}

pub fn get_session(dir: &Path, session_id: &str) -> Option<SessionRecord> {
    let root = paths::resolve_repo_root(dir);
    let mut state = read_state(&root);
    let key = lookup_key(&state, dir, session_id)?;
    state.sessions.remove(&key)
}

/// Remove the record for `session_id` (or its worktree alias). Removing an
/// unknown session is a no-op.
pub fn delete_session(dir: &Path, session_id: &str) -> Result<()> {
    let root = paths::resolve_repo_root(dir);
    let mut state = read_state(&root);
    if let Some(key) = lookup_key(&state, dir, session_id) {
        state.sessions.remove(&key);
        debug!(session = %key, root = %root.display(), "session removed");
    }
    write_state(&root, &state)
}

/// All stored sessions, ordered by id.
pub fn list_sessions(dir: &Path) -> Vec<SessionRecord> {
    let root = paths::resolve_repo_root(dir);
    read_state(&root).sessions.into_values().collect()
}
