//! Activity log: JSON lines per repository.
//!
//! Every worktree lifecycle step that changes something on disk or spawns a
//! process appends one line to `<root>/.opencode/worktree-session.log.jsonl`.
//! Each line is a self-contained JSON object with an RFC 3339 timestamp, so
//! the log can be grepped or tailed while sessions run.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::paths;

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// A structured event in the activity log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    #[serde(flatten)]
    pub event: LogEvent,
}

/// All event types that can appear in the activity log.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    /// A worktree was checked out or created for a session.
    WorktreeCreated {
        session_id: String,
        branch: String,
        path: String,
    },
    /// A worktree was committed, pushed and removed.
    WorktreeCleaned {
        session_id: String,
        branch: String,
        path: String,
    },
    CleanupFailed {
        session_id: String,
        branch: String,
        error: String,
    },
    /// Terminal launch deferred until the agent goes idle.
    SpawnDeferred { session_id: String, branch: String },
    SpawnResolved {
        session_id: String,
        branch: String,
        launched: bool,
    },
    SpawnCancelled { session_id: String, branch: String },
    DeletionDeferred { session_id: String, branch: String },
    ConfigUpdated { key: String, value: String },
    HookRan { executed: bool, message: String },
}

/// Writer for the JSON lines activity log.
pub struct ActivityLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl ActivityLog {
    /// Open (or create) the log at `path`, appending to existing content.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file: {}", path.display()))?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Open the log for the repository owning `dir`.
    pub fn for_repo(dir: &Path) -> Result<Self> {
        let root = paths::resolve_repo_root(dir);
        Self::new(&paths::activity_log_file(&root))
    }

    pub fn log(&self, event: LogEvent) -> Result<()> {
        let entry = LogEntry {
            timestamp: now_rfc3339(),
            event,
        };

        let json = serde_json::to_string(&entry).context("failed to serialize log entry")?;

        debug!(event = %json, "activity log");

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("activity log lock poisoned"))?;
        writeln!(writer, "{json}").context("failed to write log entry")?;
        writer.flush().context("failed to flush log")?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Append `event` to the activity log of the repository owning `dir`.
///
/// Failures are logged and dropped; the activity log never fails the
/// operation it describes.
pub fn record(dir: &Path, event: LogEvent) {
    let result = ActivityLog::for_repo(dir).and_then(|log| log.log(event));
    if let Err(err) = result {
        warn!(error = %err, "failed to append activity log");
    }
}
