//! Opening an agent terminal inside a session worktree.
//!
//! Resolution picks one [`LaunchCommand`]; spawning it is fire-and-forget.
//! User-provided values are always passed as separate argv items. The only
//! shell involved is the Linux fallback, which receives the worktree and
//! session id through environment variables.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::config::{SupportedTerminal, TerminalConfig};

/// Environment variables that override the configured terminal, in order.
pub const TERMINAL_ENV_VARS: [&str; 2] = ["OPENCODE_TERMINAL", "TERMINAL"];

const MAC_ALACRITTY_BIN: &str = "/Applications/Alacritty.app/Contents/MacOS/alacritty";

const LINUX_SHELL_COMMAND: &str = r#"cd "$WORKTREE" && opencode --session "$SESSION""#;

const APPLE_TERMINAL_SCRIPT: &str = r#"on run argv
  set worktreePath to item 1 of argv
  set sessionId to item 2 of argv
  set cmd to "cd " & quoted form of worktreePath & " && opencode --session " & quoted form of sessionId
  tell application "Terminal"
    activate
    do script cmd
  end tell
end run"#;

const ITERM_SCRIPT: &str = r#"on run argv
  set worktreePath to item 1 of argv
  set sessionId to item 2 of argv
  set cmd to "cd " & quoted form of worktreePath & " && opencode --session " & quoted form of sessionId
  tell application "iTerm"
    activate
    if (count of windows) = 0 then
      create window with default profile
    end if
    tell current window
      tell current session
        write text cmd
      end tell
    end tell
  end tell
end run"#;

/// A process to start detached from this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_string(), value.into()));
        self
    }

    /// Human-readable rendering for logs and messages. Not shell-safe.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Start the process with null stdio and never wait for it.
    pub fn spawn_detached(&self) -> std::io::Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        // Own process group, so the terminal outlives the host's job control.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn()?;
        debug!(pid = child.id(), command = %self.display(), "spawned detached");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Other
        }
    }
}

/// First non-empty terminal override from the environment.
pub fn env_terminal_override() -> Option<String> {
    TERMINAL_ENV_VARS.iter().find_map(|key| {
        std::env::var(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

/// Whether a macOS application bundle is installed (`open -Ra <app>`).
pub fn mac_app_installed(app: &str) -> bool {
    Command::new("open")
        .args(["-Ra", app])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Pick the command that opens `opencode --session <id>` in `worktree`.
///
/// Precedence: `env_override`, then `config`, then platform auto-detection.
/// `app_installed` is only consulted for macOS auto-detection.
pub fn resolve_launch(
    env_override: Option<&str>,
    config: &TerminalConfig,
    platform: Platform,
    worktree: &Path,
    session_id: &str,
    app_installed: impl Fn(&str) -> bool,
) -> LaunchCommand {
    if let Some(value) = env_override {
        if Path::new(value).is_absolute() {
            return LaunchCommand::new(value)
                .args(["-e", "opencode", "--session", session_id])
                .current_dir(worktree);
        }
        match SupportedTerminal::from_name_ignore_case(value) {
            Some(terminal) => return specific_terminal(terminal, platform, worktree, session_id),
            None => warn!(value, "unrecognized terminal override; ignoring"),
        }
    }

    match config {
        TerminalConfig::Custom {
            bin,
            args,
            working_directory_argument,
            command_flag,
        } => LaunchCommand::new(bin.as_str())
            .args(args.as_deref().unwrap_or_default().split_whitespace())
            .args(working_directory_argument.split_whitespace())
            .arg(worktree.display().to_string())
            .args(command_flag.split_whitespace())
            .args(["opencode", "--session", session_id]),
        TerminalConfig::Specific { terminal } => {
            specific_terminal(*terminal, platform, worktree, session_id)
        }
        TerminalConfig::Default => auto_detect(platform, worktree, session_id, app_installed),
    }
}

fn specific_terminal(
    terminal: SupportedTerminal,
    platform: Platform,
    worktree: &Path,
    session_id: &str,
) -> LaunchCommand {
    let worktree_arg = worktree.display().to_string();
    match terminal {
        SupportedTerminal::Alacritty => {
            let bin = if platform == Platform::MacOs {
                MAC_ALACRITTY_BIN
            } else {
                "alacritty"
            };
            LaunchCommand::new(bin)
                .arg("--working-directory")
                .arg(worktree_arg)
                .args(["-e", "opencode", "--session", session_id])
        }
        SupportedTerminal::ITerm | SupportedTerminal::ITerm2 => LaunchCommand::new("osascript")
            .args(["-e", ITERM_SCRIPT])
            .arg(worktree_arg)
            .arg(session_id),
        SupportedTerminal::Terminal => LaunchCommand::new("osascript")
            .args(["-e", APPLE_TERMINAL_SCRIPT])
            .arg(worktree_arg)
            .arg(session_id),
    }
}

fn auto_detect(
    platform: Platform,
    worktree: &Path,
    session_id: &str,
    app_installed: impl Fn(&str) -> bool,
) -> LaunchCommand {
    match platform {
        Platform::MacOs => {
            let candidates = [
                SupportedTerminal::Alacritty,
                SupportedTerminal::ITerm,
                SupportedTerminal::ITerm2,
            ];
            let terminal = candidates
                .into_iter()
                .find(|terminal| app_installed(terminal.name()))
                .unwrap_or(SupportedTerminal::Terminal);
            specific_terminal(terminal, platform, worktree, session_id)
        }
        Platform::Windows => LaunchCommand::new("cmd")
            .args(["/c", "start", "", "/D"])
            .arg(worktree.display().to_string())
            .args(["cmd", "/k", "opencode", "--session", session_id]),
        Platform::Other => LaunchCommand::new("xdg-terminal-exec")
            .args(["bash", "-lc", LINUX_SHELL_COMMAND])
            .env("WORKTREE", worktree.display().to_string())
            .env("SESSION", session_id),
    }
}
