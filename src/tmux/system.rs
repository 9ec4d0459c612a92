use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fmt::Debug;
use std::os::unix::ffi::OsStrExt;
use std::process::Command;

use tracing::debug;

use crate::domain::{CaptureRange, CursorPosition, PaneAddress, PaneDimensions, PaneInfo};

use super::control::spawn_control_monitor;
use super::parser::{
    list_panes_format, parse_cursor_position, parse_list_panes_output, parse_pane_ids,
};
use super::{InputSink, MonitorProcess, OutputSource, PaneLocator};

#[derive(Clone, Debug, Default)]
pub struct SystemTmuxAdapter {
    socket_name: Option<String>,
}

impl SystemTmuxAdapter {
    pub fn new(socket_name: Option<String>) -> Self {
        Self { socket_name }
    }

    pub fn socket_name(&self) -> Option<&str> {
        self.socket_name.as_deref()
    }

    /// Every live pane on the server, across all sessions.
    pub fn discover_panes(&self) -> Result<Vec<PaneInfo>, String> {
        let args = vec![
            "list-panes".to_string(),
            "-a".to_string(),
            "-F".to_string(),
            list_panes_format(),
        ];
        let stdout = match self.run_tmux(&args) {
            Ok(stdout) => stdout,
            Err(err) => {
                if is_tmux_empty_target_error(&err) {
                    return Ok(Vec::new());
                }
                return Err(err);
            }
        };
        let mut panes = parse_list_panes_output(&stdout)?;
        panes.retain(|pane| !pane.pane_dead);
        Ok(panes)
    }

    fn run_tmux<S: AsRef<OsStr> + Debug>(&self, args: &[S]) -> Result<String, String> {
        run_tmux_with_socket(self.socket_name.as_deref(), args)
    }
}

pub(super) fn run_tmux_with_socket<S: AsRef<OsStr> + Debug>(
    socket_name: Option<&str>,
    args: &[S],
) -> Result<String, String> {
    let mut command = Command::new("tmux");
    if let Some(socket) = socket_name {
        command.args(["-L", socket]);
    }
    command.args(args);

    let output = command
        .output()
        .map_err(|err| format!("failed to run tmux {:?}: {err}", args))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("tmux {:?} failed: {}", args, stderr.trim()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

// `=name` forces an exact session match instead of tmux's prefix matching.
fn exact_session_target(session: &str) -> String {
    format!("={session}")
}

impl PaneLocator for SystemTmuxAdapter {
    fn session_exists(&self, session: &str) -> bool {
        let args = vec![
            "has-session".to_string(),
            "-t".to_string(),
            exact_session_target(session),
        ];
        match self.run_tmux(&args) {
            Ok(_) => true,
            Err(err) => {
                debug!(session, error = %err, "session lookup failed");
                false
            }
        }
    }

    fn list_panes(&self, session: &str) -> Result<HashSet<String>, String> {
        let args = vec![
            "list-panes".to_string(),
            "-s".to_string(),
            "-t".to_string(),
            exact_session_target(session),
            "-F".to_string(),
            "#{pane_id}".to_string(),
        ];
        let stdout = self.run_tmux(&args)?;
        Ok(parse_pane_ids(&stdout))
    }
}

impl OutputSource for SystemTmuxAdapter {
    fn capture_pane(&self, address: &PaneAddress, range: CaptureRange) -> Result<String, String> {
        let mut args = vec![
            "capture-pane".to_string(),
            "-p".to_string(),
            "-e".to_string(),
            "-N".to_string(),
            "-t".to_string(),
            address.tmux_target().to_string(),
        ];
        if let CaptureRange::Backlog(lines) = range {
            args.push("-S".to_string());
            args.push(format!("-{}", lines));
        }
        self.run_tmux(&args)
    }

    fn cursor_position(&self, address: &PaneAddress) -> Result<CursorPosition, String> {
        let args = vec![
            "display-message".to_string(),
            "-p".to_string(),
            "-t".to_string(),
            address.tmux_target().to_string(),
            "#{cursor_x},#{cursor_y}".to_string(),
        ];
        let stdout = self.run_tmux(&args)?;
        parse_cursor_position(&stdout)
    }

    fn spawn_monitor(
        &self,
        address: &PaneAddress,
        dimensions: PaneDimensions,
    ) -> Result<Box<dyn MonitorProcess>, String> {
        let monitor = spawn_control_monitor(
            self.socket_name.as_deref(),
            &exact_session_target(&address.session),
            dimensions,
        )?;
        Ok(Box::new(monitor))
    }
}

impl InputSink for SystemTmuxAdapter {
    fn send_literal(&self, address: &PaneAddress, bytes: &[u8]) -> Result<(), String> {
        if bytes.is_empty() {
            return Ok(());
        }
        // `--` keeps input such as `-x` from being read as a flag.
        let args: Vec<OsString> = vec![
            "send-keys".into(),
            "-t".into(),
            address.tmux_target().into(),
            "-l".into(),
            "--".into(),
            OsStr::from_bytes(bytes).to_os_string(),
        ];
        let _ = self.run_tmux(&args)?;
        Ok(())
    }

    fn send_named_key(&self, address: &PaneAddress, key: &str) -> Result<(), String> {
        if key.is_empty() {
            return Ok(());
        }
        let args = vec![
            "send-keys".to_string(),
            "-t".to_string(),
            address.tmux_target().to_string(),
            key.to_string(),
        ];
        let _ = self.run_tmux(&args)?;
        Ok(())
    }
}

pub(super) fn is_tmux_empty_target_error(error: &str) -> bool {
    let normalized = error.to_ascii_lowercase();
    normalized.contains("no current target")
        || normalized.contains("can't find session")
        || normalized.contains("can't find pane")
        || normalized.contains("can't find window")
        || normalized.contains("no sessions")
        || normalized.contains("no server running")
        || normalized.contains("error connecting to")
}
