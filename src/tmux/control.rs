use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;

use tracing::{debug, trace};

use crate::domain::PaneDimensions;

use super::{MonitorExit, MonitorProcess};

/// Read-only tmux control-mode client attached to the pane's session. It
/// never receives keystrokes; stdin only carries control commands.
#[derive(Debug)]
pub(super) struct ControlMonitor {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl ControlMonitor {
    fn write_command(&mut self, command: &str) -> Result<(), String> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| "monitor stdin already closed".to_string())?;
        stdin
            .write_all(format!("{command}\n").as_bytes())
            .and_then(|()| stdin.flush())
            .map_err(|err| format!("failed to write monitor command '{command}': {err}"))
    }
}

impl MonitorProcess for ControlMonitor {
    fn resize(&mut self, dimensions: PaneDimensions) -> Result<(), String> {
        self.write_command(&format!(
            "refresh-client -C {}x{}",
            dimensions.cols, dimensions.rows
        ))
    }

    fn try_exit(&mut self) -> Option<MonitorExit> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(MonitorExit {
                code: status.code(),
            }),
            Ok(None) => None,
            Err(_) => Some(MonitorExit { code: None }),
        }
    }

    fn terminate(mut self: Box<Self>) -> MonitorExit {
        if let Ok(Some(status)) = self.child.try_wait() {
            return MonitorExit {
                code: status.code(),
            };
        }
        // Closing stdin lets a control client detach on its own.
        self.stdin.take();
        let _ = self.child.kill();
        match self.child.wait() {
            Ok(status) => MonitorExit {
                code: status.code(),
            },
            Err(_) => MonitorExit { code: None },
        }
    }
}

pub(super) fn spawn_control_monitor(
    socket_name: Option<&str>,
    session_target: &str,
    dimensions: PaneDimensions,
) -> Result<ControlMonitor, String> {
    let mut command = Command::new("tmux");
    if let Some(socket) = socket_name {
        command.args(["-L", socket]);
    }
    command
        .args([
            "-C",
            "attach-session",
            "-t",
            session_target,
            "-f",
            "read-only,ignore-size",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|err| format!("failed to spawn tmux monitor for {session_target}: {err}"))?;
    let stdin = child.stdin.take();
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| format!("tmux monitor for {session_target} missing stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| format!("tmux monitor for {session_target} missing stderr"))?;

    let session = session_target.to_string();
    let spawned = thread::Builder::new()
        .name(format!("tether-mon-out-{session}"))
        .spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines().map_while(Result::ok) {
                if line.starts_with("%exit") {
                    debug!(session = %session, line = %line, "monitor detached");
                } else if line.starts_with("%error") {
                    debug!(session = %session, line = %line, "monitor command error");
                }
            }
            trace!(session = %session, "monitor stdout closed");
        })
        .and_then(|_| {
            thread::Builder::new()
                .name(format!("tether-mon-err-{session_target}"))
                .spawn(move || {
                    let reader = BufReader::new(stderr);
                    for _ in reader.lines() {}
                })
        });
    if let Err(err) = spawned {
        let _ = child.kill();
        let _ = child.wait();
        return Err(format!(
            "failed to spawn monitor reader for {session_target}: {err}"
        ));
    }

    let mut monitor = ControlMonitor { child, stdin };
    if let Err(err) = monitor.resize(dimensions) {
        let exit = Box::new(monitor).terminate();
        return Err(format!("{err} (monitor exited with {:?})", exit.code));
    }
    Ok(monitor)
}
