//! Termination by image name.
//!
//! goodbyedpi may have been started by an earlier run of this program, so
//! the handle we hold (if any) is not authoritative. Stopping always goes
//! through the image name.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to terminate '{name}': {reason}")]
    TerminationFailed { name: String, reason: String },
}

/// Kills every process whose image basename equals `name`.
/// Succeeds when nothing matches.
pub trait ProcessTerminator: Send + Sync {
    fn terminate_by_name(&self, name: &str) -> Result<(), ProcessError>;
}

/// `taskkill /F /IM` on Windows, `SIGKILL` to every matching PID elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTerminator;

impl ProcessTerminator for SystemTerminator {
    fn terminate_by_name(&self, name: &str) -> Result<(), ProcessError> {
        tracing::info!("Force-killing every '{}' process", name);

        #[cfg(target_os = "windows")]
        {
            use crate::utils::HideConsole;
            let output = std::process::Command::new("taskkill")
                .args(["/F", "/IM", name])
                .hide_console()
                .output()
                .map_err(|e| ProcessError::TerminationFailed {
                    name: name.to_string(),
                    reason: format!("failed to run taskkill: {}", e),
                })?;

            taskkill_result(name, output.status.code(), &String::from_utf8_lossy(&output.stderr))?;
        }

        #[cfg(not(target_os = "windows"))]
        {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            let own = std::process::id();
            let pids = crate::process_monitor::find_pids_by_image(name)
                .into_iter()
                .filter(|&pid| pid != own);
            kill_each(name, pids, |pid| signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL))?;
        }

        Ok(())
    }
}

/// Signal every PID, even after a failure; failures are reported together.
#[cfg(not(target_os = "windows"))]
fn kill_each<F>(name: &str, pids: impl IntoIterator<Item = u32>, mut kill: F) -> Result<(), ProcessError>
where
    F: FnMut(u32) -> nix::Result<()>,
{
    let mut failures = Vec::new();
    for pid in pids {
        match kill(pid) {
            Ok(()) => tracing::info!("Sent KILL to '{}' (pid: {})", name, pid),
            // exited between enumeration and kill
            Err(nix::errno::Errno::ESRCH) => {}
            Err(e) => {
                tracing::warn!("Failed to send KILL to '{}' (pid: {}): {}", name, pid, e);
                failures.push(format!("pid {}: {}", pid, e));
            }
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ProcessError::TerminationFailed {
            name: name.to_string(),
            reason: failures.join(", "),
        })
    }
}

/// taskkill exit code when no process matched the image name.
pub const TASKKILL_NOT_FOUND: i32 = 128;

/// Map a taskkill exit status: success and "not found" are fine,
/// anything else (access denied, ...) is a failure.
pub fn taskkill_result(name: &str, code: Option<i32>, stderr: &str) -> Result<(), ProcessError> {
    match code {
        Some(0) => Ok(()),
        Some(TASKKILL_NOT_FOUND) => {
            tracing::debug!("taskkill found no '{}' process", name);
            Ok(())
        }
        other => Err(ProcessError::TerminationFailed {
            name: name.to_string(),
            reason: match other {
                Some(code) => format!("taskkill exited with {}: {}", code, stderr.trim()),
                None => format!("taskkill was terminated: {}", stderr.trim()),
            },
        }),
    }
}
