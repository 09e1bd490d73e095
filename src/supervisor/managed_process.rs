//! Managed Process - the spawned goodbyedpi child
//!
//! - stdout and stderr both stream, line by line, into one [`OutputSink`]
//! - a waiter task tracks exit and publishes it on a watch channel
//! - [`ManagedProcess::terminate`] kills the child through its own handle

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::output::{OutputSink, OutputSource};
use crate::utils::HideConsole;

pub struct ManagedProcess {
    pub pid: u32,
    /// Cancelled by `terminate()`; the waiter kills the child when it fires
    cancel: CancellationToken,
    running_rx: watch::Receiver<bool>,
}

impl ManagedProcess {
    /// Spawn `program` with `args`, hiding the console window on Windows.
    pub async fn spawn(program: &str, args: &[String], sink: OutputSink) -> Result<Self> {
        let mut cmd = TokioCommand::new(program);
        cmd.args(args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            // the process may outlive us; stop() finds it again by name
            .kill_on_drop(false)
            .hide_console();

        let mut child = cmd
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to spawn process '{}': {}", program, e))?;

        let pid = child.id().unwrap_or(0);
        let (running_tx, running_rx) = watch::channel(true);
        let cancel = CancellationToken::new();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(stream_lines(stdout, OutputSource::Stdout, sink.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(stream_lines(stderr, OutputSource::Stderr, sink.clone()));
        }

        // ── process waiter ───────────────────────────────────
        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let exit_msg = tokio::select! {
                    status = child.wait() => match status {
                        Ok(status) => format!("Process exited with {}", status),
                        Err(e) => format!("Failed to wait for process: {}", e),
                    },
                    _ = cancel.cancelled() => match child.kill().await {
                        Ok(()) => "Process terminated".to_string(),
                        // already gone (killed by name first)
                        Err(e) => format!("Process terminated ({})", e),
                    },
                };
                tracing::info!("goodbyedpi (pid {}): {}", pid, exit_msg);
                let _ = running_tx.send(false);
            });
        }

        tracing::info!("Spawned '{}' with PID {}", program, pid);

        Ok(Self {
            pid,
            cancel,
            running_rx,
        })
    }

    /// Whether the child is still alive, as last seen by the waiter.
    pub fn is_running(&self) -> bool {
        *self.running_rx.borrow()
    }

    /// Kill the child through its handle. No-op once it has exited.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }

    /// Wait until the child exits.
    pub async fn wait_for_exit(&mut self) {
        while self.is_running() {
            if self.running_rx.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Forward each line of a pipe to the sink until EOF or a read error.
///
/// Lines are decoded lossily: goodbyedpi prints in the console code page,
/// and the pipe must stay open whatever bytes arrive.
async fn stream_lines<R>(pipe: R, source: OutputSource, sink: OutputSink)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                sink.push(source, decode_line(&buf)).await;
            }
            Err(e) => {
                tracing::warn!("Stopped reading {:?}: {}", source, e);
                break;
            }
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
