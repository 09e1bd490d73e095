//! Supervisor for the single goodbyedpi instance.
//!
//! `run` starts goodbyedpi unless the process locator already sees it,
//! `stop` force-kills it by image name, `shutdown` is the one-time teardown
//! variant of `stop`. Control operations are serialised on one lock, which
//! also guards the child handle.

pub mod error;
pub mod managed_process;
pub mod output;
pub mod process;
pub mod state_machine;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

use crate::options::display_command;
use crate::process_monitor::{is_running_async, ProcessLocator};
use error::SupervisorError;
use managed_process::ManagedProcess;
use output::{OutputEvent, OutputSink};
use process::ProcessTerminator;
use state_machine::{State, StateMachine};

pub const MSG_ALREADY_RUNNING: &str = "GoodByeDPI Already Running Won't Start a New Instance.";
pub const MSG_RUNNING: &str = "GoodByeDPI Is Running...";
pub const MSG_FAILED_TO_START: &str = "GoodByeDPI Is Failed to Start...";
pub const MSG_STOPPED: &str = "GoodByeDPI Stopped...";

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Image basename used for detection and termination
    pub process_name: String,
    /// How long `shutdown` waits after killing, so the OS can release the driver
    pub shutdown_grace: Duration,
    pub output_buffer_size: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            process_name: "goodbyedpi.exe".to_string(),
            shutdown_grace: Duration::from_secs(3),
            output_buffer_size: output::DEFAULT_OUTPUT_BUFFER,
        }
    }
}

/// What a `run` request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Spawned and seen in the process table right after.
    Started { pid: u32 },
    /// Spawned, but the immediate re-check did not see it.
    /// It may still come up; the status poller will tell.
    NotConfirmed { pid: u32 },
    /// An instance was already running; nothing was spawned.
    AlreadyRunning,
}

struct Inner {
    machine: StateMachine,
    process: Option<ManagedProcess>,
}

impl Inner {
    /// Forget a child that has exited on its own.
    fn reconcile(&mut self) {
        let exited = self.process.as_ref().map(|p| !p.is_running()).unwrap_or(false);
        if exited {
            self.process = None;
            if self.machine.state == State::Running {
                let _ = self.machine.transition(State::Idle);
            }
        }
    }

    /// A child of ours is still alive, confirmed or not.
    fn holds_live_child(&self) -> bool {
        self.process.as_ref().is_some_and(|p| p.is_running())
    }
}

pub struct Supervisor {
    config: SupervisorConfig,
    locator: Arc<dyn ProcessLocator>,
    terminator: Arc<dyn ProcessTerminator>,
    output: OutputSink,
    inner: Mutex<Inner>,
    shut_down: AtomicBool,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        locator: Arc<dyn ProcessLocator>,
        terminator: Arc<dyn ProcessTerminator>,
    ) -> Self {
        let output = OutputSink::with_capacity(config.output_buffer_size);
        Self {
            config,
            locator,
            terminator,
            output,
            inner: Mutex::new(Inner {
                machine: StateMachine::new(),
                process: None,
            }),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn process_name(&self) -> &str {
        &self.config.process_name
    }

    /// The shared output stream.
    pub fn output(&self) -> &OutputSink {
        &self.output
    }

    /// Subscribe to output lines and clears.
    pub fn subscribe_output(&self) -> broadcast::Receiver<OutputEvent> {
        self.output.subscribe()
    }

    pub async fn state(&self) -> State {
        let mut inner = self.inner.lock().await;
        inner.reconcile();
        inner.machine.state
    }

    /// PID of the child this supervisor spawned, if it is still alive.
    pub async fn pid(&self) -> Option<u32> {
        let mut inner = self.inner.lock().await;
        inner.reconcile();
        inner.process.as_ref().map(|p| p.pid)
    }

    /// Start goodbyedpi with `argv` (executable first) unless it is running.
    ///
    /// A spawn failure is written to the output sink once and returned.
    pub async fn run(&self, argv: &[String]) -> Result<RunOutcome, SupervisorError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SupervisorError::ShuttingDown);
        }
        let (program, args) = argv.split_first().ok_or(SupervisorError::EmptyCommand)?;

        let mut inner = self.inner.lock().await;
        inner.reconcile();

        if inner.holds_live_child() || self.probe().await {
            tracing::info!("'{}' already running, not starting another", self.config.process_name);
            self.output.system(MSG_ALREADY_RUNNING).await;
            return Ok(RunOutcome::AlreadyRunning);
        }

        inner.machine.transition(State::Starting)?;
        self.output.clear().await;
        self.output.system(format!("> {}", display_command(argv))).await;

        let process = match ManagedProcess::spawn(program, args, self.output.clone()).await {
            Ok(process) => process,
            Err(e) => {
                let reason = e.to_string();
                tracing::error!("Failed to start goodbyedpi: {}", reason);
                self.output.system(format!("Error: {}", reason)).await;
                inner.machine.transition(State::Idle)?;
                return Err(SupervisorError::Spawn {
                    program: program.clone(),
                    reason,
                });
            }
        };

        let pid = process.pid;
        inner.process = Some(process);

        // 단 한 번의 재확인 — 직후에 죽는 경우는 다음 폴링에서 드러남
        if self.probe().await {
            self.output.system(MSG_RUNNING).await;
            inner.machine.transition(State::Running)?;
            Ok(RunOutcome::Started { pid })
        } else {
            tracing::warn!("'{}' (pid {}) not visible right after spawn", self.config.process_name, pid);
            self.output.system(MSG_FAILED_TO_START).await;
            inner.machine.transition(State::Idle)?;
            Ok(RunOutcome::NotConfirmed { pid })
        }
    }

    /// Force-kill every goodbyedpi by image name. Idempotent.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock().await;
        inner.reconcile();
        inner.machine.transition(State::Stopping)?;

        let name = self.config.process_name.clone();
        let terminator = self.terminator.clone();
        let killed = tokio::task::spawn_blocking(move || terminator.terminate_by_name(&name)).await;

        if let Some(process) = inner.process.take() {
            process.terminate();
        }
        inner.machine.transition(State::Idle)?;

        self.output.clear().await;
        self.output.system(MSG_STOPPED).await;

        match killed {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::warn!("{}", e);
                Err(SupervisorError::Terminate {
                    name: self.config.process_name.clone(),
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(SupervisorError::Internal(anyhow::anyhow!("terminate task failed: {}", e))),
        }
    }

    /// Teardown at application exit: stop, then wait the grace period.
    /// Only the first call does anything.
    pub async fn shutdown(&self) -> Result<(), SupervisorError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            tracing::debug!("shutdown already performed");
            return Ok(());
        }
        tracing::info!("Supervisor shutting down");
        let result = self.stop().await;
        tokio::time::sleep(self.config.shutdown_grace).await;
        result
    }

    async fn probe(&self) -> bool {
        is_running_async(self.locator.clone(), &self.config.process_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Never;

    impl ProcessLocator for Never {
        fn is_running(&self, _: &str) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct CountingTerminator(AtomicUsize);

    impl ProcessTerminator for CountingTerminator {
        fn terminate_by_name(&self, _: &str) -> Result<(), process::ProcessError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn supervisor(terminator: Arc<CountingTerminator>) -> Supervisor {
        let config = SupervisorConfig {
            shutdown_grace: Duration::from_millis(10),
            ..Default::default()
        };
        Supervisor::new(config, Arc::new(Never), terminator)
    }

    #[tokio::test]
    async fn empty_argv_is_rejected() {
        let sup = supervisor(Arc::default());
        assert!(matches!(sup.run(&[]).await, Err(SupervisorError::EmptyCommand)));
        assert_eq!(sup.state().await, State::Idle);
    }

    #[tokio::test]
    async fn spawn_failure_is_reported_once() {
        let sup = supervisor(Arc::default());
        let argv = vec!["/nonexistent/bin/goodbyedpi.exe".to_string(), "-5".to_string()];

        let err = sup.run(&argv).await.unwrap_err();
        assert_eq!(err.error_code(), "SPAWN_FAILED");
        assert_eq!(sup.state().await, State::Idle);

        let lines = sup.output().recent(10).await;
        let errors: Vec<_> = lines.iter().filter(|l| l.content.starts_with("Error: ")).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(lines[0].content, "> /nonexistent/bin/goodbyedpi.exe -5");
    }

    #[tokio::test]
    async fn stop_twice_is_harmless() {
        let terminator = Arc::new(CountingTerminator::default());
        let sup = supervisor(terminator.clone());

        assert!(sup.stop().await.is_ok());
        assert!(sup.stop().await.is_ok());

        assert_eq!(terminator.0.load(Ordering::SeqCst), 2);
        assert_eq!(sup.state().await, State::Idle);
        let lines = sup.output().recent(10).await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].content, MSG_STOPPED);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unconfirmed_child_still_blocks_a_second_run() {
        let sup = supervisor(Arc::default());
        let argv: Vec<String> = ["sh", "-c", "sleep 30"].iter().map(|s| s.to_string()).collect();

        let first = sup.run(&argv).await.unwrap();
        let RunOutcome::NotConfirmed { pid } = first else {
            panic!("expected NotConfirmed, got {:?}", first);
        };
        assert_eq!(sup.state().await, State::Idle);

        assert_eq!(sup.run(&argv).await.unwrap(), RunOutcome::AlreadyRunning);
        assert_eq!(sup.pid().await, Some(pid));

        sup.stop().await.unwrap();
        assert_eq!(sup.pid().await, None);
    }

    #[tokio::test]
    async fn shutdown_runs_once_and_blocks_run() {
        let terminator = Arc::new(CountingTerminator::default());
        let sup = supervisor(terminator.clone());

        sup.shutdown().await.unwrap();
        sup.shutdown().await.unwrap();
        assert_eq!(terminator.0.load(Ordering::SeqCst), 1);

        let argv = vec!["bin/goodbyedpi.exe".to_string()];
        assert!(matches!(sup.run(&argv).await, Err(SupervisorError::ShuttingDown)));
    }
}
