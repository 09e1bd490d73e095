//! Status poller.
//!
//! One background task asks the process locator every interval whether
//! goodbyedpi is running and hands the answer to every observer. Published
//! status lags reality by at most one interval.

pub mod tray;

pub use tray::TrayIndicator;

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::process_monitor::{is_running_async, ProcessLocator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Running,
    Stopped,
}

impl Status {
    pub fn from_running(running: bool) -> Self {
        if running {
            Self::Running
        } else {
            Self::Stopped
        }
    }
}

/// Receives every poll result.
pub trait StatusObserver: Send + Sync {
    fn on_status(&self, status: Status);
}

/// Logs transitions, stays quiet while the status holds.
#[derive(Default)]
pub struct LogObserver {
    last: Mutex<Option<Status>>,
}

impl LogObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusObserver for LogObserver {
    fn on_status(&self, status: Status) {
        let Ok(mut last) = self.last.lock() else {
            return;
        };
        if *last != Some(status) {
            match *last {
                Some(prev) => tracing::info!("goodbyedpi status: {:?} -> {:?}", prev, status),
                None => tracing::info!("goodbyedpi status: {:?}", status),
            }
            *last = Some(status);
        }
    }
}

/// Handle to the running poll loop. Once stopped it cannot be resumed.
pub struct StatusPoller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    status_rx: watch::Receiver<Status>,
}

impl StatusPoller {
    /// Start polling right away; the first probe happens immediately.
    pub fn spawn(
        locator: Arc<dyn ProcessLocator>,
        process_name: impl Into<String>,
        interval: Duration,
        observers: Vec<Arc<dyn StatusObserver>>,
    ) -> Self {
        let process_name = process_name.into();
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(Status::Stopped);

        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tracing::info!(
                "Status poller started for '{}' (every {:?})",
                process_name,
                interval
            );
            loop {
                let running = tokio::select! {
                    _ = token.cancelled() => break,
                    running = is_running_async(locator.clone(), &process_name) => running,
                };
                let status = Status::from_running(running);

                for observer in &observers {
                    observer.on_status(status);
                }
                status_tx.send_if_modified(|current| {
                    let changed = *current != status;
                    *current = status;
                    changed
                });

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            tracing::info!("Status poller stopped");
        });

        Self {
            cancel,
            handle,
            status_rx,
        }
    }

    /// Latest published status.
    pub fn current(&self) -> Status {
        *self.status_rx.borrow()
    }

    /// Receiver that wakes on status changes.
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status_rx.clone()
    }

    /// Signal the loop to exit and wait for it.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!("Status poller task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Switch(AtomicBool);

    impl ProcessLocator for Switch {
        fn is_running(&self, _: &str) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Status>>,
        calls: AtomicUsize,
    }

    impl StatusObserver for Recorder {
        fn on_status(&self, status: Status) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(status);
        }
    }

    #[tokio::test]
    async fn publishes_every_poll_and_tracks_changes() {
        let switch = Arc::new(Switch(AtomicBool::new(false)));
        let recorder = Arc::new(Recorder::default());
        let poller = StatusPoller::spawn(
            switch.clone(),
            "goodbyedpi.exe",
            Duration::from_millis(20),
            vec![recorder.clone() as Arc<dyn StatusObserver>],
        );
        let mut rx = poller.subscribe();

        switch.0.store(true, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == Status::Running))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(poller.current(), Status::Running);

        poller.stop().await;

        let seen = recorder.seen.lock().unwrap().clone();
        assert!(seen.contains(&Status::Running));
        assert!(recorder.calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn stop_ends_the_loop() {
        let switch = Arc::new(Switch(AtomicBool::new(false)));
        let recorder = Arc::new(Recorder::default());
        let poller = StatusPoller::spawn(
            switch,
            "goodbyedpi.exe",
            Duration::from_millis(10),
            vec![recorder.clone() as Arc<dyn StatusObserver>],
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        poller.stop().await;

        let after_stop = recorder.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.calls.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn log_observer_tolerates_repeats() {
        let obs = LogObserver::new();
        obs.on_status(Status::Stopped);
        obs.on_status(Status::Stopped);
        obs.on_status(Status::Running);
        assert_eq!(*obs.last.lock().unwrap(), Some(Status::Running));
    }
}
