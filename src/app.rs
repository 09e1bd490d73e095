//! Controller used by the front-end.
//!
//! Owns the current selection and wires it to the profile store, the
//! supervisor and the status poller. The front-end only calls these
//! operations; it never holds option state of its own.

use std::sync::Arc;

use crate::config::GlobalConfig;
use crate::options::{OptionError, OptionValue, Preset, Selection};
use crate::path_detector::resolve_executable;
use crate::process_monitor::{ProcessLocator, SystemLocator};
use crate::profile::{ProfileError, ProfileRecord, ProfileStore};
use crate::status::{StatusObserver, StatusPoller};
use crate::supervisor::error::SupervisorError;
use crate::supervisor::process::{ProcessTerminator, SystemTerminator};
use crate::supervisor::{RunOutcome, Supervisor};

pub struct App {
    config: GlobalConfig,
    executable: String,
    selection: Selection,
    profiles: ProfileStore,
    locator: Arc<dyn ProcessLocator>,
    supervisor: Arc<Supervisor>,
}

impl App {
    pub fn new(config: GlobalConfig) -> Self {
        let executable = resolve_executable(&config.executable_path)
            .to_string_lossy()
            .into_owned();
        Self::with_backends(config, executable, Arc::new(SystemLocator), Arc::new(SystemTerminator))
    }

    pub fn with_backends(
        config: GlobalConfig,
        executable: impl Into<String>,
        locator: Arc<dyn ProcessLocator>,
        terminator: Arc<dyn ProcessTerminator>,
    ) -> Self {
        let supervisor = Arc::new(Supervisor::new(
            config.supervisor_config(),
            locator.clone(),
            terminator,
        ));
        Self {
            profiles: ProfileStore::new(&config.profile_path),
            executable: executable.into(),
            selection: Selection::default(),
            locator,
            supervisor,
            config,
        }
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Pick a preset by id ("" clears it). Resets all individual options.
    pub fn select_preset(&mut self, id: &str) -> Result<(), OptionError> {
        let preset = Preset::resolve(id)?;
        self.selection.select_preset(preset);
        Ok(())
    }

    pub fn set_option(&mut self, flag: &str, value: impl Into<OptionValue>) -> Result<(), OptionError> {
        self.selection.options.set(flag, value)
    }

    /// The argv a run request would use right now.
    pub fn command_line(&self) -> Vec<String> {
        self.selection.argv(&self.executable)
    }

    pub async fn run(&self) -> Result<RunOutcome, SupervisorError> {
        self.supervisor.run(&self.command_line()).await
    }

    pub async fn stop(&self) -> Result<(), SupervisorError> {
        self.supervisor.stop().await
    }

    pub fn save_profile(&self) -> Result<(), ProfileError> {
        self.profiles.save(&ProfileRecord::capture(&self.selection))
    }

    /// Replace the selection with the saved profile.
    /// Returns `false` (selection untouched) when none exists.
    pub fn load_profile(&mut self) -> Result<bool, ProfileError> {
        match self.profiles.load()? {
            Some(record) => {
                self.selection = record.restore();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn start_poller(&self, observers: Vec<Arc<dyn StatusObserver>>) -> StatusPoller {
        StatusPoller::spawn(
            self.locator.clone(),
            self.config.process_name.clone(),
            self.config.poll_interval(),
            observers,
        )
    }

    /// Stop the poller (if any), then tear the supervisor down.
    pub async fn shutdown(&self, poller: Option<StatusPoller>) -> Result<(), SupervisorError> {
        if let Some(poller) = poller {
            poller.stop().await;
        }
        self.supervisor.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::process::ProcessError;
    use tempfile::TempDir;

    struct Never;

    impl ProcessLocator for Never {
        fn is_running(&self, _: &str) -> bool {
            false
        }
    }

    struct NoopTerminator;

    impl ProcessTerminator for NoopTerminator {
        fn terminate_by_name(&self, _: &str) -> Result<(), ProcessError> {
            Ok(())
        }
    }

    fn app(dir: &TempDir) -> App {
        let config = GlobalConfig {
            profile_path: dir.path().join("profile.json").to_string_lossy().into_owned(),
            shutdown_grace_secs: 0,
            ..Default::default()
        };
        App::with_backends(config, "bin/goodbyedpi.exe", Arc::new(Never), Arc::new(NoopTerminator))
    }

    #[test]
    fn preset_selection_drives_command_line() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        app.set_option("-q", true).unwrap();
        app.select_preset("-5").unwrap();
        app.set_option("--port", "443").unwrap();

        assert_eq!(app.command_line(), vec!["bin/goodbyedpi.exe", "-5"]);

        app.select_preset("").unwrap();
        assert_eq!(app.command_line(), vec!["bin/goodbyedpi.exe"]);
    }

    #[test]
    fn unknown_preset_is_rejected_and_selection_kept() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        app.select_preset("-2").unwrap();
        assert!(app.select_preset("-77").is_err());
        assert_eq!(app.selection().preset.map(|p| p.id), Some("-2"));
    }

    #[test]
    fn profile_roundtrip_through_app() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        assert!(!app.load_profile().unwrap());

        app.select_preset("-3").unwrap();
        app.save_profile().unwrap();

        let mut fresh = self::app(&dir);
        assert!(fresh.load_profile().unwrap());
        assert_eq!(fresh.command_line(), vec!["bin/goodbyedpi.exe", "-3"]);
        assert_eq!(fresh.selection(), app.selection());
    }

    #[tokio::test]
    async fn shutdown_stops_poller_and_supervisor() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let poller = app.start_poller(vec![]);
        app.shutdown(Some(poller)).await.unwrap();

        assert!(matches!(app.run().await, Err(SupervisorError::ShuttingDown)));
    }
}
