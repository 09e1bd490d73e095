use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::supervisor::SupervisorConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/global.toml";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct GlobalConfig {
    /// goodbyedpi binary, relative paths resolve via `path_detector`
    pub executable_path: String,
    /// Image basename used for detection and kill-by-name
    pub process_name: String,
    pub profile_path: String,
    pub poll_interval_secs: u64,
    pub shutdown_grace_secs: u64,
    /// Start goodbyedpi right after loading the last profile
    pub auto_run: bool,
    pub output_buffer_size: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            executable_path: "bin/goodbyedpi.exe".to_string(),
            process_name: "goodbyedpi.exe".to_string(),
            profile_path: "profile.json".to_string(),
            poll_interval_secs: 3,
            shutdown_grace_secs: 3,
            auto_run: true,
            output_buffer_size: crate::supervisor::output::DEFAULT_OUTPUT_BUFFER,
        }
    }
}

impl GlobalConfig {
    /// Path from `GOODBYEDPI_CONFIG`, else `config/global.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var("GOODBYEDPI_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Missing file → defaults; malformed file → error.
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let s = std::fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&s)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        Ok(cfg)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            process_name: self.process_name.clone(),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
            output_buffer_size: self.output_buffer_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = GlobalConfig::load_from(dir.path().join("global.toml")).unwrap();
        assert_eq!(cfg, GlobalConfig::default());
        assert_eq!(cfg.poll_interval(), Duration::from_secs(3));
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("global.toml");
        std::fs::write(&path, "poll_interval_secs = 5\nauto_run = false\n").unwrap();

        let cfg = GlobalConfig::load_from(&path).unwrap();
        assert_eq!(cfg.poll_interval_secs, 5);
        assert!(!cfg.auto_run);
        assert_eq!(cfg.process_name, "goodbyedpi.exe");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("global.toml");
        std::fs::write(&path, "poll_interval_secs = \"soon\"").unwrap();
        assert!(GlobalConfig::load_from(&path).is_err());
    }

    #[test]
    fn zero_interval_is_clamped() {
        let cfg = GlobalConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(cfg.poll_interval(), Duration::from_secs(1));
    }
}
