//! Tray indicator state.
//!
//! Holds what the system-tray icon should show. The UI layer reads it; the
//! status poller writes it as one observer among others.

use std::sync::RwLock;

use super::{Status, StatusObserver};

pub const ICON_RUNNING: &str = "Resources/Icon1.ico";
pub const ICON_STOPPED: &str = "Resources/forbidden.ico";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayView {
    pub tooltip: String,
    pub icon: &'static str,
}

impl TrayView {
    fn for_status(status: Status) -> Self {
        match status {
            Status::Running => Self {
                tooltip: "GoodByeDPI Running".to_string(),
                icon: ICON_RUNNING,
            },
            Status::Stopped => Self {
                tooltip: "GoodByeDPI Stopped".to_string(),
                icon: ICON_STOPPED,
            },
        }
    }
}

#[derive(Debug)]
pub struct TrayIndicator {
    view: RwLock<TrayView>,
    shutting_down: RwLock<bool>,
}

impl Default for TrayIndicator {
    fn default() -> Self {
        Self {
            view: RwLock::new(TrayView {
                tooltip: "GoodByeDPI-GUI".to_string(),
                icon: ICON_RUNNING,
            }),
            shutting_down: RwLock::new(false),
        }
    }
}

impl TrayIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> TrayView {
        match self.view.read() {
            Ok(v) => v.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Show "Shutting Down" and ignore further status updates.
    pub fn mark_shutting_down(&self) {
        if let Ok(mut flag) = self.shutting_down.write() {
            *flag = true;
        }
        if let Ok(mut view) = self.view.write() {
            view.tooltip = "Shutting Down".to_string();
        }
    }

    fn is_shutting_down(&self) -> bool {
        self.shutting_down.read().map(|f| *f).unwrap_or(true)
    }
}

impl StatusObserver for TrayIndicator {
    fn on_status(&self, status: Status) {
        if self.is_shutting_down() {
            return;
        }
        if let Ok(mut view) = self.view.write() {
            *view = TrayView::for_status(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_status() {
        let tray = TrayIndicator::new();
        tray.on_status(Status::Running);
        assert_eq!(tray.view().tooltip, "GoodByeDPI Running");
        assert_eq!(tray.view().icon, ICON_RUNNING);

        tray.on_status(Status::Stopped);
        assert_eq!(tray.view().tooltip, "GoodByeDPI Stopped");
        assert_eq!(tray.view().icon, ICON_STOPPED);
    }

    #[test]
    fn shutting_down_is_sticky() {
        let tray = TrayIndicator::new();
        tray.mark_shutting_down();
        tray.on_status(Status::Running);
        assert_eq!(tray.view().tooltip, "Shutting Down");
    }
}
