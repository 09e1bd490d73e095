//! Console-window suppression for every command goodbyedpi-core launches.

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Keep spawned programs (goodbyedpi itself, taskkill) from flashing a
/// console window. Does nothing outside Windows.
pub trait HideConsole {
    fn hide_console(&mut self) -> &mut Self;
}

impl HideConsole for tokio::process::Command {
    fn hide_console(&mut self) -> &mut Self {
        #[cfg(windows)]
        self.creation_flags(CREATE_NO_WINDOW);
        self
    }
}

impl HideConsole for std::process::Command {
    fn hide_console(&mut self) -> &mut Self {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.creation_flags(CREATE_NO_WINDOW);
        }
        self
    }
}
