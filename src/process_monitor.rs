//! Process locator — "is goodbyedpi running right now?"
//!
//! Best-effort probe over the OS process table. Every enumeration error is
//! folded into "not running"; the locator never fails towards its caller.

use std::path::Path;
use sysinfo::System;

/// Answers whether an executable with the given basename is running.
pub trait ProcessLocator: Send + Sync {
    fn is_running(&self, executable_name: &str) -> bool;
}

/// Locator backed by the real OS process table.
///
/// Windows walks `EnumProcesses` + `QueryFullProcessImageNameW`; other
/// platforms go through `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLocator;

impl ProcessLocator for SystemLocator {
    fn is_running(&self, executable_name: &str) -> bool {
        #[cfg(windows)]
        {
            win::is_running(executable_name)
        }
        #[cfg(not(windows))]
        {
            running_image_names().iter().any(|name| name == executable_name)
        }
    }
}

/// Basename of a full image path.
pub fn image_basename(path: &str) -> Option<&str> {
    Path::new(path).file_name().and_then(|n| n.to_str())
}

/// Basenames of every process image visible to the current user.
///
/// Falls back to the process name when the image path can't be read
/// (other users' processes on Linux).
pub fn running_image_names() -> Vec<String> {
    let mut sys = System::new();
    sys.refresh_processes();

    let names: Vec<String> = sys
        .processes()
        .values()
        .map(|process| {
            process
                .exe()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .map(String::from)
                .unwrap_or_else(|| process.name().to_string())
        })
        .collect();

    tracing::debug!("Enumerated {} processes", names.len());
    names
}

/// PIDs of every process whose image basename equals `executable_name`.
pub fn find_pids_by_image(executable_name: &str) -> Vec<u32> {
    let mut sys = System::new();
    sys.refresh_processes();

    sys.processes()
        .iter()
        .filter(|(_, process)| {
            let base = process
                .exe()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or_else(|| process.name());
            base == executable_name
        })
        .map(|(pid, _)| pid.as_u32())
        .collect()
}

// ── Async wrapper ─────────────────────────────────────────
// 프로세스 테이블 스캔은 동기 호출이므로 spawn_blocking으로 분리합니다.

/// Run a locator query on the blocking pool.
pub async fn is_running_async<L>(locator: std::sync::Arc<L>, executable_name: &str) -> bool
where
    L: ProcessLocator + ?Sized + 'static,
{
    let name = executable_name.to_string();
    tokio::task::spawn_blocking(move || locator.is_running(&name))
        .await
        .unwrap_or(false)
}

#[cfg(windows)]
mod win {
    use super::image_basename;
    use std::mem::size_of;
    use winapi::shared::minwindef::{DWORD, FALSE, MAX_PATH};
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::processthreadsapi::OpenProcess;
    use winapi::um::psapi::EnumProcesses;
    use winapi::um::winbase::QueryFullProcessImageNameW;
    use winapi::um::winnt::{HANDLE, PROCESS_QUERY_LIMITED_INFORMATION};

    /// Closes the wrapped process handle on every exit path.
    struct HandleGuard(HANDLE);

    impl Drop for HandleGuard {
        fn drop(&mut self) {
            unsafe {
                CloseHandle(self.0);
            }
        }
    }

    /// All PIDs, growing the buffer until the OS stops filling it.
    fn enum_pids() -> Option<Vec<DWORD>> {
        let mut capacity = 1024usize;
        loop {
            let mut pids: Vec<DWORD> = vec![0; capacity];
            let mut needed: DWORD = 0;
            let ok = unsafe {
                EnumProcesses(
                    pids.as_mut_ptr(),
                    (capacity * size_of::<DWORD>()) as DWORD,
                    &mut needed,
                )
            };
            if ok == 0 {
                tracing::debug!("EnumProcesses failed");
                return None;
            }
            let count = needed as usize / size_of::<DWORD>();
            if count < capacity {
                pids.truncate(count);
                return Some(pids);
            }
            if capacity >= 1 << 20 {
                return None;
            }
            capacity *= 2;
        }
    }

    fn image_path(pid: DWORD) -> Option<String> {
        let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, pid) };
        if handle.is_null() {
            return None;
        }
        let _guard = HandleGuard(handle);

        let mut buf = [0u16; MAX_PATH];
        let mut len = buf.len() as DWORD;
        let ok = unsafe { QueryFullProcessImageNameW(handle, 0, buf.as_mut_ptr(), &mut len) };
        if ok == 0 {
            return None;
        }
        Some(String::from_utf16_lossy(&buf[..len as usize]))
    }

    pub(super) fn is_running(executable_name: &str) -> bool {
        let Some(pids) = enum_pids() else {
            return false;
        };
        pids.into_iter()
            .filter(|&pid| pid != 0)
            .filter_map(image_path)
            .any(|path| image_basename(&path) == Some(executable_name))
    }
}
