//! Single-instance guard for the agents.
//!
//! A lock is a directory `{name}.lock/` holding a `pid` file. Creating the
//! directory is atomic, so whichever process creates it first owns it.
//!
//! ```text
//! {name}.lock/
//! └── pid          # Plain text: the owning process ID
//! ```
//!
//! A lock whose pid is no longer alive is stale and gets taken over. The lock
//! directory is removed when the guard is dropped.

use std::path::{Path, PathBuf};

use fs_err as fs;
use tracing::{debug, warn};

use crate::error::{MonitorError, Result};

/// Reports whether `pid` names a running process.
///
/// A process owned by another user still counts as alive.
pub fn is_pid_alive(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    #[cfg(unix)]
    {
        if unsafe { libc::kill(pid as i32, 0) } == 0 {
            return true;
        }
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(windows)]
    {
        use windows_sys::Win32::Foundation::{
            CloseHandle, GetLastError, ERROR_ACCESS_DENIED, STILL_ACTIVE,
        };
        use windows_sys::Win32::System::Threading::{
            GetExitCodeProcess, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
        };
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                return GetLastError() == ERROR_ACCESS_DENIED;
            }
            let mut exit_code: u32 = 0;
            let queried = GetExitCodeProcess(handle, &mut exit_code);
            let _ = CloseHandle(handle);
            queried != 0 && exit_code == STILL_ACTIVE as u32
        }
    }
    // No liveness check here: a foreign holder is assumed alive.
    #[cfg(not(any(unix, windows)))]
    {
        true
    }
}

/// Pids outside `1..=i32::MAX` cannot belong to a holder and mark the lock stale.
fn read_lock_pid(lock_dir: &Path) -> Option<u32> {
    let pid_str = fs::read_to_string(lock_dir.join("pid")).ok()?;
    let pid: u32 = pid_str.trim().parse().ok()?;
    (pid != 0 && pid <= i32::MAX as u32).then_some(pid)
}

#[derive(Debug)]
pub struct InstanceLock {
    lock_dir: PathBuf,
}

impl InstanceLock {
    /// Acquires `{base}/{name}.lock` for the current process.
    ///
    /// Returns [`MonitorError::AlreadyRunning`] when a live process holds it.
    pub fn acquire(base: &Path, name: &str) -> Result<Self> {
        Self::acquire_for_pid(base, name, std::process::id())
    }

    fn acquire_for_pid(base: &Path, name: &str, pid: u32) -> Result<Self> {
        fs::create_dir_all(base)
            .map_err(|e| MonitorError::io("Failed to create lock base directory", e))?;
        let lock_dir = base.join(format!("{}.lock", name));

        match fs::create_dir(&lock_dir) {
            Ok(()) => {}
            Err(ref e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                match read_lock_pid(&lock_dir) {
                    Some(owner) if owner == pid => {
                        debug!(path = %lock_dir.display(), "Lock already owned by this process");
                    }
                    Some(owner) if is_pid_alive(owner) => {
                        return Err(MonitorError::AlreadyRunning {
                            path: lock_dir,
                            pid: owner,
                        });
                    }
                    owner => {
                        warn!(
                            path = %lock_dir.display(),
                            stale_pid = ?owner,
                            "Taking over stale instance lock"
                        );
                        fs::remove_dir_all(&lock_dir)
                            .map_err(|e| MonitorError::io("Failed to remove stale lock", e))?;
                        fs::create_dir(&lock_dir)
                            .map_err(|e| MonitorError::io("Failed to create lock directory", e))?;
                    }
                }
            }
            Err(e) => return Err(MonitorError::io("Failed to create lock directory", e)),
        }

        if let Err(e) = fs::write(lock_dir.join("pid"), pid.to_string()) {
            let _ = fs::remove_dir_all(&lock_dir);
            return Err(MonitorError::io("Failed to write lock pid", e));
        }

        Ok(InstanceLock { lock_dir })
    }

    pub fn path(&self) -> &Path {
        &self.lock_dir
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.lock_dir) {
            warn!(error = %e, "Failed to release instance lock");
        }
    }
}
