//! One editor per user session.
//!
//! A marker file in the runtime dir holds the pid of the running editor. A
//! marker whose pid is gone was left by a crashed instance and is cleared
//! before trying again. Check-and-claim happens under an advisory lock on a
//! separate lock file so two editors starting together cannot both win.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::EngineError;
use crate::{logi, logw};

pub const INSTANCE_FILE_NAME: &str = "shadeset.instance";
pub const LOCK_FILE_NAME: &str = "shadeset.lock";

const LOCK_ATTEMPTS: u32 = 200;
const LOCK_RETRY: Duration = Duration::from_millis(10);

/// `$XDG_RUNTIME_DIR`, or the temp dir where there is none.
pub fn default_runtime_dir() -> PathBuf {
    dirs::runtime_dir().unwrap_or_else(std::env::temp_dir)
}

/// Held for the life of the process; dropping it releases the marker.
#[derive(Debug)]
pub struct InstanceGuard {
    marker: PathBuf,
    pid: u32,
}

impl InstanceGuard {
    pub fn acquire() -> Result<Self, EngineError> {
        Self::acquire_in(&default_runtime_dir())
    }

    pub fn acquire_in(dir: &Path) -> Result<Self, EngineError> {
        fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
        let _lock = LockFile::acquire(dir.join(LOCK_FILE_NAME))?;

        let marker = dir.join(INSTANCE_FILE_NAME);
        let pid = std::process::id();

        if let Some(holder) = read_pid(&marker) {
            if holder != pid && is_process_alive(holder) {
                return Err(EngineError::AlreadyRunning { pid: holder });
            }
            logw!("INSTANCE", "clearing stale marker left by pid {holder}");
        }
        match fs::remove_file(&marker) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(EngineError::io(&marker, e)),
        }

        write_pid(&marker, pid)?;
        logi!("INSTANCE", "claimed {}", marker.display());
        Ok(Self { marker, pid })
    }

    pub fn marker(&self) -> &Path {
        &self.marker
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        // Only remove what is still ours.
        if read_pid(&self.marker) == Some(self.pid) {
            let _ = fs::remove_file(&self.marker);
        }
    }
}

/// Advisory lock on a lock file that stays in place between runs.
///
/// The OS drops the lock when the holder exits, so a crashed holder never
/// leaves it behind and nobody has to break it.
struct LockFile {
    _file: File,
}

impl LockFile {
    fn acquire(path: PathBuf) -> Result<Self, EngineError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| EngineError::io(&path, e))?;

        for _ in 0..LOCK_ATTEMPTS {
            if try_lock(&file).map_err(|e| EngineError::io(&path, e))? {
                return Ok(Self { _file: file });
            }
            std::thread::sleep(LOCK_RETRY);
        }
        Err(EngineError::io(
            &path,
            std::io::Error::new(ErrorKind::WouldBlock, "instance lock is busy"),
        ))
    }
}

/// Non-blocking exclusive lock; `Ok(false)` while someone else holds it.
#[cfg(unix)]
fn try_lock(file: &File) -> std::io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(windows)]
fn try_lock(file: &File) -> std::io::Result<bool> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::ERROR_LOCK_VIOLATION;
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    unsafe {
        let mut overlapped: OVERLAPPED = std::mem::zeroed();
        let ok = LockFileEx(
            file.as_raw_handle() as _,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            1,
            0,
            &mut overlapped,
        );
        if ok != 0 {
            return Ok(true);
        }
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(any(unix, windows)))]
fn try_lock(_file: &File) -> std::io::Result<bool> {
    Ok(true)
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn write_pid(path: &Path, pid: u32) -> Result<(), EngineError> {
    let mut f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| EngineError::io(path, e))?;
    write!(f, "{pid}").map_err(|e| EngineError::io(path, e))
}

/// Check if a process with the given PID is still running.
fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // Out-of-range pids would address process groups.
        let Ok(pid) = i32::try_from(pid) else {
            return false;
        };
        if pid <= 0 {
            return false;
        }
        // Signal 0 only checks existence; EPERM means it exists under another user.
        unsafe {
            libc::kill(pid, 0) == 0
                || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
        }
    }

    #[cfg(windows)]
    {
        use windows_sys::Win32::Foundation::CloseHandle;
        use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if !handle.is_null() {
                CloseHandle(handle);
                true
            } else {
                false
            }
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        true
    }
}
