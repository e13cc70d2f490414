//! OS process-table probes for session processes.
//!
//! Sessions never hold an OS handle across calls. Every operation looks the
//! process up again by pid, so a probe can only tell whether *some* process
//! with that pid exists, not whether it is the one originally launched.

use std::io;
use std::time::{Duration, Instant};

/// Result of a liveness probe.
#[derive(Debug)]
pub enum Liveness {
    /// A process with the pid exists (possibly owned by another user).
    Running,
    /// No live process has the pid.
    Exited,
    /// The process table could not be queried conclusively.
    Unknown(io::Error),
}

impl Liveness {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Check whether a process with `pid` currently exists.
///
/// If `pid` is an exited child of this process it is reaped here. That
/// includes children the embedding program still holds a `Child` for:
/// their later `wait()` fails with `ECHILD`. Do not probe pids the host
/// process waits on itself.
pub fn probe(pid: i32) -> Liveness {
    if pid <= 0 {
        return Liveness::Exited;
    }

    #[cfg(unix)]
    {
        // A session launched by this process becomes our zombie once it dies
        if reap_if_exited(pid) || pid_is_zombie(pid) {
            return Liveness::Exited;
        }

        // Signal 0 doesn't send a signal but checks if the process exists
        if unsafe { libc::kill(pid as libc::pid_t, 0) } == 0 {
            return Liveness::Running;
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ESRCH) => Liveness::Exited,
            // Exists but we don't have permission to signal it
            Some(libc::EPERM) => Liveness::Running,
            _ => Liveness::Unknown(err),
        }
    }

    #[cfg(not(unix))]
    {
        Liveness::Unknown(io::Error::new(
            io::ErrorKind::Unsupported,
            "process liveness checks are only supported on unix",
        ))
    }
}

pub fn pid_exists(pid: i32) -> bool {
    probe(pid).is_running()
}

/// A process re-acquired by pid for the duration of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pid: i32,
}

impl ProcessHandle {
    /// Look up a running process. `Ok(None)` when it no longer exists,
    /// `Err` when the probe was inconclusive.
    pub fn find(pid: i32) -> io::Result<Option<Self>> {
        match probe(pid) {
            Liveness::Running => Ok(Some(Self { pid })),
            Liveness::Exited => Ok(None),
            Liveness::Unknown(e) => Err(e),
        }
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Send SIGKILL. Returns once the signal has been issued; the process
    /// may still be exiting.
    #[cfg(unix)]
    pub fn kill(self) -> io::Result<()> {
        if unsafe { libc::kill(self.pid as libc::pid_t, libc::SIGKILL) } != 0 {
            let err = io::Error::last_os_error();
            // Exited between lookup and signal
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(err);
            }
        }
        reap_if_exited(self.pid);
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn kill(self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "process termination is only supported on unix",
        ))
    }
}

/// Process-table access used by the session resource.
pub trait ProcessTable: Send + Sync + std::fmt::Debug {
    fn probe(&self, pid: i32) -> Liveness;

    /// Send the termination signal to a process that was found running.
    fn kill(&self, pid: i32) -> io::Result<()>;
}

/// The host operating system's process table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn probe(&self, pid: i32) -> Liveness {
        probe(pid)
    }

    fn kill(&self, pid: i32) -> io::Result<()> {
        ProcessHandle { pid }.kill()
    }
}

/// Wait for a process to exit. Returns false if it is still alive at the
/// deadline.
pub fn wait_for_exit(pid: i32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        if matches!(probe(pid), Liveness::Exited) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    matches!(probe(pid), Liveness::Exited)
}

/// Reap `pid` if it is an exited child of this process.
#[cfg(unix)]
fn reap_if_exited(pid: i32) -> bool {
    let mut status: libc::c_int = 0;
    let result = unsafe { libc::waitpid(pid as libc::pid_t, &mut status, libc::WNOHANG) };
    result == pid as libc::pid_t
}

#[cfg(target_os = "linux")]
fn pid_is_zombie(pid: i32) -> bool {
    // /proc/<pid>/stat: "<pid> (<comm>) <state> ...", comm may contain ')'
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
        return false;
    };
    stat.rfind(')')
        .and_then(|i| stat[i + 1..].trim_start().chars().next())
        .map_or(false, |state| state == 'Z')
}

#[cfg(target_os = "macos")]
fn pid_is_zombie(pid: i32) -> bool {
    let mut info: libc::proc_bsdinfo = unsafe { std::mem::zeroed() };
    let info_size = std::mem::size_of::<libc::proc_bsdinfo>() as libc::c_int;
    let result = unsafe {
        libc::proc_pidinfo(
            pid as libc::c_int,
            libc::PROC_PIDTBSDINFO,
            0,
            &mut info as *mut _ as *mut libc::c_void,
            info_size,
        )
    };
    result == info_size && info.pbi_status == libc::SZOMB
}

#[cfg(all(unix, not(any(target_os = "linux", target_os = "macos"))))]
fn pid_is_zombie(_pid: i32) -> bool {
    false
}
