//! The `doom_session` resource: create, read, update and delete of one
//! detached Doom process.
//!
//! State transitions:
//! - Create: Absent -> Running, records the pid
//! - Read: Running -> Running, or Running -> Absent when the pid is gone
//! - Update: never supported, every change is a replacement
//! - Delete: Running -> Absent, already-gone processes count as deleted
//!
//! The pid is the only link to the process. It is checked for existence,
//! not identity: after the session exits the OS may hand the same pid to an
//! unrelated process, and Read/Delete will then act on that process.
//!
//! Operations on one session are assumed to be serialized by the driver.
//! Different sessions may be reconciled concurrently; the only shared value
//! is the read-only [`ProviderData`].

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::{self, IWAD_FLAG, PROVIDER_TYPE_NAME};
use crate::error::{Error, Result};
use crate::provider::ProviderData;
use crate::schema::{self, Schema};
use crate::session::process::{Liveness, ProcessTable, SystemProcessTable};

/// Errors that can occur while starting a session.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("WAD must not be empty")]
    EmptyPayload,

    #[error("Failed to spawn {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Started {} as pid {pid} but failed to release it: {source}; {cleanup}", path.display())]
    Release {
        path: PathBuf,
        pid: u32,
        #[source]
        source: io::Error,
        cleanup: String,
    },

    #[error("Started {} as pid {pid} but it exited immediately: {status}", path.display())]
    ExitedEarly {
        path: PathBuf,
        pid: u32,
        status: ExitStatus,
    },

    #[error("Started {} as pid {pid}, which does not fit a 32-bit process ID; {cleanup}", path.display())]
    PidOutOfRange {
        path: PathBuf,
        pid: u32,
        cleanup: String,
    },
}

/// Errors that can occur while stopping a session.
#[derive(Error, Debug)]
pub enum TerminationError {
    #[error("Failed to look up pid {pid}: {source}")]
    Lookup {
        pid: i32,
        #[source]
        source: io::Error,
    },

    #[error("Failed to kill pid {pid}: {source}")]
    Signal {
        pid: i32,
        #[source]
        source: io::Error,
    },
}

/// Declared attributes of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub wad: String,
}

impl SessionConfig {
    pub fn new(wad: impl Into<String>) -> Self {
        Self { wad: wad.into() }
    }
}

/// Persisted state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionModel {
    pub wad: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
}

impl SessionModel {
    pub fn config(&self) -> SessionConfig {
        SessionConfig::new(self.wad.clone())
    }
}

/// Outcome of refreshing a session.
#[derive(Debug)]
pub enum ReadOutcome {
    /// The process exists; state is confirmed unchanged.
    Present(SessionModel),
    /// The process is gone; the session must be dropped from state.
    Removed,
    /// The process table could not be queried. The prior state is kept.
    Inconclusive { state: SessionModel, reason: io::Error },
}

#[derive(Debug, Clone)]
pub struct SessionResource {
    data: Arc<ProviderData>,
    processes: Arc<dyn ProcessTable>,
}

impl SessionResource {
    pub fn new(data: Arc<ProviderData>) -> Self {
        Self::with_process_table(data, Arc::new(SystemProcessTable))
    }

    /// Resource that probes and signals processes through `processes`
    /// instead of the host process table.
    pub fn with_process_table(data: Arc<ProviderData>, processes: Arc<dyn ProcessTable>) -> Self {
        Self { data, processes }
    }

    pub fn type_name(&self) -> String {
        defaults::session_type_name(PROVIDER_TYPE_NAME)
    }

    pub fn schema(&self) -> Schema {
        schema::session_schema()
    }

    pub fn executable(&self) -> &Path {
        self.data.executable.path()
    }

    /// Launch a detached Doom process for `config`.
    ///
    /// Returns once the OS has started the process. The process is not tied
    /// to this call or to the provider: dropping the future or exiting the
    /// provider leaves it running.
    pub async fn create(&self, config: &SessionConfig) -> Result<SessionModel> {
        if config.wad.is_empty() {
            return Err(LaunchError::EmptyPayload.into());
        }

        let path = self.executable();
        let mut command = Command::new(path);
        command
            .arg(IWAD_FLAG)
            .arg(&config.wad)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group, so signals sent to the driver's group skip it
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn().map_err(|source| LaunchError::Spawn {
            path: path.to_path_buf(),
            source,
        })?;

        let pid = release(child, path)?;

        log::trace!("started {} with pid {}", path.display(), pid);

        Ok(SessionModel {
            wad: config.wad.clone(),
            pid: Some(pid),
        })
    }

    /// Refresh a session against the process table.
    pub async fn read(&self, state: &SessionModel) -> ReadOutcome {
        let Some(pid) = state.pid else {
            return ReadOutcome::Removed;
        };

        match self.processes.probe(pid) {
            Liveness::Running => ReadOutcome::Present(state.clone()),
            Liveness::Exited => {
                log::debug!("Doom session pid {} no longer exists, removing from state", pid);
                ReadOutcome::Removed
            }
            Liveness::Unknown(reason) => {
                log::warn!("Could not check Doom session pid {}: {}", pid, reason);
                ReadOutcome::Inconclusive {
                    state: state.clone(),
                    reason,
                }
            }
        }
    }

    /// Sessions cannot be changed in place; every declared attribute
    /// requires replacement.
    pub async fn update(&self, _prior: &SessionModel, _planned: &SessionConfig) -> Result<SessionModel> {
        Err(Error::UnsupportedOperation {
            resource: self.type_name(),
            reason: "changes require replacement. Please report this issue to the provider developers."
                .to_string(),
        })
    }

    /// Kill the session process. A process that is already gone counts as
    /// deleted; on error the caller keeps its state so Delete can be retried.
    pub async fn delete(&self, state: &SessionModel) -> Result<()> {
        let Some(pid) = state.pid else {
            return Ok(());
        };

        match self.processes.probe(pid) {
            Liveness::Running => {}
            Liveness::Exited => {
                log::debug!("Doom session pid {} was killed externally", pid);
                return Ok(());
            }
            Liveness::Unknown(source) => return Err(TerminationError::Lookup { pid, source }.into()),
        }

        self.processes
            .kill(pid)
            .map_err(|source| TerminationError::Signal { pid, source })?;

        log::info!("Killed Doom session pid {}", pid);
        Ok(())
    }
}

/// Capture the pid and give up ownership of the child.
///
/// A child that has already exited is an error: `try_wait` reaped it, so
/// its pid is free for reuse and must not be recorded.
fn release(mut child: Child, path: &Path) -> std::result::Result<i32, LaunchError> {
    let raw = child.id();

    let Ok(pid) = i32::try_from(raw) else {
        return Err(LaunchError::PidOutOfRange {
            path: path.to_path_buf(),
            pid: raw,
            cleanup: compensate(&mut child),
        });
    };

    match child.try_wait() {
        Ok(None) => {}
        Ok(Some(status)) => {
            return Err(LaunchError::ExitedEarly {
                path: path.to_path_buf(),
                pid: raw,
                status,
            });
        }
        Err(source) => {
            return Err(LaunchError::Release {
                path: path.to_path_buf(),
                pid: raw,
                source,
                cleanup: compensate(&mut child),
            });
        }
    }

    // Dropping a std Child neither kills nor waits for the process
    drop(child);
    Ok(pid)
}

/// Kill a child that was started but could not be handed off.
fn compensate(child: &mut Child) -> String {
    match child.kill() {
        Ok(()) => match child.wait() {
            Ok(_) => {
                log::warn!("Killed unmanaged pid {} after failed launch", child.id());
                "the started process was killed".to_string()
            }
            Err(e) => format!("the started process was killed but could not be reaped: {}", e),
        },
        Err(e) => format!("the started process could not be killed and may still be running: {}", e),
    }
}
