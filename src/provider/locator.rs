//! Executable resolution for the configured Doom binary.
//!
//! A configured value containing a path separator is checked directly;
//! a bare name is searched for in the `PATH` directories, first match wins.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while resolving the configured executable.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Executable path must not be empty")]
    Empty,

    #[error("Executable \"{name}\" not found in $PATH")]
    NotFound { name: String },

    #[error("Executable {} does not exist: {source}", path.display())]
    Missing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} exists but is not an executable file", path.display())]
    NotExecutable { path: PathBuf },

    #[error("Failed to inspect {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A located, executable binary. Built once per configuration and shared
/// read-only by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExecutable {
    path: PathBuf,
}

impl ResolvedExecutable {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Display for ResolvedExecutable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Resolves configured executable names against a search path.
#[derive(Debug, Clone, Default)]
pub struct ExecutableLocator {
    search_path: Option<OsString>,
}

impl ExecutableLocator {
    /// Locator that searches the current process's `PATH`.
    pub fn from_env() -> Self {
        Self {
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Locator with an explicit search path (same syntax as `PATH`).
    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    pub fn locate(&self, configured: &str) -> Result<ResolvedExecutable, ResolutionError> {
        // Taken verbatim: surrounding whitespace is part of the file name
        if configured.is_empty() {
            return Err(ResolutionError::Empty);
        }

        let candidate = PathBuf::from(configured);
        if candidate.components().count() > 1 || candidate.is_absolute() {
            return check_executable(&candidate).map(|path| ResolvedExecutable { path });
        }

        let Some(search_path) = &self.search_path else {
            return Err(ResolutionError::NotFound {
                name: configured.to_string(),
            });
        };

        let mut non_executable = None;
        for dir in std::env::split_paths(search_path) {
            // An empty PATH entry means the current directory
            let dir = if dir.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                dir
            };
            let path = dir.join(configured);
            match check_executable(&path) {
                Ok(path) => {
                    log::debug!("Resolved {} to {}", configured, path.display());
                    return Ok(ResolvedExecutable { path });
                }
                Err(ResolutionError::NotExecutable { path }) => {
                    non_executable.get_or_insert(path);
                }
                Err(_) => continue,
            }
        }

        match non_executable {
            Some(path) => Err(ResolutionError::NotExecutable { path }),
            None => Err(ResolutionError::NotFound {
                name: configured.to_string(),
            }),
        }
    }
}

/// Check whether `path` names an executable regular file.
pub fn is_executable(path: &Path) -> bool {
    check_executable(path).is_ok()
}

fn check_executable(path: &Path) -> Result<PathBuf, ResolutionError> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            return Err(ResolutionError::Missing {
                path: path.to_path_buf(),
                source,
            })
        }
        Err(source) => {
            return Err(ResolutionError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if !metadata.is_file() || !has_exec_bit(&metadata) {
        return Err(ResolutionError::NotExecutable {
            path: path.to_path_buf(),
        });
    }

    std::path::absolute(path).map_err(|source| ResolutionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn has_exec_bit(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_exec_bit(_metadata: &std::fs::Metadata) -> bool {
    true
}
