//! On-disk persisted state for the local driver.
//!
//! One JSON document maps resource addresses to their last reconciled
//! [`SessionModel`]. Every access holds an exclusive lock on a sibling
//! `.lock` file and writes go through a temp file and rename.

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::{STATE_DIR_NAME, STATE_FILE_NAME, STATE_FORMAT_VERSION};
use crate::session::SessionModel;

/// Errors that can occur while accessing the state file.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to lock {}: {source}", path.display())]
    LockFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a valid state file: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} has state format version {found}, expected {expected}", path.display())]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

pub type Result<T> = std::result::Result<T, StateError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDocument {
    pub version: u32,
    #[serde(default)]
    pub resources: BTreeMap<String, SessionModel>,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            version: STATE_FORMAT_VERSION,
            resources: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let lock_path = path.with_extension("lock");
        Self { path, lock_path }
    }

    /// `<cache dir>/doom-provider/terraform.tfstate.json`
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(STATE_DIR_NAME)
            .join(STATE_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<StateDocument> {
        let lock = self.lock()?;
        let doc = self.read_unlocked();
        drop(lock);
        doc
    }

    pub fn get(&self, address: &str) -> Result<Option<SessionModel>> {
        Ok(self.load()?.resources.remove(address))
    }

    /// Set (`Some`) or remove (`None`) the state of one address.
    pub fn put(&self, address: &str, model: Option<SessionModel>) -> Result<()> {
        self.update(|doc| match model {
            Some(model) => {
                doc.resources.insert(address.to_string(), model);
            }
            None => {
                doc.resources.remove(address);
            }
        })
        .map(|_| ())
    }

    /// Read-modify-write the whole document under one lock.
    pub fn update<F>(&self, f: F) -> Result<StateDocument>
    where
        F: FnOnce(&mut StateDocument),
    {
        let lock = self.lock()?;
        let mut doc = self.read_unlocked()?;
        f(&mut doc);
        self.write_unlocked(&doc)?;
        drop(lock);
        Ok(doc)
    }

    fn lock(&self) -> Result<File> {
        if let Some(parent) = self.lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StateError::LockFailed {
                path: self.lock_path.clone(),
                source,
            })?;
        }
        let file = File::create(&self.lock_path).map_err(|source| StateError::LockFailed {
            path: self.lock_path.clone(),
            source,
        })?;
        file.lock_exclusive()
            .map_err(|source| StateError::LockFailed {
                path: self.lock_path.clone(),
                source,
            })?;
        Ok(file)
    }

    fn read_unlocked(&self) -> Result<StateDocument> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StateDocument::default()),
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(StateDocument::default());
        }

        let doc: StateDocument =
            serde_json::from_str(&content).map_err(|source| StateError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        if doc.version != STATE_FORMAT_VERSION {
            return Err(StateError::UnsupportedVersion {
                path: self.path.clone(),
                found: doc.version,
                expected: STATE_FORMAT_VERSION,
            });
        }

        Ok(doc)
    }

    fn write_unlocked(&self, doc: &StateDocument) -> Result<()> {
        let write_err = |source: io::Error| StateError::Write {
            path: self.path.clone(),
            source,
        };

        let content = serde_json::to_string_pretty(doc)
            .map_err(|e| write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        // Atomic write via temp file
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, content).map_err(write_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(write_err)?;

        log::debug!(
            "Wrote {} resource(s) to {}",
            doc.resources.len(),
            self.path.display()
        );
        Ok(())
    }
}
