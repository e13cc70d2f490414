//! The `doom` provider: configuration, metadata and session construction.
//!
//! `configure` is the only place the executable is located. Its result is
//! wrapped in an immutable [`ProviderData`] that every session resource
//! holds by reference for the lifetime of that configuration.

pub mod locator;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::defaults::{self, DEV_VERSION, PROVIDER_TYPE_NAME};
use crate::error::Result;
use crate::schema::{self, Schema};
use crate::session::SessionResource;

pub use locator::{ExecutableLocator, ResolutionError, ResolvedExecutable};

/// Provider configuration block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub path: String,
}

impl ProviderConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Immutable, shared result of a successful `configure`.
#[derive(Debug)]
pub struct ProviderData {
    pub executable: ResolvedExecutable,
}

/// Provider type name and version as reported to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMetadata {
    pub type_name: String,
    pub version: String,
}

pub struct DoomProvider {
    /// "dev" for local builds, "test" under acceptance tests, the
    /// release version otherwise.
    version: String,
    locator: ExecutableLocator,
}

impl DoomProvider {
    pub fn new(version: impl Into<String>) -> Self {
        Self::with_locator(version, ExecutableLocator::from_env())
    }

    pub fn with_locator(version: impl Into<String>, locator: ExecutableLocator) -> Self {
        Self {
            version: version.into(),
            locator,
        }
    }

    pub fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            type_name: PROVIDER_TYPE_NAME.to_string(),
            version: self.version.clone(),
        }
    }

    pub fn schema(&self) -> Schema {
        schema::provider_schema()
    }

    /// Resolve the configured executable. Any failure here is fatal to
    /// the configuration and no session operation may run.
    pub fn configure(&self, config: &ProviderConfig) -> Result<Arc<ProviderData>> {
        let executable = self.locator.locate(&config.path)?;
        log::debug!("Configured {} provider with {}", PROVIDER_TYPE_NAME, executable);
        Ok(Arc::new(ProviderData { executable }))
    }

    /// Resource type names this provider serves.
    pub fn resource_types(&self) -> Vec<String> {
        vec![defaults::session_type_name(PROVIDER_TYPE_NAME)]
    }

    pub fn session_resource(&self, data: Arc<ProviderData>) -> SessionResource {
        SessionResource::new(data)
    }
}

impl Default for DoomProvider {
    fn default() -> Self {
        Self::new(DEV_VERSION)
    }
}
