//! Doom provider - declarative lifecycle management for Doom play sessions.
//!
//! A provider configuration names the Doom executable; each `doom_session`
//! resource declares a WAD to play. The resource is reconciled through
//! create/read/delete: create launches a detached process, read detects
//! sessions that were closed outside the provider, delete kills it.

mod defaults;
pub mod error;

pub mod driver;
pub mod provider;
pub mod schema;
pub mod session;
pub mod state;

pub use error::{Error, Result};

pub use driver::{plan, Action, ApplyReport, Driver};
pub use provider::{
    DoomProvider, ExecutableLocator, ProviderConfig, ProviderData, ProviderMetadata,
    ResolutionError, ResolvedExecutable,
};
pub use schema::{Attribute, AttributeKind, PlanModifier, Schema};
pub use session::{
    LaunchError, Liveness, ProcessHandle, ProcessTable, ReadOutcome, SessionConfig,
    SessionModel, SessionResource, SystemProcessTable, TerminationError,
};
pub use state::{StateDocument, StateError, StateStore};

pub use defaults::{DEFAULT_ADDRESS, IWAD_FLAG};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
