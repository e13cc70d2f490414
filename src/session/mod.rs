//! Doom session management.
//!
//! This module provides:
//! - The `doom_session` resource state machine (`resource`)
//! - Process-table probes by pid (`process`)

pub mod process;
pub mod resource;

pub use process::{Liveness, ProcessHandle, ProcessTable, SystemProcessTable};
pub use resource::{
    LaunchError, ReadOutcome, SessionConfig, SessionModel, SessionResource, TerminationError,
};
