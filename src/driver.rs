//! Local plan/apply driver for `doom_session` resources.
//!
//! The driver compares the declared session against persisted state and
//! decides what to do. A changed declaration is always a replacement: the
//! resource has no in-place update path.

use std::collections::BTreeMap;

use serde_json::json;

use crate::error::Result;
use crate::schema::session_schema;
use crate::session::{ReadOutcome, SessionConfig, SessionModel, SessionResource};
use crate::state::StateStore;

/// Planned change for one resource address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    NoOp,
    Create,
    /// Destroy then create, because of changes to these attributes.
    Replace { attributes: Vec<String> },
    Delete,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoOp => write!(f, "no changes"),
            Self::Create => write!(f, "create"),
            Self::Replace { attributes } => {
                write!(f, "replace (forced by {})", attributes.join(", "))
            }
            Self::Delete => write!(f, "destroy"),
        }
    }
}

/// Compare declared and prior state.
pub fn plan(declared: Option<&SessionConfig>, prior: Option<&SessionModel>) -> Action {
    match (declared, prior) {
        (None, None) => Action::NoOp,
        (None, Some(_)) => Action::Delete,
        (Some(_), None) => Action::Create,
        (Some(config), Some(state)) => {
            let schema = session_schema();
            let attributes: Vec<String> = schema
                .requires_replace(&json!({ "wad": state.wad }), &json!({ "wad": config.wad }))
                .into_iter()
                .map(String::from)
                .collect();
            if attributes.is_empty() {
                Action::NoOp
            } else {
                Action::Replace { attributes }
            }
        }
    }
}

/// Result of an apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub action: Action,
    pub state: Option<SessionModel>,
}

/// Drives one provider configuration against a state file.
pub struct Driver {
    resource: SessionResource,
    store: StateStore,
}

impl Driver {
    pub fn new(resource: SessionResource, store: StateStore) -> Self {
        Self { resource, store }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Read the session at `address` and persist what was found.
    pub async fn refresh(&self, address: &str) -> Result<Option<SessionModel>> {
        let Some(prior) = self.store.get(address)? else {
            return Ok(None);
        };

        let current = match self.resource.read(&prior).await {
            ReadOutcome::Present(state) => Some(state),
            ReadOutcome::Removed => {
                log::info!("{} is gone, it will be recreated on next apply", address);
                None
            }
            ReadOutcome::Inconclusive { state, .. } => return Ok(Some(state)),
        };

        self.store.put(address, current.clone())?;
        Ok(current)
    }

    /// Refresh every address in the state file concurrently.
    pub async fn refresh_all(&self) -> Result<BTreeMap<String, SessionModel>> {
        let prior = self.store.load()?.resources;

        let handles: Vec<_> = prior
            .into_iter()
            .map(|(address, state)| {
                let resource = self.resource.clone();
                let task = tokio::spawn({
                    let state = state.clone();
                    async move { resource.read(&state).await }
                });
                (address, state, task)
            })
            .collect();

        let mut outcomes = Vec::new();
        for (address, state, task) in handles {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                // A task that died never looked at the process: keep its state
                Err(e) => {
                    log::warn!("Refresh of {} failed: {}", address, e);
                    ReadOutcome::Inconclusive {
                        state,
                        reason: std::io::Error::other(e),
                    }
                }
            };
            outcomes.push((address, outcome));
        }

        let doc = self.store.update(|doc| {
            for (address, outcome) in outcomes {
                match outcome {
                    ReadOutcome::Present(state) => {
                        doc.resources.insert(address, state);
                    }
                    ReadOutcome::Removed => {
                        log::info!("{} is gone, it will be recreated on next apply", address);
                        doc.resources.remove(&address);
                    }
                    ReadOutcome::Inconclusive { .. } => {}
                }
            }
        })?;

        Ok(doc.resources)
    }

    pub async fn plan(&self, address: &str, declared: Option<&SessionConfig>) -> Result<Action> {
        let prior = self.refresh(address).await?;
        Ok(plan(declared, prior.as_ref()))
    }

    /// Refresh, plan and execute. State is persisted after every step, so a
    /// failed apply leaves the last reconciled state behind.
    pub async fn apply(&self, address: &str, declared: Option<&SessionConfig>) -> Result<ApplyReport> {
        let prior = self.refresh(address).await?;
        let action = plan(declared, prior.as_ref());

        let state = match (&action, declared, prior) {
            (Action::NoOp, _, prior) => prior,
            (Action::Create, Some(config), _) => Some(self.create(address, config).await?),
            (Action::Replace { .. }, Some(config), Some(prior)) => {
                self.delete(address, &prior).await?;
                Some(self.create(address, config).await?)
            }
            (Action::Delete, _, Some(prior)) => {
                self.delete(address, &prior).await?;
                None
            }
            (_, _, prior) => prior,
        };

        Ok(ApplyReport { action, state })
    }

    pub async fn destroy(&self, address: &str) -> Result<ApplyReport> {
        self.apply(address, None).await
    }

    async fn create(&self, address: &str, config: &SessionConfig) -> Result<SessionModel> {
        let state = self.resource.create(config).await?;
        self.store.put(address, Some(state.clone()))?;
        Ok(state)
    }

    async fn delete(&self, address: &str, prior: &SessionModel) -> Result<()> {
        self.resource.delete(prior).await?;
        self.store.put(address, None)?;
        Ok(())
    }
}
