//! Server-held storage for in-progress login flows.
//!
//! Flows are keyed by their state token and consumed atomically by
//! [`FlowStore::take`], so a replayed callback finds nothing even if the
//! browser still carries the flow cookie.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;
use tollgate_access::{FlowSession, StateToken};
use tollgate_core::Result;

/// Flow store errors.
#[derive(Debug)]
pub enum FlowStoreError {
    /// The backing store could not be reached.
    Unavailable { details: String },
    /// A stored flow could not be decoded.
    Corrupt { details: String },
}

impl fmt::Display for FlowStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { details } => write!(f, "flow store unavailable: {}", details),
            Self::Corrupt { details } => write!(f, "corrupt flow session: {}", details),
        }
    }
}

impl std::error::Error for FlowStoreError {}

/// Storage for [`FlowSession`]s.
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Persists a new flow, replacing any flow with the same state token.
    async fn insert(&self, flow: FlowSession) -> Result<(), FlowStoreError>;

    /// Removes and returns the flow for `state`.
    ///
    /// Expired flows are removed but reported as absent.
    async fn take(&self, state: &StateToken) -> Result<Option<FlowSession>, FlowStoreError>;

    /// Deletes every expired flow, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64, FlowStoreError>;
}

/// Process-local flow store.
///
/// Flows do not survive a restart, which only costs users an in-progress
/// login.
#[derive(Debug, Default)]
pub struct MemoryFlowStore {
    flows: Mutex<HashMap<StateToken, FlowSession>>,
}

impl MemoryFlowStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored flows, expired or not.
    pub async fn len(&self) -> usize {
        self.flows.lock().await.len()
    }

    /// Returns true if no flows are stored.
    pub async fn is_empty(&self) -> bool {
        self.flows.lock().await.is_empty()
    }
}

#[async_trait]
impl FlowStore for MemoryFlowStore {
    async fn insert(&self, flow: FlowSession) -> Result<(), FlowStoreError> {
        self.flows.lock().await.insert(flow.state().clone(), flow);
        Ok(())
    }

    async fn take(&self, state: &StateToken) -> Result<Option<FlowSession>, FlowStoreError> {
        let flow = self.flows.lock().await.remove(state);
        Ok(flow.filter(|flow| !flow.is_expired()))
    }

    async fn purge_expired(&self) -> Result<u64, FlowStoreError> {
        let mut flows = self.flows.lock().await;
        let before = flows.len();
        flows.retain(|_, flow| !flow.is_expired());
        Ok((before - flows.len()) as u64)
    }
}
