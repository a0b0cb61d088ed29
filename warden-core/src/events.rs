//! Security events emitted by the throttling service.
//!
//! Events notify interested parties (audit sinks, alerting, metrics) about
//! state transitions: failed attempts, addresses becoming blocked, and
//! addresses becoming unblocked. Handlers are registered on an [`EventBus`]
//! owned by the service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{Principal, error::EventError};

/// Reason why an address was unblocked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnblockReason {
    /// The block duration lapsed.
    Expired,
    /// An operator explicitly cleared the block.
    AdminAction,
}

/// Security events for login throttling.
#[derive(Debug, Clone)]
pub enum Event {
    /// Emitted when an authentication attempt fails.
    LoginFailed {
        /// The login identity that was attempted, when known.
        principal: Option<Principal>,
        /// The source address of the attempt.
        address: String,
        /// Failed attempts within the current window, including this one.
        failed_attempts: u32,
        /// When the attempt occurred.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an address becomes blocked.
    ///
    /// Security-critical: repeat blocks indicate an active brute-force
    /// source and should trigger alerts.
    AddressBlocked {
        /// The blocked source address.
        address: String,
        /// Failed attempts that triggered the block.
        failed_attempts: u32,
        /// When the block lapses.
        blocked_until: DateTime<Utc>,
        /// Blocks this address had already served.
        prior_blocks: u32,
        /// When the block was imposed.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an address is unblocked, either by expiry or by an
    /// operator.
    AddressUnblocked {
        /// The unblocked source address.
        address: String,
        /// Why the address was unblocked.
        reason: UnblockReason,
        /// When the unblock occurred.
        timestamp: DateTime<Utc>,
    },
}

/// A handler invoked for every event emitted on the bus.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Event bus that emits events to registered handlers.
///
/// Handlers are called in registration order; the first handler error stops
/// delivery and is returned to the emitter.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event handler with the bus.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: &Event) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.handle_event(event).await?;
        }

        Ok(())
    }
}
