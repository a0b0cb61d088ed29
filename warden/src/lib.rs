//! # Warden
//!
//! Warden is a login attempt throttling library for Rust applications. It
//! records authentication attempts per source address, warns as failures
//! accumulate, and imposes progressively longer blocks on repeat
//! offenders, while you keep full control over where the attempt data
//! lives.
//!
//! With Warden you get:
//! - Sliding-window failed attempt tracking
//! - Advisory warnings with attempts remaining before a block
//! - Progressive backoff on repeat blocks, capped at a configurable ceiling
//! - A total, never-failing status API for your auth flow
//! - Security events for audit sinks and alerting
//!
//! ## Storage Support
//!
//! Warden currently supports the following storage backends:
//! - In-memory (with optional JSON snapshot persistence)
//! - SQLite
//!
//! ## Example
//!
//! ```rust,no_run
//! use warden::{Principal, Warden};
//!
//! #[tokio::main]
//! async fn main() {
//!     let warden = Warden::memory();
//!
//!     let principal = Principal::new("alice@example.com").unwrap();
//!     let status = warden
//!         .record_attempt(Some(&principal), "203.0.113.7", false)
//!         .await;
//!
//!     if status.is_blocked() {
//!         // Reject the login without touching credentials
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use warden_core::services::LoginThrottleService;

/// Re-export core types from warden_core
///
/// These types are commonly used when working with the Warden API.
pub use warden_core::{
    AttemptRecord, AttemptRepository, AttemptStats, BlockEntry, BlockStatus, Event, EventBus,
    EventHandler, MemoryAttemptRepository, Principal, ThrottlePolicy, UnblockReason,
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding
/// feature is enabled.
#[cfg(feature = "sqlite")]
pub use warden_storage_sqlite::SqliteAttemptRepository;

/// The main entry point: login attempt throttling over a storage backend.
///
/// `Warden` wraps the throttling service with a chosen repository. All
/// operations are total: storage failures are logged and absorbed, and
/// callers always receive a well-formed [`BlockStatus`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use warden::{MemoryAttemptRepository, ThrottlePolicy, Warden};
///
/// # async fn example() {
/// let repository = Arc::new(MemoryAttemptRepository::new());
/// let warden = Warden::with_policy(repository, ThrottlePolicy::default());
///
/// let status = warden.record_attempt(None, "203.0.113.7", false).await;
/// # }
/// ```
pub struct Warden<R: AttemptRepository> {
    repository: Arc<R>,
    throttle: LoginThrottleService<R>,
}

impl Warden<MemoryAttemptRepository> {
    /// Create a Warden over an in-memory repository with the default
    /// policy.
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryAttemptRepository::new()))
    }

    /// Create a Warden over an in-memory repository mirrored to a JSON
    /// snapshot file.
    ///
    /// Existing state at `path` is loaded; snapshot writes are best-effort
    /// and never affect throttling decisions.
    pub fn memory_with_snapshot(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(MemoryAttemptRepository::with_snapshot(path)))
    }
}

impl<R: AttemptRepository> Warden<R> {
    /// Create a Warden with the default policy.
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_policy(repository, ThrottlePolicy::default())
    }

    /// Create a Warden with a custom policy.
    pub fn with_policy(repository: Arc<R>, policy: ThrottlePolicy) -> Self {
        let throttle = LoginThrottleService::new(repository.clone(), policy);
        Self {
            repository,
            throttle,
        }
    }

    /// Attach an event bus, e.g. to receive audit events.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        let policy = self.throttle.policy().clone();
        self.throttle =
            LoginThrottleService::new(self.repository.clone(), policy).with_event_bus(events);
        self
    }

    /// The active throttle policy.
    pub fn policy(&self) -> &ThrottlePolicy {
        self.throttle.policy()
    }

    /// The event bus security events are emitted on.
    pub fn events(&self) -> &EventBus {
        self.throttle.events()
    }

    /// Record an authentication attempt and evaluate blocking.
    ///
    /// See [`LoginThrottleService::record_attempt`].
    pub async fn record_attempt(
        &self,
        principal: Option<&Principal>,
        address: &str,
        succeeded: bool,
    ) -> BlockStatus {
        self.throttle
            .record_attempt(principal, address, succeeded)
            .await
    }

    /// The current status of an address, removing an expired block as a
    /// side effect of the read.
    pub async fn block_status(&self, address: &str) -> BlockStatus {
        self.throttle.block_status(address).await
    }

    /// Check if an address is currently blocked.
    pub async fn is_blocked(&self, address: &str) -> bool {
        self.throttle.is_blocked(address).await
    }

    /// Explicitly clear an address: block, failure history, and escalation
    /// history. Returns `true` if the address was blocked.
    pub async fn unblock(&self, address: &str) -> bool {
        self.throttle.unblock(address).await
    }

    /// Clear the failure window for an address without touching its block
    /// or escalation history.
    pub async fn reset_attempts(&self, address: &str) {
        self.throttle.reset_attempts(address).await
    }

    /// Start the background retention sweep of old attempt records.
    pub fn start_cleanup_task(
        &self,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        self.throttle.start_cleanup_task(shutdown)
    }
}
