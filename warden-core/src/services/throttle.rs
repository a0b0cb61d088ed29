//! Login throttling service with progressive lockout.
//!
//! This module decides, for a principal and source address, whether
//! authentication should proceed, and escalates block duration for repeat
//! offenders.
//!
//! # Features
//!
//! - Per-address failed attempt tracking over a sliding window
//! - Advisory warnings before the block threshold is reached
//! - Progressive backoff: each served block doubles the next one, up to a cap
//! - Lazy removal of expired blocks on lookup
//! - Security events for audit sinks and alerting
//! - Background retention sweep of old attempt records
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_core::services::LoginThrottleService;
//! use warden_core::{MemoryAttemptRepository, ThrottlePolicy};
//!
//! let service = LoginThrottleService::new(
//!     Arc::new(MemoryAttemptRepository::new()),
//!     ThrottlePolicy::default(),
//! );
//!
//! // Check before authenticating
//! if service.is_blocked("203.0.113.7").await {
//!     // Reject without touching credentials
//! }
//!
//! // Record the outcome afterwards
//! let status = service.record_attempt(Some(&principal), "203.0.113.7", false).await;
//! ```

use std::sync::Arc;

use chrono::Utc;

use crate::{
    Error, Principal,
    attempt::{AttemptRecord, AttemptStats, BlockEntry, BlockStatus},
    events::{Event, EventBus, UnblockReason},
    policy::ThrottlePolicy,
    repositories::AttemptRepository,
};

/// Service for login attempt throttling.
///
/// Coordinates between the repository layer and the caller's
/// authentication flow. All public operations are total: storage and
/// event-handler failures are logged and absorbed, and the caller always
/// receives a well-formed [`BlockStatus`]. An address the store knows
/// nothing about is simply clear.
///
/// # Thread Safety
///
/// The service can be shared across tasks. Within one process the bundled
/// in-memory repository serializes access per address key. The
/// record-evaluate-store sequence is not transactional across repository
/// calls, so multi-process deployments that need strict per-address
/// serialization must provide their own mutual exclusion or a storage
/// backend that does.
pub struct LoginThrottleService<R: AttemptRepository> {
    repository: Arc<R>,
    policy: ThrottlePolicy,
    events: EventBus,
}

impl<R: AttemptRepository> LoginThrottleService<R> {
    /// Create a new LoginThrottleService.
    ///
    /// # Arguments
    ///
    /// * `repository` - The repository implementation storing attempt data
    /// * `policy` - Thresholds, windows, and backoff configuration
    pub fn new(repository: Arc<R>, policy: ThrottlePolicy) -> Self {
        Self {
            repository,
            policy,
            events: EventBus::default(),
        }
    }

    /// Replace the event bus, e.g. to attach audit handlers.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// The active policy.
    pub fn policy(&self) -> &ThrottlePolicy {
        &self.policy
    }

    /// The event bus events are emitted on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Check if throttling is enforced.
    pub fn is_enabled(&self) -> bool {
        self.policy.enabled
    }

    /// Record an authentication attempt and evaluate blocking.
    ///
    /// Appends the attempt, prunes records that fell out of the sliding
    /// window, and returns the address's resulting status. Blocks are only
    /// imposed by failed attempts; a successful login never creates one.
    ///
    /// An attempt with an empty source address is discarded and reported
    /// clear. If throttling is disabled, nothing is recorded.
    pub async fn record_attempt(
        &self,
        principal: Option<&Principal>,
        address: &str,
        succeeded: bool,
    ) -> BlockStatus {
        if !self.policy.enabled {
            return BlockStatus::Clear;
        }

        if address.trim().is_empty() {
            tracing::debug!("Discarding attempt without a source address");
            return BlockStatus::Clear;
        }

        match self.try_record_attempt(principal, address, succeeded).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, address, "Attempt store unavailable, reporting clear");
                BlockStatus::Clear
            }
        }
    }

    /// The current status of an address.
    ///
    /// An expired block entry is deleted as a side effect of the read, and
    /// the address reports clear (or a warning, if recent failures remain
    /// in the window).
    pub async fn block_status(&self, address: &str) -> BlockStatus {
        if !self.policy.enabled || address.trim().is_empty() {
            return BlockStatus::Clear;
        }

        match self.try_block_status(address).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, address, "Attempt store unavailable, reporting clear");
                BlockStatus::Clear
            }
        }
    }

    /// Check if an address is currently blocked (convenience method).
    pub async fn is_blocked(&self, address: &str) -> bool {
        self.block_status(address).await.is_blocked()
    }

    /// Explicitly clear an address: remove its block, failure history, and
    /// offense count.
    ///
    /// Unlike natural expiry, an explicit unblock forgives the escalation
    /// history, so the next block starts back at the base duration.
    ///
    /// # Returns
    ///
    /// `true` if the address was blocked at the time of the call.
    pub async fn unblock(&self, address: &str) -> bool {
        match self.try_unblock(address).await {
            Ok(was_blocked) => was_blocked,
            Err(e) => {
                tracing::warn!(error = %e, address, "Failed to unblock address");
                false
            }
        }
    }

    /// Clear the failure window for an address without touching its block
    /// or offense history.
    pub async fn reset_attempts(&self, address: &str) {
        if let Err(e) = self.repository.clear_attempts(address).await {
            tracing::warn!(error = %e, address, "Failed to reset attempts");
        }
    }

    /// Start the background retention sweep.
    ///
    /// Spawns a task that periodically deletes attempt records older than
    /// the policy's retention period. The sweep never touches block entries
    /// or offense counts, so it cannot unblock an address.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - A watch receiver that signals when to stop the task
    ///
    /// # Returns
    ///
    /// A `JoinHandle` for the spawned task.
    pub fn start_cleanup_task(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let repository = Arc::clone(&self.repository);
        let retention = self.policy.retention_period;

        // Sweep runs hourly
        const CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(CLEANUP_INTERVAL);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let before = Utc::now() - retention;
                        match repository.cleanup_old_attempts(before).await {
                            Ok(count) if count > 0 => {
                                tracing::info!(count = count, "Cleaned up old attempt records");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to clean up attempt records");
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down attempt cleanup task");
                        break;
                    }
                }
            }
        })
    }

    async fn try_record_attempt(
        &self,
        principal: Option<&Principal>,
        address: &str,
        succeeded: bool,
    ) -> Result<BlockStatus, Error> {
        let now = Utc::now();
        let record = AttemptRecord {
            principal: principal.cloned(),
            address: address.to_string(),
            succeeded,
            attempted_at: now,
        };

        self.repository.record_attempt(&record).await?;
        self.repository
            .prune_attempts(address, now - self.policy.attempt_window)
            .await?;

        if succeeded && self.policy.clear_on_success {
            self.repository.clear_attempts(address).await?;
        }

        let stats = self
            .repository
            .attempt_stats(address, now - self.policy.attempt_window)
            .await?;

        if !succeeded {
            self.emit(Event::LoginFailed {
                principal: principal.cloned(),
                address: address.to_string(),
                failed_attempts: stats.failed_count,
                timestamp: now,
            })
            .await;
        }

        if let Some(entry) = self.active_block(address).await? {
            return Ok(BlockStatus::Blocked {
                expires_at: entry.expires_at,
                failed_attempts: entry.failed_attempts,
            });
        }

        if !succeeded && stats.failed_count >= self.policy.max_attempts {
            return self.impose_block(address, &stats).await;
        }

        Ok(self.advisory_status(&stats))
    }

    async fn try_block_status(&self, address: &str) -> Result<BlockStatus, Error> {
        if let Some(entry) = self.active_block(address).await? {
            return Ok(BlockStatus::Blocked {
                expires_at: entry.expires_at,
                failed_attempts: entry.failed_attempts,
            });
        }

        let stats = self
            .repository
            .attempt_stats(address, Utc::now() - self.policy.attempt_window)
            .await?;

        Ok(self.advisory_status(&stats))
    }

    async fn try_unblock(&self, address: &str) -> Result<bool, Error> {
        let was_blocked = self.active_block(address).await?.is_some();

        self.repository.delete_block(address).await?;
        self.repository.clear_attempts(address).await?;
        self.repository.set_offense_count(address, 0).await?;

        if was_blocked {
            self.emit(Event::AddressUnblocked {
                address: address.to_string(),
                reason: UnblockReason::AdminAction,
                timestamp: Utc::now(),
            })
            .await;
        }

        Ok(was_blocked)
    }

    /// The unexpired block entry for an address, removing an expired one
    /// as a side effect of the read.
    async fn active_block(&self, address: &str) -> Result<Option<BlockEntry>, Error> {
        let Some(entry) = self.repository.get_block(address).await? else {
            return Ok(None);
        };

        if entry.is_expired() {
            self.repository.delete_block(address).await?;
            self.emit(Event::AddressUnblocked {
                address: address.to_string(),
                reason: UnblockReason::Expired,
                timestamp: Utc::now(),
            })
            .await;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn impose_block(
        &self,
        address: &str,
        stats: &AttemptStats,
    ) -> Result<BlockStatus, Error> {
        let now = Utc::now();
        let prior_blocks = self.repository.offense_count(address).await?;
        let duration = self.policy.block_duration(prior_blocks);

        let entry = BlockEntry {
            address: address.to_string(),
            created_at: now,
            expires_at: now + duration,
            failed_attempts: stats.failed_count,
            prior_blocks,
        };

        self.repository.put_block(&entry).await?;
        self.repository
            .set_offense_count(address, prior_blocks + 1)
            .await?;

        tracing::info!(
            address,
            failed_attempts = entry.failed_attempts,
            blocked_minutes = duration.num_minutes(),
            prior_blocks,
            "Blocked source address"
        );

        self.emit(Event::AddressBlocked {
            address: entry.address.clone(),
            failed_attempts: entry.failed_attempts,
            blocked_until: entry.expires_at,
            prior_blocks,
            timestamp: now,
        })
        .await;

        Ok(BlockStatus::Blocked {
            expires_at: entry.expires_at,
            failed_attempts: entry.failed_attempts,
        })
    }

    fn advisory_status(&self, stats: &AttemptStats) -> BlockStatus {
        if stats.failed_count >= self.policy.warning_threshold {
            BlockStatus::Warning {
                failed_attempts: stats.failed_count,
                remaining_attempts: self.policy.max_attempts.saturating_sub(stats.failed_count),
            }
        } else {
            BlockStatus::Clear
        }
    }

    async fn emit(&self, event: Event) {
        if let Err(e) = self.events.emit(&event).await {
            tracing::warn!(error = %e, "Event handler failed");
        }
    }
}
