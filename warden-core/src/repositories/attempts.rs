//! Repository trait for attempt tracking and block state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    attempt::{AttemptRecord, AttemptStats, BlockEntry},
};

/// Storage operations for login attempt throttling.
///
/// All state is keyed by source address. Implementations keep an
/// append-only log of attempts, at most one block entry per address, and a
/// per-address offense count that must survive deletion of expired block
/// entries so that later blocks escalate.
///
/// # Security Considerations
///
/// - Attempts should be recorded for every address, whether or not the
///   principal exists, to avoid leaking which accounts are real.
/// - Principals stored for auditing may be subject to data retention
///   regulations; `cleanup_old_attempts` bounds how long they are kept.
#[async_trait]
pub trait AttemptRepository: Send + Sync + 'static {
    /// Append an attempt to the log.
    ///
    /// This method does not evaluate blocking; that is the service's job.
    async fn record_attempt(&self, record: &AttemptRecord) -> Result<(), Error>;

    /// Failed-attempt statistics for an address since a cutoff.
    ///
    /// Successful attempts never count toward the statistics. Unknown
    /// addresses yield empty stats, not an error.
    async fn attempt_stats(
        &self,
        address: &str,
        since: DateTime<Utc>,
    ) -> Result<AttemptStats, Error>;

    /// Delete attempts for one address older than the given cutoff.
    ///
    /// Called by the service after each recorded attempt to enforce the
    /// sliding window.
    ///
    /// # Returns
    ///
    /// The number of records deleted.
    async fn prune_attempts(&self, address: &str, before: DateTime<Utc>) -> Result<u64, Error>;

    /// Delete all attempts for one address.
    ///
    /// # Returns
    ///
    /// The number of records deleted.
    async fn clear_attempts(&self, address: &str) -> Result<u64, Error>;

    /// The block entry for an address, if one is stored.
    ///
    /// Returns the entry even if it has expired; the service removes
    /// expired entries as a side effect of its lookups.
    async fn get_block(&self, address: &str) -> Result<Option<BlockEntry>, Error>;

    /// Store a block entry, replacing any existing entry for the address.
    async fn put_block(&self, entry: &BlockEntry) -> Result<(), Error>;

    /// Delete the block entry for an address.
    ///
    /// # Returns
    ///
    /// `true` if an entry existed.
    async fn delete_block(&self, address: &str) -> Result<bool, Error>;

    /// Number of blocks this address has served.
    ///
    /// Unknown addresses have served zero blocks.
    async fn offense_count(&self, address: &str) -> Result<u32, Error>;

    /// Set the number of blocks this address has served.
    ///
    /// The service increments the count when it imposes a block and resets
    /// it to zero on explicit unblock.
    async fn set_offense_count(&self, address: &str, count: u32) -> Result<(), Error>;

    /// Delete attempts older than the given cutoff across all addresses.
    ///
    /// Used by the periodic retention sweep. Block entries and offense
    /// counts are not touched, so the sweep can never unblock an address.
    ///
    /// # Returns
    ///
    /// The number of records deleted.
    async fn cleanup_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error>;
}
