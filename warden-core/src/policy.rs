//! Throttling policy configuration.

use chrono::Duration;

/// Configuration for login attempt throttling and progressive lockout.
///
/// The defaults implement the common ladder: warn from the third failed
/// attempt within a 30 minute window, block on the fifth, and double the
/// block duration for every prior block the address has served, capped at
/// two hours.
///
/// # Example
///
/// ```rust
/// use warden_core::ThrottlePolicy;
/// use chrono::Duration;
///
/// let policy = ThrottlePolicy {
///     max_attempts: 3,
///     base_block: Duration::minutes(5),
///     ..ThrottlePolicy::default()
/// };
/// assert_eq!(policy.block_duration(1), Duration::minutes(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottlePolicy {
    /// Whether throttling is enforced at all. When disabled, nothing is
    /// recorded and every status is clear.
    pub enabled: bool,
    /// Failed attempts within the window that trigger a block.
    pub max_attempts: u32,
    /// Failed attempts within the window that trigger a warning.
    pub warning_threshold: u32,
    /// Sliding window over which failed attempts are counted.
    pub attempt_window: Duration,
    /// Duration of the first block.
    pub base_block: Duration,
    /// Multiplier applied to the block duration per prior block served.
    pub backoff_factor: u32,
    /// Ceiling on the block duration.
    pub max_block: Duration,
    /// How long attempt records are retained for audit before the cleanup
    /// task removes them.
    pub retention_period: Duration,
    /// Clear an address's failure history when an attempt succeeds.
    ///
    /// Off by default: a successful login leaves the warning counter in
    /// place. Enable to forgive the failure window on success.
    pub clear_on_success: bool,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            warning_threshold: 3,
            attempt_window: Duration::minutes(30),
            base_block: Duration::minutes(15),
            backoff_factor: 2,
            max_block: Duration::minutes(120),
            retention_period: Duration::days(7),
            clear_on_success: false,
        }
    }
}

impl ThrottlePolicy {
    /// A policy that never warns, blocks, or records.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Block duration for an address that has already served
    /// `prior_blocks` blocks: `base_block * backoff_factor^prior_blocks`,
    /// capped at `max_block`.
    pub fn block_duration(&self, prior_blocks: u32) -> Duration {
        let factor = self.backoff_factor.saturating_pow(prior_blocks);
        let scaled = i32::try_from(factor)
            .ok()
            .and_then(|factor| self.base_block.checked_mul(factor))
            .unwrap_or(self.max_block);

        scaled.min(self.max_block)
    }
}
