//! Attempt and block record types.
//!
//! These are the rows the throttling service operates on: an append-only
//! log of [`AttemptRecord`]s per source address, aggregated into
//! [`AttemptStats`] over a sliding window, and at most one active
//! [`BlockEntry`] per address. The outcome of every service operation is a
//! [`BlockStatus`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::Principal;

/// A single recorded authentication attempt.
///
/// Records are append-only per source address and pruned once they fall out
/// of the configured attempt window. The principal is audit metadata; it
/// does not participate in keying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// The login identity that was attempted, when known.
    pub principal: Option<Principal>,
    /// The source address the attempt originated from.
    pub address: String,
    /// Whether the attempt authenticated successfully.
    pub succeeded: bool,
    /// When the attempt occurred.
    pub attempted_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// Create a record stamped with the current time.
    pub fn new(principal: Option<Principal>, address: impl Into<String>, succeeded: bool) -> Self {
        Self {
            principal,
            address: address.into(),
            succeeded,
            attempted_at: Utc::now(),
        }
    }
}

/// Aggregate view of failed attempts for one address within a window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptStats {
    /// Number of failed attempts within the window.
    pub failed_count: u32,
    /// Timestamp of the most recent failed attempt within the window.
    pub latest_at: Option<DateTime<Utc>>,
}

/// An active block on a source address.
///
/// An address has at most one block entry at a time. Expired entries are
/// removed lazily on the next lookup; the per-address offense count kept by
/// the repository outlives them so later blocks escalate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    /// The blocked source address.
    pub address: String,
    /// When the block was imposed.
    pub created_at: DateTime<Utc>,
    /// When the block lapses.
    pub expires_at: DateTime<Utc>,
    /// Failed attempts in the window at the time the block was imposed.
    pub failed_attempts: u32,
    /// How many blocks this address had already served when this one was
    /// imposed. Determines the backoff exponent.
    pub prior_blocks: u32,
}

impl BlockEntry {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Time left until the block lapses. Never negative.
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).max(Duration::zero())
    }
}

/// Outcome of a throttling decision for one address.
///
/// Returned by every public service operation. `Warning` is advisory: the
/// attempt may proceed, and `remaining_attempts` tells the caller how many
/// failures are left before a block is imposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BlockStatus {
    /// No restriction on the address.
    Clear,
    /// The address is approaching the block threshold.
    Warning {
        failed_attempts: u32,
        remaining_attempts: u32,
    },
    /// The address is blocked until `expires_at`.
    Blocked {
        expires_at: DateTime<Utc>,
        failed_attempts: u32,
    },
}

impl BlockStatus {
    pub fn is_blocked(&self) -> bool {
        matches!(self, BlockStatus::Blocked { .. })
    }

    /// Seconds until the block lapses, if blocked. Never negative.
    pub fn retry_after_seconds(&self) -> Option<i64> {
        match self {
            BlockStatus::Blocked { expires_at, .. } => {
                Some((*expires_at - Utc::now()).num_seconds().max(0))
            }
            _ => None,
        }
    }

    /// Whole minutes until the block lapses, rounded up, if blocked.
    pub fn remaining_minutes(&self) -> Option<i64> {
        self.retry_after_seconds()
            .map(|secs| (secs as u64).div_ceil(60) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_entry_expiry() {
        let active = BlockEntry {
            address: "192.168.1.1".to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::minutes(15),
            failed_attempts: 5,
            prior_blocks: 0,
        };
        assert!(!active.is_expired());
        assert!(active.remaining() > Duration::minutes(14));

        let lapsed = BlockEntry {
            expires_at: Utc::now() - Duration::seconds(1),
            ..active
        };
        assert!(lapsed.is_expired());
        assert_eq!(lapsed.remaining(), Duration::zero());
    }

    #[test]
    fn test_block_status_accessors() {
        assert!(!BlockStatus::Clear.is_blocked());
        assert!(BlockStatus::Clear.retry_after_seconds().is_none());

        let warning = BlockStatus::Warning {
            failed_attempts: 3,
            remaining_attempts: 2,
        };
        assert!(!warning.is_blocked());
        assert!(warning.remaining_minutes().is_none());

        let blocked = BlockStatus::Blocked {
            expires_at: Utc::now() + Duration::minutes(15),
            failed_attempts: 5,
        };
        assert!(blocked.is_blocked());
        let retry_after = blocked.retry_after_seconds().unwrap();
        assert!(retry_after > 890 && retry_after <= 900);
        assert_eq!(blocked.remaining_minutes(), Some(15));
    }

    #[test]
    fn test_expired_block_status_reports_zero() {
        let blocked = BlockStatus::Blocked {
            expires_at: Utc::now() - Duration::minutes(1),
            failed_attempts: 5,
        };
        assert_eq!(blocked.retry_after_seconds(), Some(0));
        assert_eq!(blocked.remaining_minutes(), Some(0));
    }

    #[test]
    fn test_block_status_serialization() {
        let blocked = BlockStatus::Blocked {
            expires_at: Utc::now() + Duration::minutes(15),
            failed_attempts: 5,
        };
        let json = serde_json::to_string(&blocked).unwrap();
        assert!(json.contains(r#""status":"blocked""#));

        let roundtrip: BlockStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip, blocked);
    }
}
