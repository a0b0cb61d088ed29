//! Core functionality for the warden login throttling library.
//!
//! This crate contains the domain types, repository traits, and services
//! used across the warden ecosystem: attempt records and block entries,
//! the throttle policy with progressive backoff, the storage-agnostic
//! [`AttemptRepository`] trait with a bundled in-memory implementation,
//! security events, and the [`LoginThrottleService`] that ties them
//! together.
//!
//! Application code normally depends on the `warden` facade crate rather
//! than on this crate directly; storage backends depend on this crate for
//! the repository trait and domain types.

pub mod attempt;
pub mod error;
pub mod events;
pub mod policy;
pub mod principal;
pub mod repositories;
pub mod services;

pub use attempt::{AttemptRecord, AttemptStats, BlockEntry, BlockStatus};
pub use error::Error;
pub use events::{Event, EventBus, EventHandler, UnblockReason};
pub use policy::ThrottlePolicy;
pub use principal::Principal;
pub use repositories::{AttemptRepository, MemoryAttemptRepository};
pub use services::LoginThrottleService;
