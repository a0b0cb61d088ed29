//! Repository traits for the data access layer.
//!
//! The service talks to storage exclusively through [`AttemptRepository`],
//! so the throttling logic is storage-agnostic: the bundled
//! [`MemoryAttemptRepository`] covers single-process use, and external
//! backends implement the same trait for durable, shared state.

pub mod attempts;
pub mod memory;

pub use attempts::AttemptRepository;
pub use memory::MemoryAttemptRepository;
