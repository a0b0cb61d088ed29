//! Service layer for throttling logic.

pub mod throttle;

pub use throttle::LoginThrottleService;
