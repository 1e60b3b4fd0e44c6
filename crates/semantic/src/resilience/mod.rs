//! Retry and circuit breaking for remote capabilities.
//!
//! Both wrap the HTTP clients in [`crate::api`] and [`crate::completion`];
//! a capability that keeps failing is short-circuited so the matcher falls
//! through to the next layer quickly.

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::{execute_with_retry_async, RetryConfig};
