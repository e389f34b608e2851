//! Vigil Guard - Per-invocation resilience for dispatched work
//!
//! Every unit of work dispatched through the runtime is wrapped by a guard
//! that bounds latency, limits call rate, and trips a circuit breaker to stop
//! cascading failures when a downstream dependency degrades.
//!
//! ## Composition Order
//!
//! Rate limiting runs first, then the circuit breaker decides admission, then
//! the wrapped logic is raced against the call timeout:
//!
//! - A rate-limit rejection is terminal and never counts as a breaker failure
//! - An open breaker short-circuits to the configured fallback (or a
//!   [`GuardError::CircuitOpen`]) without running the logic or spending its
//!   timeout budget
//! - A timeout abandons the call from the caller's perspective and counts as
//!   a breaker failure; the abandoned future's eventual result is discarded
//!
//! ## Key Components
//!
//! - [`OperationGuard`]: the wrapper applied around one invocation
//! - [`GuardRegistry`]: one guard per operation identity, created lazily
//! - [`CircuitBreaker`]: Closed/Open/HalfOpen state machine with a single
//!   in-flight recovery probe
//! - [`FixedWindowLimiter`]: fixed window call counter
//!
//! ## Example
//!
//! ```rust,no_run
//! use vigil_guard::{GuardConfig, GuardRegistry};
//! use vigil_types::OperationId;
//!
//! # async fn example() {
//! let registry = GuardRegistry::new(GuardConfig::default());
//! let guard = registry.guard(&OperationId::new("fleet.health"));
//!
//! let result: Result<u32, _> = guard
//!     .execute(async { Ok::<_, std::io::Error>(1) }, None)
//!     .await;
//! # let _ = result;
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod breaker;
pub mod config;
pub mod error;
pub mod guard;
pub mod rate_limit;

// Re-export main types
pub use breaker::{Admission, CircuitBreaker, CircuitState, ProbePermit};
pub use config::GuardConfig;
pub use error::GuardError;
pub use guard::{GuardRegistry, OperationGuard};
pub use rate_limit::FixedWindowLimiter;
