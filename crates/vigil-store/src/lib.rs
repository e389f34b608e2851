//! Vigil Store - Store traits and in-memory backend
//!
//! The dispatch runtime consumes its shared state through two narrow traits:
//!
//! - [`HeartbeatStore`]: per-instance liveness records and aggregate metrics
//! - [`TaskStore`]: the task ownership relation and its atomic
//!   `transfer_ownership` primitive
//!
//! The concrete backend is an external collaborator. [`MemoryStore`] is the
//! in-memory implementation used in development and tests; it honors the same
//! atomicity contract with a single-lock transaction over the ownership map.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod memory;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use store::{HeartbeatStore, TaskStore};
