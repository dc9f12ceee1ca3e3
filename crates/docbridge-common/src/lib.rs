//! Common utilities for docbridge
//!
//! This crate provides the shared error type and the lazy single-value
//! initializer used by the database clients.

pub mod error;
pub mod hub;

pub use error::{BridgeError, Result};
pub use hub::{FailurePolicy, Hub};
