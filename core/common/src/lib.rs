//! Common utilities and types shared across Stowage crates.
//!
//! This crate provides the error taxonomy every storage operation reports
//! through, plus small identifier types used by drivers and callers alike.

pub mod error;
pub mod types;

pub use error::{Error, Operation, Result};
pub use types::ObjectId;
