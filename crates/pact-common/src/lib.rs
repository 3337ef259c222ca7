//! # pact-common
//!
//! Shared domain models, wire mapping, validation, error handling, and
//! configuration used across all Pact client crates. This is the foundation
//! layer — pure data and contracts, no I/O.

pub mod config;
pub mod error;
pub mod forms;
pub mod models;
pub mod wire;

pub use error::{PactError, PactResult};
