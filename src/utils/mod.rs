//! Utilities Module
//!
//! Common utilities used across the crate.

pub mod amount;
pub mod config;
pub mod logging;

pub use amount::*;
pub use config::ClientConfig;
