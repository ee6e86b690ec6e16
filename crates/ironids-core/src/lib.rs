//! IronIDS Core
//!
//! Shared vocabulary for the IronIDS crates: error taxonomy and
//! configuration. This crate has minimal dependencies so every other
//! crate can depend on it.

pub mod config;
pub mod error;

pub use config::{CachingConfig, IdsConfig};
pub use error::{Error, Result};
