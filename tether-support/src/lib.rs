//! # Tether Support
//!
//! Shared helpers for the Tether container crates:
//! - Resolution path rendering and type-name shortening
//! - "Did you mean" suggestions for unregistered keys
//! - Number formatting for diagnostics reports

pub mod rendering;
