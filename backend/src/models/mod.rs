//! Domain models for the closing stock gateway
//!
//! Re-exports models from the shared crate

pub use shared::models::*;
