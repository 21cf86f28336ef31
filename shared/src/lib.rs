//! Shared types and logic for the Liquor Inventory Dashboard
//!
//! This crate contains the domain models and the closing-stock pipeline shared
//! between the backend gateway and the browser dashboard (via WASM).

pub mod dashboard;
pub mod export;
pub mod models;
pub mod pipeline;
pub mod types;
pub mod validation;

pub use dashboard::*;
pub use export::*;
pub use models::*;
pub use pipeline::*;
pub use types::*;
pub use validation::*;
