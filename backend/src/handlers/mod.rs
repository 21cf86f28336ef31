//! HTTP request handlers

pub mod auth;
pub mod health;
pub mod registry;
pub mod stock;

pub use auth::{login, me};
pub use health::health_check;
pub use registry::{list_categories, list_shops};
pub use stock::{export_stock, get_stock_view};
