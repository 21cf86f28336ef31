//! Domain models for the Liquor Inventory Dashboard

mod category;
mod shop;
mod stock;
mod user;

pub use category::*;
pub use shop::*;
pub use stock::*;
pub use user::*;
