//! External API integrations

pub mod stock_api;

pub use stock_api::StockApiClient;
