//! Business logic services for the closing stock gateway

pub mod auth;
pub mod export;
pub mod registry;
pub mod session;
pub mod stock;

pub use auth::AuthService;
pub use export::{ExportFormat, ExportService, ExportedFile};
pub use registry::{RegistryCache, RegistryService};
pub use session::SessionScope;
pub use stock::{SnapshotCache, StockRequest, StockService};
