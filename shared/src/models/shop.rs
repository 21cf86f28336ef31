//! Shop registry models

use serde::{Deserialize, Serialize};

/// Display label for the aggregate "all shops" view
pub const ALL_SHOPS_LABEL: &str = "ALL SHOPS";

/// Display label for a shop id missing from the registry
pub const UNKNOWN_SHOP_LABEL: &str = "Unknown Shop";

/// Wire id the upstream API uses for the "all shops" entry
pub const DEFAULT_ALL_SHOPS_ID: i64 = 6;

/// A retail shop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Shop {
    pub id: i64,
    pub name: String,
    /// Excise license number
    pub license_code: String,
    pub address: String,
    pub contact_no: Option<String>,
}

/// Which shop a stock view is scoped to.
///
/// The upstream API overloads a real shop id as the "all shops" marker. Inside
/// the workspace that id is lifted into [`ShopSelection::All`] and only turned
/// back into a number at the wire boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "shop_id", rename_all = "snake_case")]
pub enum ShopSelection {
    All,
    Specific(i64),
}

impl ShopSelection {
    pub fn from_wire_id(id: i64, all_shops_id: i64) -> Self {
        if id == all_shops_id {
            ShopSelection::All
        } else {
            ShopSelection::Specific(id)
        }
    }

    pub fn wire_id(&self, all_shops_id: i64) -> i64 {
        match self {
            ShopSelection::All => all_shops_id,
            ShopSelection::Specific(id) => *id,
        }
    }

    /// Resolve the label shown in headers, footers and exports
    pub fn label(&self, shops: &[Shop]) -> String {
        match self {
            ShopSelection::All => ALL_SHOPS_LABEL.to_string(),
            ShopSelection::Specific(id) => shops
                .iter()
                .find(|shop| shop.id == *id)
                .map(|shop| shop.name.clone())
                .unwrap_or_else(|| UNKNOWN_SHOP_LABEL.to_string()),
        }
    }
}

impl std::fmt::Display for ShopSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShopSelection::All => write!(f, "all"),
            ShopSelection::Specific(id) => write!(f, "{}", id),
        }
    }
}
