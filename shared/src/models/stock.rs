//! Closing stock models

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Category, PackagingSize, ShopSelection};

/// Quantities keyed by packaging size id
pub type SizeQuantities = BTreeMap<i64, u64>;

/// A closing stock row as returned by the upstream API.
///
/// Size quantities arrive as loose fields keyed by the packaging size id,
/// e.g. `{"product_name": "...", "22": 5, "23": "3"}`. Sizes with no reported
/// stock may be missing entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawStockRow {
    #[serde(default)]
    pub stock_id: Option<i64>,
    #[serde(default)]
    pub product_id: i64,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub alias1: Option<String>,
    #[serde(default)]
    pub alias2: Option<String>,
    #[serde(default)]
    pub alias3: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl RawStockRow {
    /// Quantity reported for a packaging size, coerced to a non-negative integer
    pub fn quantity_for(&self, size_id: i64) -> u64 {
        coerce_quantity(self.fields.get(&size_id.to_string()))
    }
}

/// Coerce a loosely typed upstream value into a stock quantity.
///
/// Absent, null, negative and non-numeric values count as zero. Fractions are
/// truncated.
pub fn coerce_quantity(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                v
            } else {
                n.as_f64().map(float_quantity).unwrap_or(0)
            }
        }
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(float_quantity))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

fn float_quantity(v: f64) -> u64 {
    if v.is_finite() && v > 0.0 {
        v.trunc() as u64
    } else {
        0
    }
}

/// One product in the normalized stock grid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductStockRow {
    pub product_id: i64,
    pub stock_id: Option<i64>,
    pub name: String,
    pub alias1: Option<String>,
    pub alias2: Option<String>,
    pub alias3: Option<String>,
    /// One entry per packaging size of the active category
    pub quantities: SizeQuantities,
}

impl ProductStockRow {
    pub fn quantity(&self, size_id: i64) -> u64 {
        self.quantities.get(&size_id).copied().unwrap_or(0)
    }

    /// Quantities in the given size order
    pub fn quantities_in<'a>(
        &'a self,
        sizes: &'a [PackagingSize],
    ) -> impl Iterator<Item = u64> + 'a {
        sizes.iter().map(move |size| self.quantity(size.id))
    }

    /// Name followed by the aliases that are present
    pub fn search_fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(
            [&self.alias1, &self.alias2, &self.alias3]
                .into_iter()
                .filter_map(|alias| alias.as_deref()),
        )
    }
}

/// Identity of a stock snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StockKey {
    pub shop: ShopSelection,
    pub category_id: String,
    pub date: NaiveDate,
}

impl std::fmt::Display for StockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shop={} category={} date={}", self.shop, self.category_id, self.date)
    }
}

/// The immutable normalized grid for one (shop, category, date)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockSnapshot {
    pub key: StockKey,
    pub sizes: Vec<PackagingSize>,
    pub rows: Vec<ProductStockRow>,
    pub fetched_at: DateTime<Utc>,
}

impl StockSnapshot {
    /// Normalize raw upstream rows against the category's packaging sizes
    pub fn build(
        key: StockKey,
        category: &Category,
        raw_rows: &[RawStockRow],
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            sizes: category.sizes.clone(),
            rows: crate::pipeline::normalize(raw_rows, category),
            fetched_at,
        }
    }

    pub fn empty(key: StockKey, fetched_at: DateTime<Utc>) -> Self {
        Self {
            key,
            sizes: Vec::new(),
            rows: Vec::new(),
            fetched_at,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
