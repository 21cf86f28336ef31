//! Common types used across the dashboard

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{PackagingSize, SizeQuantities};
use crate::pipeline::StockSummary;

/// Page sizes offered by the dashboard table
pub const PAGE_SIZE_OPTIONS: [u32; 4] = [10, 25, 50, 100];

/// Pagination parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page index
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 25,
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

/// Which data source a banner refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Shops,
    Categories,
    Stock,
    Export,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Shops => write!(f, "shops"),
            DataSource::Categories => write!(f, "categories"),
            DataSource::Stock => write!(f, "stock"),
            DataSource::Export => write!(f, "export"),
        }
    }
}

/// A non-fatal problem surfaced next to the data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Banner {
    pub source: DataSource,
    pub message: String,
}

impl Banner {
    pub fn new(source: DataSource, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
        }
    }
}

/// The rendered stock table for one selection, query and page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockView {
    pub shop_label: String,
    pub category_label: String,
    pub date: NaiveDate,
    pub query: String,
    /// Column order for `rows` and `totals`
    pub sizes: Vec<PackagingSize>,
    pub rows: Vec<crate::models::ProductStockRow>,
    /// Totals over the whole filtered set, not just this page
    pub totals: SizeQuantities,
    pub pagination: PaginationMeta,
    pub summary: StockSummary,
    pub banners: Vec<Banner>,
    /// True when a refresh failed and an older snapshot is being shown
    pub stale: bool,
}
