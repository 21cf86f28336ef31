//! Closing stock pipeline
//!
//! Turns raw upstream rows into the normalized grid, then derives the
//! filtered set, its totals and summary, and the visible page:
//!
//! `normalize -> filter -> (aggregate_totals, summarize, paginate)`
//!
//! Totals and the summary always cover the whole filtered set so they stay
//! put while the user pages through the table.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

use crate::models::{Category, PackagingSize, ProductStockRow, RawStockRow, SizeQuantities};
use crate::types::{Pagination, PaginationMeta};

/// Quantities below this are flagged as low stock
pub const LOW_STOCK_THRESHOLD: u64 = 10;

/// Quantities below this (and not low) are flagged as medium stock
pub const MEDIUM_STOCK_THRESHOLD: u64 = 50;

// ============================================================================
// Normalization
// ============================================================================

/// Build one grid row per raw row with a quantity for every category size
pub fn normalize(raw_rows: &[RawStockRow], category: &Category) -> Vec<ProductStockRow> {
    raw_rows
        .iter()
        .map(|raw| ProductStockRow {
            product_id: raw.product_id,
            stock_id: raw.stock_id,
            name: raw.product_name.clone(),
            alias1: raw.alias1.clone(),
            alias2: raw.alias2.clone(),
            alias3: raw.alias3.clone(),
            quantities: category
                .size_ids()
                .map(|size_id| (size_id, raw.quantity_for(size_id)))
                .collect(),
        })
        .collect()
}

// ============================================================================
// Search
// ============================================================================

/// Trim and lower-case a search query
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Whether a row's name or any alias contains an already normalized needle
pub fn matches_query(row: &ProductStockRow, needle: &str) -> bool {
    row.search_fields()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Stable substring filter over name and aliases
pub fn filter<'a>(rows: &'a [ProductStockRow], query: &str) -> Vec<&'a ProductStockRow> {
    let needle = normalize_query(query);
    if needle.is_empty() {
        return rows.iter().collect();
    }

    rows.iter()
        .filter(|row| matches_query(row, &needle))
        .collect()
}

// ============================================================================
// Pagination
// ============================================================================

/// Slice out a 1-based page; out-of-range pages are empty
pub fn paginate<T>(rows: &[T], page_index: u32, page_size: u32) -> &[T] {
    let page_size = page_size.max(1) as usize;
    let start = (page_index.max(1) as usize - 1).saturating_mul(page_size);
    if start >= rows.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(rows.len());
    &rows[start..end]
}

/// Number of pages for `len` items, never less than one
pub fn total_pages(len: usize, page_size: u32) -> u32 {
    let page_size = page_size.max(1) as usize;
    u32::try_from(len.div_ceil(page_size).max(1)).unwrap_or(u32::MAX)
}

pub fn pagination_meta(len: usize, pagination: Pagination) -> PaginationMeta {
    PaginationMeta {
        page: pagination.page.max(1),
        per_page: pagination.per_page.max(1),
        total_items: len as u64,
        total_pages: total_pages(len, pagination.per_page),
    }
}

// ============================================================================
// Totals and summary
// ============================================================================

/// Sum each size column over all given rows.
///
/// Every size id gets an entry, so an empty row set yields zeros.
pub fn aggregate_totals<I, R>(rows: I, sizes: &[PackagingSize]) -> SizeQuantities
where
    I: IntoIterator<Item = R>,
    R: Borrow<ProductStockRow>,
{
    let mut totals: SizeQuantities = sizes.iter().map(|size| (size.id, 0)).collect();

    for row in rows {
        let row = row.borrow();
        for size in sizes {
            if let Some(total) = totals.get_mut(&size.id) {
                *total = total.saturating_add(row.quantity(size.id));
            }
        }
    }

    totals
}

/// Stock badge for a single product/size cell
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    Out,
    Low,
    Medium,
    Healthy,
}

impl StockLevel {
    pub fn classify(quantity: u64, low_threshold: u64) -> Self {
        if quantity == 0 {
            StockLevel::Out
        } else if quantity < low_threshold {
            StockLevel::Low
        } else if quantity < MEDIUM_STOCK_THRESHOLD.max(low_threshold) {
            StockLevel::Medium
        } else {
            StockLevel::Healthy
        }
    }

    /// Out-of-stock cells count as low too
    pub fn is_low(&self) -> bool {
        matches!(self, StockLevel::Out | StockLevel::Low)
    }
}

impl std::fmt::Display for StockLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockLevel::Out => write!(f, "Out of Stock"),
            StockLevel::Low => write!(f, "Low"),
            StockLevel::Medium => write!(f, "Medium"),
            StockLevel::Healthy => write!(f, "Healthy"),
        }
    }
}

/// A product is low on stock when any of its size columns is low
pub fn has_low_stock(row: &ProductStockRow, sizes: &[PackagingSize], low_threshold: u64) -> bool {
    row.quantities_in(sizes)
        .any(|quantity| StockLevel::classify(quantity, low_threshold).is_low())
}

/// Headline numbers for the filtered set
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockSummary {
    pub total_products: u64,
    /// Sum over every size column of every product
    pub total_stock: u64,
    pub low_stock_items: u64,
}

pub fn summarize<I, R>(rows: I, sizes: &[PackagingSize], low_threshold: u64) -> StockSummary
where
    I: IntoIterator<Item = R>,
    R: Borrow<ProductStockRow>,
{
    rows.into_iter()
        .fold(StockSummary::default(), |mut summary, row| {
            let row = row.borrow();
            summary.total_products += 1;
            summary.total_stock = row
                .quantities_in(sizes)
                .fold(summary.total_stock, u64::saturating_add);
            if has_low_stock(row, sizes, low_threshold) {
                summary.low_stock_items += 1;
            }
            summary
        })
}

// ============================================================================
// Page assembly
// ============================================================================

/// Everything the table needs for one query and page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockPage {
    pub rows: Vec<ProductStockRow>,
    pub totals: SizeQuantities,
    pub pagination: PaginationMeta,
    pub summary: StockSummary,
}

/// Run filter, totals, summary and pagination over a snapshot's rows
pub fn build_page(
    rows: &[ProductStockRow],
    sizes: &[PackagingSize],
    query: &str,
    pagination: Pagination,
    low_threshold: u64,
) -> StockPage {
    let filtered = filter(rows, query);
    let totals = aggregate_totals(filtered.iter().copied(), sizes);
    let summary = summarize(filtered.iter().copied(), sizes, low_threshold);
    let page_rows = paginate(&filtered, pagination.page, pagination.per_page)
        .iter()
        .map(|row| (*row).clone())
        .collect();

    StockPage {
        rows: page_rows,
        totals,
        pagination: pagination_meta(filtered.len(), pagination),
        summary,
    }
}
