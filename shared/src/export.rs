//! Spreadsheet export layout
//!
//! Builds the two-sheet workbook description for a filtered stock view. The
//! header row, column order and the `TOTAL` label are part of the exported
//! file's contract. Rendering to `.xlsx` bytes happens in the backend.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{PackagingSize, ProductStockRow, SizeQuantities};

pub const DATA_SHEET_NAME: &str = "Closing Stock";
pub const INFO_SHEET_NAME: &str = "Report Info";
pub const PRODUCT_NAME_HEADER: &str = "Product Name";
pub const TOTAL_ROW_LABEL: &str = "TOTAL";

const NAME_COLUMN_WIDTH: f64 = 40.0;
const SIZE_COLUMN_WIDTH: f64 = 15.0;
const INFO_COLUMN_WIDTH: f64 = 30.0;

/// Export failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    #[error("Nothing to export")]
    NothingToExport,

    #[error("Failed to build export: {0}")]
    Build(String),
}

/// A single spreadsheet cell
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Cell {
    Number(u64),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Text form, as written to CSV
    pub fn to_text(&self) -> String {
        match self {
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

/// One worksheet: a name, column widths and rows of cells
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SheetLayout {
    pub name: String,
    pub column_widths: Vec<f64>,
    pub rows: Vec<Vec<Cell>>,
}

/// The complete workbook for one export
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportWorkbook {
    pub file_name: String,
    pub data_sheet: SheetLayout,
    pub info_sheet: SheetLayout,
}

impl ExportWorkbook {
    pub fn sheets(&self) -> [&SheetLayout; 2] {
        [&self.data_sheet, &self.info_sheet]
    }
}

/// Labels describing the exported selection
#[derive(Debug, Clone, Copy)]
pub struct ExportContext<'a> {
    pub shop_label: &'a str,
    pub category_label: &'a str,
    pub date_label: &'a str,
    pub generated_at: &'a str,
}

/// `Closing_Stock_{shop}_{category}_{date}.xlsx`, with every whitespace run in
/// the shop label replaced by a single underscore
pub fn export_file_name(shop_label: &str, category_label: &str, date_label: &str) -> String {
    let mut shop = String::with_capacity(shop_label.len());
    let mut in_whitespace = false;
    for c in shop_label.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                shop.push('_');
            }
            in_whitespace = true;
        } else {
            shop.push(c);
            in_whitespace = false;
        }
    }

    format!("Closing_Stock_{}_{}_{}.xlsx", shop, category_label, date_label)
}

/// Lay out the data and metadata sheets for the filtered rows.
///
/// Size columns follow `sizes` order exactly. Fails with
/// [`ExportError::NothingToExport`] when there are no rows or no sizes.
pub fn build_export<R>(
    rows: &[R],
    sizes: &[PackagingSize],
    totals: &SizeQuantities,
    context: &ExportContext<'_>,
) -> Result<ExportWorkbook, ExportError>
where
    R: Borrow<ProductStockRow>,
{
    if rows.is_empty() || sizes.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let mut data_rows = Vec::with_capacity(rows.len() + 2);
    data_rows.push(
        std::iter::once(Cell::text(PRODUCT_NAME_HEADER))
            .chain(sizes.iter().map(|size| Cell::text(size.label.as_str())))
            .collect(),
    );
    for row in rows {
        let row = row.borrow();
        data_rows.push(
            std::iter::once(Cell::text(row.name.as_str()))
                .chain(row.quantities_in(sizes).map(Cell::Number))
                .collect(),
        );
    }
    data_rows.push(
        std::iter::once(Cell::text(TOTAL_ROW_LABEL))
            .chain(
                sizes
                    .iter()
                    .map(|size| Cell::Number(totals.get(&size.id).copied().unwrap_or(0))),
            )
            .collect(),
    );

    let data_sheet = SheetLayout {
        name: DATA_SHEET_NAME.to_string(),
        column_widths: std::iter::once(NAME_COLUMN_WIDTH)
            .chain(sizes.iter().map(|_| SIZE_COLUMN_WIDTH))
            .collect(),
        rows: data_rows,
    };

    let mut info_rows = vec![
        vec![Cell::text("Report Information")],
        vec![Cell::text("Shop:"), Cell::text(context.shop_label)],
        vec![Cell::text("Category:"), Cell::text(context.category_label)],
        vec![Cell::text("Date:"), Cell::text(context.date_label)],
        vec![Cell::text("Total Products:"), Cell::Number(rows.len() as u64)],
        vec![Cell::text("Generated On:"), Cell::text(context.generated_at)],
        vec![Cell::text("")],
        vec![Cell::text("Size Information")],
    ];
    info_rows.extend(
        sizes
            .iter()
            .map(|size| vec![Cell::text(size.label.as_str()), Cell::text(size.title.as_str())]),
    );

    let info_sheet = SheetLayout {
        name: INFO_SHEET_NAME.to_string(),
        column_widths: vec![INFO_COLUMN_WIDTH, INFO_COLUMN_WIDTH],
        rows: info_rows,
    };

    Ok(ExportWorkbook {
        file_name: export_file_name(context.shop_label, context.category_label, context.date_label),
        data_sheet,
        info_sheet,
    })
}
