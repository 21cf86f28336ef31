//! Export service
//!
//! Renders the filtered stock view to downloadable `.xlsx` or `.csv` bytes.

use std::str::FromStr;

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use shared::{
    aggregate_totals, build_export, Cell, ExportContext, ExportError, ExportWorkbook,
    PackagingSize, ProductStockRow, SheetLayout, TOTAL_ROW_LABEL,
};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Output format for an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xlsx" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("Unsupported export format: {}", other)),
        }
    }
}

/// A rendered export ready to be sent as an attachment
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Export service
pub struct ExportService;

impl ExportService {
    /// Lay out and render the filtered rows.
    ///
    /// Totals are recomputed over `rows` so the TOTAL row matches exactly what
    /// was exported.
    pub fn export_rows(
        rows: &[&ProductStockRow],
        sizes: &[PackagingSize],
        context: &ExportContext<'_>,
        format: ExportFormat,
    ) -> Result<ExportedFile, ExportError> {
        let totals = aggregate_totals(rows.iter().copied(), sizes);
        let workbook = build_export(rows, sizes, &totals, context)?;

        let exported = match format {
            ExportFormat::Xlsx => ExportedFile {
                bytes: Self::render_xlsx(&workbook)?,
                file_name: workbook.file_name,
                content_type: XLSX_CONTENT_TYPE,
            },
            ExportFormat::Csv => ExportedFile {
                bytes: Self::render_csv(&workbook.data_sheet)?,
                file_name: csv_file_name(&workbook.file_name),
                content_type: CSV_CONTENT_TYPE,
            },
        };

        tracing::info!(
            file_name = %exported.file_name,
            rows = rows.len(),
            bytes = exported.bytes.len(),
            "Export rendered"
        );
        Ok(exported)
    }

    /// Render both sheets into an in-memory `.xlsx` file
    pub fn render_xlsx(workbook: &ExportWorkbook) -> Result<Vec<u8>, ExportError> {
        let mut book = Workbook::new();
        let bold = Format::new().set_bold();

        for layout in workbook.sheets() {
            let sheet = write_sheet(layout, &bold).map_err(|e| {
                tracing::error!("Failed to write sheet {}: {}", layout.name, e);
                ExportError::Build(e.to_string())
            })?;
            book.push_worksheet(sheet);
        }

        book.save_to_buffer().map_err(|e| {
            tracing::error!("Failed to save workbook: {}", e);
            ExportError::Build(e.to_string())
        })
    }

    /// Render one sheet as CSV
    pub fn render_csv(layout: &SheetLayout) -> Result<Vec<u8>, ExportError> {
        let mut wtr = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(vec![]);
        for row in &layout.rows {
            wtr.write_record(row.iter().map(Cell::to_text))
                .map_err(|e| ExportError::Build(format!("CSV serialization error: {}", e)))?;
        }
        wtr.into_inner()
            .map_err(|e| ExportError::Build(format!("CSV writer error: {}", e)))
    }
}

fn write_sheet(
    layout: &SheetLayout,
    bold: &Format,
) -> Result<Worksheet, rust_xlsxwriter::XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(&layout.name)?;

    for (col, width) in layout.column_widths.iter().enumerate() {
        sheet.set_column_width(col as u16, *width)?;
    }

    for (r, row) in layout.rows.iter().enumerate() {
        let emphasised = is_heading_row(r, row);
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = (r as u32, c as u16);
            match (cell, emphasised) {
                (Cell::Number(n), false) => sheet.write_number(r, c, *n as f64)?,
                (Cell::Number(n), true) => sheet.write_number_with_format(r, c, *n as f64, bold)?,
                (Cell::Text(s), _) if s.is_empty() => continue,
                (Cell::Text(s), false) => sheet.write_string(r, c, s)?,
                (Cell::Text(s), true) => sheet.write_string_with_format(r, c, s, bold)?,
            };
        }
    }

    Ok(sheet)
}

/// Header rows, the TOTAL row and single-cell section titles are bold
fn is_heading_row(index: usize, row: &[Cell]) -> bool {
    match row {
        [Cell::Text(first), ..] if first == TOTAL_ROW_LABEL => true,
        [Cell::Text(title)] => !title.is_empty(),
        _ => index == 0,
    }
}

fn csv_file_name(xlsx_name: &str) -> String {
    match xlsx_name.strip_suffix(".xlsx") {
        Some(stem) => format!("{}.csv", stem),
        None => format!("{}.csv", xlsx_name),
    }
}
