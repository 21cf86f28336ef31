//! WebAssembly module for the Liquor Inventory dashboard
//!
//! Provides client-side computation for:
//! - Normalizing closing stock rows into the per-size grid
//! - Search, pagination and column totals
//! - Export workbook layout
//! - Dashboard view state with stale-response protection

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use shared::{
    aggregate_totals, build_export, filter, find_category, normalize, paginate,
    parse_stock_date, total_pages, validate_login_pin, validate_mobile_no, Category,
    DashboardState, DataSource, ExportContext, ExportError, FetchTicket, PackagingSize,
    ProductStockRow, RawStockRow, Shop, ShopSelection, StockSnapshot, DATE_FORMAT,
    DEFAULT_ALL_SHOPS_ID,
};

/// Message shown when an export has nothing to write
const NOTHING_TO_EXPORT: &str = "No data to export!";

fn from_json<T: DeserializeOwned>(json: &str, what: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("Invalid {} JSON: {}", what, e)))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&format!("Serialization failed: {}", e)))
}

fn parse_date(date: &str) -> Result<NaiveDate, JsValue> {
    parse_stock_date(date).map_err(JsValue::from_str)
}

#[cfg(target_arch = "wasm32")]
fn log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

#[cfg(not(target_arch = "wasm32"))]
fn log(_message: &str) {}

#[cfg(target_arch = "wasm32")]
fn now_utc() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(js_sys::Date::now() as i64).unwrap_or_default()
}

#[cfg(not(target_arch = "wasm32"))]
fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Normalize raw closing stock rows against a category's packaging sizes
#[wasm_bindgen]
pub fn normalize_stock(raw_rows_json: &str, category_json: &str) -> Result<String, JsValue> {
    let raw_rows: Vec<RawStockRow> = from_json(raw_rows_json, "stock rows")?;
    let category: Category = from_json(category_json, "category")?;
    to_json(&normalize(&raw_rows, &category))
}

/// Rows whose name or alias contains the query, in their original order
#[wasm_bindgen]
pub fn filter_stock(rows_json: &str, query: &str) -> Result<String, JsValue> {
    let rows: Vec<ProductStockRow> = from_json(rows_json, "rows")?;
    to_json(&filter(&rows, query))
}

/// One 1-based page of rows; pages past the end are empty
#[wasm_bindgen]
pub fn page_of_stock(rows_json: &str, page: u32, page_size: u32) -> Result<String, JsValue> {
    let rows: Vec<ProductStockRow> = from_json(rows_json, "rows")?;
    to_json(&paginate(&rows, page, page_size))
}

#[wasm_bindgen]
pub fn page_count(len: u32, page_size: u32) -> u32 {
    total_pages(len as usize, page_size)
}

/// Column totals keyed by packaging size id
#[wasm_bindgen]
pub fn stock_totals(rows_json: &str, sizes_json: &str) -> Result<String, JsValue> {
    let rows: Vec<ProductStockRow> = from_json(rows_json, "rows")?;
    let sizes: Vec<PackagingSize> = from_json(sizes_json, "sizes")?;
    to_json(&aggregate_totals(&rows, &sizes))
}

/// Lay out the export workbook for already filtered rows
#[wasm_bindgen]
pub fn export_layout(
    rows_json: &str,
    sizes_json: &str,
    shop_label: &str,
    category_label: &str,
    date_label: &str,
    generated_at: &str,
) -> Result<String, JsValue> {
    let rows: Vec<ProductStockRow> = from_json(rows_json, "rows")?;
    let sizes: Vec<PackagingSize> = from_json(sizes_json, "sizes")?;
    let totals = aggregate_totals(&rows, &sizes);
    let context = ExportContext {
        shop_label,
        category_label,
        date_label,
        generated_at,
    };

    let workbook = build_export(&rows, &sizes, &totals, &context).map_err(export_error)?;
    to_json(&workbook)
}

fn export_error(err: ExportError) -> JsValue {
    match err {
        ExportError::NothingToExport => JsValue::from_str(NOTHING_TO_EXPORT),
        ExportError::Build(msg) => JsValue::from_str(&format!("Failed to export data: {}", msg)),
    }
}

/// Validate login input; returns an empty string when valid
#[wasm_bindgen]
pub fn validate_login(mobile_no: &str, login_pin: &str) -> String {
    validate_mobile_no(mobile_no)
        .and_then(|_| validate_login_pin(login_pin))
        .err()
        .unwrap_or_default()
        .to_string()
}

/// A started stock fetch; pass it back when the response arrives
#[wasm_bindgen]
pub struct FetchHandle {
    ticket: FetchTicket,
    all_shops_id: i64,
}

#[wasm_bindgen]
impl FetchHandle {
    /// Shop id to send upstream
    #[wasm_bindgen(getter)]
    pub fn shop_id(&self) -> f64 {
        self.ticket.key.shop.wire_id(self.all_shops_id) as f64
    }

    #[wasm_bindgen(getter)]
    pub fn category_id(&self) -> String {
        self.ticket.key.category_id.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn date(&self) -> String {
        self.ticket.key.date.format(DATE_FORMAT).to_string()
    }
}

/// Dashboard view state
#[wasm_bindgen]
pub struct Dashboard {
    state: DashboardState,
    all_shops_id: i64,
}

#[wasm_bindgen]
impl Dashboard {
    #[wasm_bindgen(constructor)]
    pub fn new(date: &str, low_stock_threshold: u32) -> Result<Dashboard, JsValue> {
        Ok(Dashboard {
            state: DashboardState::new(parse_date(date)?)
                .with_low_stock_threshold(u64::from(low_stock_threshold)),
            all_shops_id: DEFAULT_ALL_SHOPS_ID,
        })
    }

    /// Override the upstream id that means "all shops"
    pub fn set_all_shops_id(&mut self, id: i32) {
        self.all_shops_id = i64::from(id);
    }

    pub fn set_shops(&mut self, shops_json: &str) -> Result<(), JsValue> {
        let shops: Vec<Shop> = from_json(shops_json, "shops")?;
        self.state.set_shops(shops);
        Ok(())
    }

    pub fn set_categories(&mut self, categories_json: &str) -> Result<(), JsValue> {
        let categories: Vec<Category> = from_json(categories_json, "categories")?;
        self.state.set_categories(categories);
        Ok(())
    }

    /// Record a registry failure as a banner
    pub fn report_registry_error(&mut self, categories: bool, message: &str) {
        let source = if categories {
            DataSource::Categories
        } else {
            DataSource::Shops
        };
        self.state.report_error(source, message);
    }

    pub fn select_shop(&mut self, shop_id: i32) {
        self.state
            .select_shop(ShopSelection::from_wire_id(i64::from(shop_id), self.all_shops_id));
    }

    pub fn select_all_shops(&mut self) {
        self.state.select_shop(ShopSelection::All);
    }

    pub fn select_category(&mut self, category_id: &str) {
        self.state.select_category(category_id);
    }

    pub fn select_date(&mut self, date: &str) -> Result<(), JsValue> {
        self.state.select_date(parse_date(date)?);
        Ok(())
    }

    pub fn set_query(&mut self, query: &str) {
        self.state.set_query(query);
    }

    pub fn set_page(&mut self, page: u32) {
        self.state.set_page(page);
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        self.state.set_page_size(page_size);
    }

    pub fn page_size_options(&self) -> Vec<u32> {
        self.state.page_size_options().to_vec()
    }

    pub fn dismiss_banners(&mut self) {
        self.state.dismiss_banners();
    }

    /// Start a fetch for the current selection, if it is complete
    pub fn begin_fetch(&mut self) -> Option<FetchHandle> {
        let ticket = self.state.begin_fetch()?;
        log(&format!("Fetching closing stock for {}", ticket.key));
        Some(FetchHandle {
            ticket,
            all_shops_id: self.all_shops_id,
        })
    }

    /// Apply upstream rows for a fetch. Returns `false` when a newer fetch has
    /// started since, in which case the response is ignored.
    pub fn apply_stock(&mut self, handle: &FetchHandle, raw_rows_json: &str) -> Result<bool, JsValue> {
        let raw_rows: Vec<RawStockRow> = from_json(raw_rows_json, "stock rows")?;
        let Some(category) = find_category(self.state.categories(), &handle.ticket.key.category_id)
        else {
            return Ok(false);
        };

        let snapshot = StockSnapshot::build(handle.ticket.key.clone(), category, &raw_rows, now_utc());
        let applied = self.state.apply_snapshot(&handle.ticket, snapshot);
        if !applied {
            log(&format!("Discarded stale response for {}", handle.ticket.key));
        }
        Ok(applied)
    }

    /// Record a failed fetch; the previous data stays visible
    pub fn fail_fetch(&mut self, handle: &FetchHandle, message: &str) -> bool {
        self.state.fail_fetch(&handle.ticket, message)
    }

    /// The current table page, totals, summary and banners as JSON
    pub fn view(&self) -> Result<String, JsValue> {
        to_json(&self.state.view())
    }

    /// Export layout for every filtered row (not just the visible page)
    pub fn export(&mut self, generated_at: &str) -> Result<String, JsValue> {
        let rows = self.state.filtered_rows();
        let sizes = self
            .state
            .snapshot()
            .map(|snapshot| snapshot.sizes.clone())
            .unwrap_or_default();
        let totals = aggregate_totals(rows.iter().copied(), &sizes);
        let shop_label = self.state.shop_label();
        let category_label = self.state.category_label();
        let date_label = self.state.selection().date.format(DATE_FORMAT).to_string();
        let context = ExportContext {
            shop_label: &shop_label,
            category_label: &category_label,
            date_label: &date_label,
            generated_at,
        };

        let result = build_export(&rows, &sizes, &totals, &context);
        match result {
            Ok(workbook) => to_json(&workbook),
            Err(err) => {
                let message = export_error(err);
                self.state.report_error(
                    DataSource::Export,
                    message.as_string().unwrap_or_default(),
                );
                Err(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn category_json() -> String {
        json!({
            "id": "1",
            "name": "Whisky",
            "sizes": [
                {"id": 101, "label": "180ml", "title": "Quarter", "category_id": 1},
                {"id": 102, "label": "750ml", "title": "Full", "category_id": 1}
            ]
        })
        .to_string()
    }

    fn raw_rows_json() -> String {
        json!([
            {"product_id": 1, "product_name": "P1", "101": 5, "102": 0},
            {"product_id": 2, "product_name": "P2", "101": "0", "102": 12}
        ])
        .to_string()
    }

    #[test]
    fn test_normalize_filter_and_totals() {
        let rows = normalize_stock(&raw_rows_json(), &category_json()).unwrap();
        let filtered = filter_stock(&rows, "P1").unwrap();
        let filtered_rows: Vec<Value> = serde_json::from_str(&filtered).unwrap();
        assert_eq!(filtered_rows.len(), 1);

        let category: Value = serde_json::from_str(&category_json()).unwrap();
        let totals = stock_totals(&rows, &category["sizes"].to_string()).unwrap();
        let totals: Value = serde_json::from_str(&totals).unwrap();
        assert_eq!(totals["101"], 5);
        assert_eq!(totals["102"], 12);
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(30, 10), 3);
        assert_eq!(page_count(0, 25), 1);
    }

    #[test]
    fn test_validate_login() {
        assert_eq!(validate_login("9876543210", "1234"), "");
        assert!(!validate_login("12", "1234").is_empty());
        assert!(!validate_login("9876543210", "12").is_empty());
    }

    #[test]
    fn test_dashboard_fetch_cycle() {
        let mut dashboard = Dashboard::new("2026-10-19", 10).unwrap();
        dashboard.set_categories(&format!("[{}]", category_json())).unwrap();
        assert!(dashboard.begin_fetch().is_none());

        dashboard.select_shop(6);
        dashboard.select_category("1");
        let handle = dashboard.begin_fetch().unwrap();
        assert_eq!(handle.shop_id(), 6.0);
        assert_eq!(handle.date(), "2026-10-19");

        assert!(dashboard.apply_stock(&handle, &raw_rows_json()).unwrap());
        let view: Value = serde_json::from_str(&dashboard.view().unwrap()).unwrap();
        assert_eq!(view["shop_label"], "ALL SHOPS");
        assert_eq!(view["rows"].as_array().map(Vec::len), Some(2));

        let layout: Value = serde_json::from_str(&dashboard.export("19/10/2026, 10:00:00").unwrap()).unwrap();
        assert_eq!(layout["file_name"], "Closing_Stock_ALL_SHOPS_Whisky_2026-10-19.xlsx");
    }

    #[test]
    fn test_dashboard_ignores_superseded_fetch() {
        let mut dashboard = Dashboard::new("2026-10-19", 10).unwrap();
        dashboard.set_categories(&format!("[{}]", category_json())).unwrap();
        dashboard.select_all_shops();
        dashboard.select_category("1");

        let old = dashboard.begin_fetch().unwrap();
        dashboard.select_date("2026-10-18").unwrap();
        let new = dashboard.begin_fetch().unwrap();

        assert!(!dashboard.apply_stock(&old, &raw_rows_json()).unwrap());
        assert!(!dashboard.fail_fetch(&old, "timeout"));
        assert!(dashboard.apply_stock(&new, "[]").unwrap());
    }
}
