//! Closing stock handlers

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use validator::Validate;

use shared::{
    parse_stock_date, validate_category_id, validate_page_size, validate_search_query,
    ExportContext, Pagination, ShopSelection, StockView,
};

use crate::config::DashboardConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::{ExportFormat, ExportService, StockRequest};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct StockQuery {
    /// Numeric shop id, or `all`
    pub shop_id: Option<String>,
    pub category_id: Option<String>,
    /// `YYYY-MM-DD`, defaults to today
    pub date: Option<String>,
    pub q: Option<String>,
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// `xlsx` (default) or `csv`, export only
    pub format: Option<String>,
}

impl StockQuery {
    fn into_request(self, settings: &DashboardConfig) -> AppResult<StockRequest> {
        self.validate()?;

        let shop = self
            .shop_id
            .as_deref()
            .map(|raw| parse_shop(raw, settings.all_shops_id))
            .transpose()?;

        let category_id = self
            .category_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        if let Some(id) = &category_id {
            validate_category_id(id).map_err(|msg| AppError::validation("category_id", msg))?;
        }

        let date = match self.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => parse_stock_date(raw).map_err(|msg| AppError::validation("date", msg))?,
            None => today(),
        };

        let per_page = self.per_page.unwrap_or(settings.default_page_size);
        validate_page_size(per_page, settings.max_page_size)
            .map_err(|msg| AppError::validation("per_page", msg))?;

        let query = self.q.unwrap_or_default();
        validate_search_query(&query).map_err(|msg| AppError::validation("q", msg))?;

        Ok(StockRequest {
            shop,
            category_id,
            date,
            query,
            pagination: Pagination {
                page: self.page.unwrap_or(1),
                per_page,
            },
        })
    }
}

fn parse_shop(raw: &str, all_shops_id: i64) -> AppResult<ShopSelection> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("all") {
        return Ok(ShopSelection::All);
    }
    raw.parse::<i64>()
        .map(|id| ShopSelection::from_wire_id(id, all_shops_id))
        .map_err(|_| AppError::validation("shop_id", "Shop must be a number or 'all'"))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Filtered, paginated closing stock with totals and summary
pub async fn get_stock_view(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<StockQuery>,
) -> AppResult<Json<StockView>> {
    let request = query.into_request(&state.config.dashboard)?;
    let view = state.stock.load_view(&auth.token, &request).await?;
    Ok(Json(view))
}

/// Download the filtered closing stock as a spreadsheet
pub async fn export_stock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<StockQuery>,
) -> AppResult<impl IntoResponse> {
    let format = match query.format.as_deref() {
        Some(raw) => raw
            .parse::<ExportFormat>()
            .map_err(|msg| AppError::validation("format", &msg))?,
        None => ExportFormat::default(),
    };
    let request = query.into_request(&state.config.dashboard)?;

    let resolved = state.stock.resolve(&auth.token, &request).await?;
    let rows = resolved.filtered_rows(&request.query);
    let date_label = request.date.format(shared::DATE_FORMAT).to_string();
    let generated_at = Local::now().format("%d/%m/%Y, %H:%M:%S").to_string();
    let context = ExportContext {
        shop_label: &resolved.shop_label,
        category_label: &resolved.category_label,
        date_label: &date_label,
        generated_at: &generated_at,
    };

    let file = ExportService::export_rows(&rows, resolved.sizes(), &context, format)
        .map_err(|err| {
            tracing::warn!(user = auth.user.employee_id, "Export failed: {}", err);
            AppError::from(err)
        })?;

    let disposition = attachment_disposition(&file.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    ))
}

/// `Content-Disposition` for a download. Shop and category names come from
/// upstream, so the quoted name is reduced to safe ASCII and the exact name is
/// carried percent-encoded in `filename*`.
fn attachment_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DashboardConfig {
        DashboardConfig::default()
    }

    fn query() -> StockQuery {
        StockQuery {
            shop_id: Some("6".to_string()),
            category_id: Some("1".to_string()),
            date: Some("2026-10-19".to_string()),
            q: None,
            page: None,
            per_page: None,
            format: None,
        }
    }

    #[test]
    fn test_into_request_defaults() {
        let request = query().into_request(&settings()).unwrap();

        assert_eq!(request.shop, Some(ShopSelection::All));
        assert_eq!(request.category_id.as_deref(), Some("1"));
        assert_eq!(request.date, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        assert_eq!(request.pagination.page, 1);
        assert_eq!(request.pagination.per_page, settings().default_page_size);
        assert!(request.query.is_empty());
    }

    #[test]
    fn test_into_request_specific_shop() {
        let mut q = query();
        q.shop_id = Some("3".to_string());
        let request = q.into_request(&settings()).unwrap();
        assert_eq!(request.shop, Some(ShopSelection::Specific(3)));

        let mut q = query();
        q.shop_id = Some("ALL".to_string());
        assert_eq!(q.into_request(&settings()).unwrap().shop, Some(ShopSelection::All));
    }

    #[test]
    fn test_into_request_incomplete_selection() {
        let mut q = query();
        q.shop_id = None;
        q.category_id = Some("  ".to_string());
        let request = q.into_request(&settings()).unwrap();
        assert!(request.shop.is_none());
        assert!(request.category_id.is_none());
    }

    #[test]
    fn test_into_request_rejects_invalid_input() {
        let mut q = query();
        q.date = Some("19/10/2026".to_string());
        assert!(matches!(
            q.into_request(&settings()),
            Err(AppError::Validation { ref field, .. }) if field == "date"
        ));

        let mut q = query();
        q.per_page = Some(0);
        assert!(q.into_request(&settings()).is_err());

        let mut q = query();
        q.page = Some(0);
        assert!(q.into_request(&settings()).is_err());

        let mut q = query();
        q.shop_id = Some("north".to_string());
        assert!(q.into_request(&settings()).is_err());

        let mut q = query();
        q.q = Some("x".repeat(shared::MAX_QUERY_LEN + 1));
        assert!(matches!(
            q.into_request(&settings()),
            Err(AppError::Validation { ref field, .. }) if field == "q"
        ));

        let mut q = query();
        q.per_page = Some(settings().max_page_size + 1);
        assert!(matches!(
            q.into_request(&settings()),
            Err(AppError::Validation { ref field, .. }) if field == "per_page"
        ));
    }

    #[test]
    fn test_attachment_disposition_is_a_valid_header() {
        let name = "Closing_Stock_MG_\"Road\"_Beer\n&_Wine_2026-10-19.xlsx";
        let disposition = attachment_disposition(name);

        assert!(header::HeaderValue::from_str(&disposition).is_ok());
        assert!(disposition.starts_with(
            "attachment; filename=\"Closing_Stock_MG__Road__Beer_&_Wine_2026-10-19.xlsx\""
        ));
        assert!(disposition.contains("filename*=UTF-8''Closing_Stock_MG_%22Road%22_Beer%0A%26_Wine"));
    }

    #[test]
    fn test_attachment_disposition_keeps_plain_names() {
        assert_eq!(
            attachment_disposition("Closing_Stock_ALL_SHOPS_Whisky_2026-10-19.xlsx"),
            "attachment; filename=\"Closing_Stock_ALL_SHOPS_Whisky_2026-10-19.xlsx\"; \
             filename*=UTF-8''Closing_Stock_ALL_SHOPS_Whisky_2026-10-19.xlsx"
        );
    }
}
