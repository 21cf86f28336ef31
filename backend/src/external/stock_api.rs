//! Upstream inventory API client
//!
//! Wraps the liquor-shop REST API: login, the shop registry, the packaging
//! configuration (categories with their sizes) and closing stock rows.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use shared::{Category, DataSource, PackagingSize, RawStockRow, Shop, StockKey, DATE_FORMAT};

use crate::error::{AppError, AppResult};

/// Upstream API client
#[derive(Clone)]
pub struct StockApiClient {
    client: Client,
    base_url: String,
    all_shops_id: i64,
}

/// Login request body expected upstream
#[derive(Debug, Serialize)]
struct UpstreamLoginRequest<'a> {
    mobile_no: &'a str,
    login_pin: u64,
}

#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    #[serde(default)]
    status: bool,
    token: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShopsEnvelope {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    shops: Vec<UpstreamShop>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamShop {
    shop_id: i64,
    shop_name: String,
    #[serde(default)]
    license_no: String,
    #[serde(default)]
    address: String,
    contact_no: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PackagingConfigEnvelope {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    configs: Vec<UpstreamCategory>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamCategory {
    category_id: i64,
    category_name: String,
    #[serde(default)]
    packaging_size: Vec<UpstreamPackagingSize>,
}

#[derive(Debug, Deserialize)]
struct UpstreamPackagingSize {
    psid: i64,
    size: String,
    #[serde(default)]
    size_title: String,
    category_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ClosingStockEnvelope {
    #[serde(default)]
    status: bool,
    data: Option<ClosingStockData>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClosingStockData {
    #[serde(default)]
    closing_stocks: Vec<RawStockRow>,
}

impl StockApiClient {
    /// Create a new StockApiClient
    pub fn new(base_url: String, timeout: Duration, all_shops_id: i64) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            all_shops_id,
        })
    }

    /// Exchange a mobile number and PIN for a session token
    pub async fn login(&self, mobile_no: &str, login_pin: u64) -> AppResult<String> {
        let url = format!("{}/User/login", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&UpstreamLoginRequest {
                mobile_no,
                login_pin,
            })
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Login request failed: {}", e)))?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST
        ) {
            return Err(AppError::InvalidCredentials);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!("Login API error: {} - {}", status, body)));
        }

        let envelope: LoginEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse login response: {}", e)))?;

        match envelope {
            LoginEnvelope {
                status: true,
                token: Some(token),
                ..
            } => Ok(token),
            LoginEnvelope { message, .. } => {
                tracing::info!("Login rejected upstream: {}", message.unwrap_or_default());
                Err(AppError::InvalidCredentials)
            }
        }
    }

    /// Fetch the shop registry, including the "all shops" entry
    pub async fn fetch_shops(&self, token: &str) -> AppResult<Vec<Shop>> {
        let url = format!("{}/Shop/all_shops", self.base_url);
        let envelope: ShopsEnvelope = self.get_json(DataSource::Shops, &url, token, &[]).await?;
        convert_shops(envelope).map_err(|msg| AppError::upstream(DataSource::Shops, msg))
    }

    /// Fetch categories with their ordered packaging sizes
    pub async fn fetch_categories(&self, token: &str) -> AppResult<Vec<Category>> {
        let url = format!("{}/ProductCategory/packaging_config", self.base_url);
        let envelope: PackagingConfigEnvelope =
            self.get_json(DataSource::Categories, &url, token, &[]).await?;
        convert_categories(envelope).map_err(|msg| AppError::upstream(DataSource::Categories, msg))
    }

    /// Fetch raw closing stock rows for one (shop, category, date)
    pub async fn fetch_closing_stock(
        &self,
        token: &str,
        key: &StockKey,
    ) -> AppResult<Vec<RawStockRow>> {
        let url = format!("{}/Stock/closing_stock", self.base_url);
        let query = [
            ("shop_id", key.shop.wire_id(self.all_shops_id).to_string()),
            ("category_id", key.category_id.clone()),
            ("date", key.date.format(DATE_FORMAT).to_string()),
        ];
        let envelope: ClosingStockEnvelope =
            self.get_json(DataSource::Stock, &url, token, &query).await?;
        convert_closing_stock(envelope).map_err(|msg| AppError::upstream(DataSource::Stock, msg))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        source: DataSource,
        url: &str,
        token: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        tracing::debug!(%source, url, "Upstream request");

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::upstream(source, format!("request failed: {}", e)))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AppError::Unauthorized(
                "Session was rejected by the inventory API".to_string(),
            ));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(source, format!("{} - {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::upstream(source, format!("failed to parse response: {}", e)))
    }
}

fn rejected(what: &str, message: Option<String>) -> String {
    match message {
        Some(message) => format!("Failed to fetch {}: {}", what, message),
        None => format!("Failed to fetch {}", what),
    }
}

fn convert_shops(envelope: ShopsEnvelope) -> Result<Vec<Shop>, String> {
    if !envelope.status {
        return Err(rejected("shops", envelope.message));
    }

    Ok(envelope
        .shops
        .into_iter()
        .map(|shop| Shop {
            id: shop.shop_id,
            name: shop.shop_name,
            license_code: shop.license_no,
            address: shop.address,
            contact_no: shop.contact_no.filter(|c| !c.trim().is_empty()),
        })
        .collect())
}

/// Keeps the upstream size order; it defines the table's column order
fn convert_categories(envelope: PackagingConfigEnvelope) -> Result<Vec<Category>, String> {
    if !envelope.status {
        return Err(rejected("categories", envelope.message));
    }

    Ok(envelope
        .configs
        .into_iter()
        .map(|category| Category {
            id: category.category_id.to_string(),
            name: category.category_name,
            sizes: category
                .packaging_size
                .into_iter()
                .map(|size| PackagingSize {
                    id: size.psid,
                    label: size.size,
                    title: size.size_title,
                    category_id: size.category_id.unwrap_or(category.category_id),
                })
                .collect(),
        })
        .collect())
}

fn convert_closing_stock(envelope: ClosingStockEnvelope) -> Result<Vec<RawStockRow>, String> {
    match envelope {
        ClosingStockEnvelope {
            status: true,
            data: Some(data),
            ..
        } => Ok(data.closing_stocks),
        ClosingStockEnvelope { message, .. } => Err(rejected("stock data", message)),
    }
}
