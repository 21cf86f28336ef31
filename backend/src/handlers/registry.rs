//! Shop and category registry handlers

use axum::{extract::State, Extension, Json};

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::{Category, Shop};
use crate::AppState;

/// List shops the caller can pick from
pub async fn list_shops(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult<Json<Vec<Shop>>> {
    let shops = state.registry.shops(&auth.token).await?;
    Ok(Json(shops.as_ref().clone()))
}

/// List product categories with their packaging sizes
pub async fn list_categories(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult<Json<Vec<Category>>> {
    let categories = state.registry.categories(&auth.token).await?;
    Ok(Json(categories.as_ref().clone()))
}
