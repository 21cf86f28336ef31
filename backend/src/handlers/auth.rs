//! Authentication handlers

use axum::{extract::State, Json};

use crate::error::AppError;
use crate::middleware::CurrentSession;
use crate::models::{LoginRequest, LoginResponse, SessionUser};
use crate::AppState;

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response = state.auth.login(body).await?;
    Ok(Json(response))
}

/// Current session endpoint handler
pub async fn me(session: CurrentSession) -> Result<Json<SessionUser>, AppError> {
    let auth = session.require()?;
    Ok(Json(auth.user.clone()))
}
