//! Session user models

use serde::{Deserialize, Serialize};

/// The employee a session token was issued to.
///
/// Decoded from the upstream token payload; missing claims fall back to
/// their defaults instead of rejecting the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionUser {
    pub employee_id: i64,
    pub employee_name: String,
    pub mobile_no: String,
    pub shop_id: i64,
    pub employee_type: String,
    pub shop: Option<UserShop>,
}

/// Home shop details embedded in the token payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserShop {
    pub shop_id: i64,
    pub shop_name: String,
    pub address: String,
    pub license_no: String,
    pub contact_no: Option<String>,
}

/// Login credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub mobile_no: String,
    pub login_pin: String,
}

/// Successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: SessionUser,
}
