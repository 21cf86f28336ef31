//! Authentication service
//!
//! Credentials are checked by the upstream inventory API. A successful login
//! returns its session token together with the employee read from the payload.

use shared::{
    normalize_mobile_no, validate_login_pin, validate_mobile_no, LoginRequest, LoginResponse,
};

use crate::error::{AppError, AppResult};
use crate::external::StockApiClient;
use crate::middleware::auth::decode_session;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    client: StockApiClient,
}

impl AuthService {
    pub fn new(client: StockApiClient) -> Self {
        Self { client }
    }

    /// Log in with a mobile number and PIN
    pub async fn login(&self, input: LoginRequest) -> AppResult<LoginResponse> {
        let login_pin = parse_credentials(&input)?;
        let mobile_no = normalize_mobile_no(&input.mobile_no);

        let token = self.client.login(&mobile_no, login_pin).await?;
        let user = decode_session(&token)?;

        tracing::info!(
            employee_id = user.employee_id,
            shop_id = user.shop_id,
            "User logged in"
        );

        Ok(LoginResponse { token, user })
    }
}

/// Validate the credentials and return the PIN in its numeric wire form
fn parse_credentials(input: &LoginRequest) -> AppResult<u64> {
    validate_mobile_no(&input.mobile_no)
        .map_err(|message| AppError::validation("mobile_no", message))?;
    validate_login_pin(&input.login_pin)
        .map_err(|message| AppError::validation("login_pin", message))?;

    input
        .login_pin
        .trim()
        .parse::<u64>()
        .map_err(|_| AppError::validation("login_pin", "PIN must be numeric"))
}
