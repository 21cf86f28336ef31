//! Validation utilities for the Liquor Inventory Dashboard

use chrono::NaiveDate;

/// Largest page size the API accepts
pub const MAX_PAGE_SIZE: u32 = 500;

/// Longest search query accepted
pub const MAX_QUERY_LEN: usize = 100;

/// Date format used by the upstream API and in file names
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Stock view validations
// ============================================================================

/// Validate a requested page size
pub fn validate_page_size(page_size: u32, max: u32) -> Result<(), &'static str> {
    if page_size == 0 {
        return Err("Page size must be at least 1");
    }
    if page_size > max {
        return Err("Page size is too large");
    }
    Ok(())
}

/// Parse a `YYYY-MM-DD` stock date
pub fn parse_stock_date(date: &str) -> Result<NaiveDate, &'static str> {
    NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|_| "Date must be in YYYY-MM-DD format")
}

/// Validate a free-text search query
pub fn validate_search_query(query: &str) -> Result<(), &'static str> {
    if query.chars().count() > MAX_QUERY_LEN {
        return Err("Search query is too long");
    }
    Ok(())
}

/// Validate a category id (numeric, as issued by the upstream API)
pub fn validate_category_id(category_id: &str) -> Result<(), &'static str> {
    let category_id = category_id.trim();
    if category_id.is_empty() {
        return Err("Category is required");
    }
    if !category_id.chars().all(|c| c.is_ascii_digit()) {
        return Err("Category id must be numeric");
    }
    Ok(())
}

// ============================================================================
// Login validations
// ============================================================================

/// Validate an Indian mobile number.
/// Accepts: 9876543210, 98765-43210, +919876543210
pub fn validate_mobile_no(mobile_no: &str) -> Result<(), &'static str> {
    let digits: String = mobile_no.chars().filter(|c| c.is_ascii_digit()).collect();

    let local = match digits.len() {
        10 => digits.as_str(),
        12 if digits.starts_with("91") => &digits[2..],
        _ => return Err("Mobile number must be 10 digits"),
    };

    if !local.starts_with(['6', '7', '8', '9']) {
        return Err("Invalid mobile number");
    }
    Ok(())
}

/// Reduce a mobile number to its 10-digit local form
pub fn normalize_mobile_no(mobile_no: &str) -> String {
    let digits: String = mobile_no.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 12 && digits.starts_with("91") {
        digits[2..].to_string()
    } else {
        digits
    }
}

/// Validate a numeric login PIN (4 to 6 digits)
pub fn validate_login_pin(pin: &str) -> Result<(), &'static str> {
    if pin.len() < 4 || pin.len() > 6 {
        return Err("PIN must be 4 to 6 digits");
    }
    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err("PIN must contain digits only");
    }
    Ok(())
}
