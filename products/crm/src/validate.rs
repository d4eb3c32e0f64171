//! Field validators shared by every CRM input.
//!
//! Each validator is a pure function returning the normalized value or a
//! message. [`Validator`] collects failures so a request reports every bad
//! field at once instead of the first one.

use platform_api::{ApiError, ApiResult, FieldError};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 128;
const MAX_AMOUNT: f64 = 1e13;

pub fn email(value: &str) -> Result<String, String> {
    let normalized = value.trim().to_lowercase();
    let invalid = || Err("invalid email address".to_string());
    let mut parts = normalized.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return invalid();
    };
    if local.is_empty() || local.starts_with('.') || local.ends_with('.') {
        return invalid();
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return invalid();
    }
    if normalized.chars().any(char::is_whitespace) {
        return invalid();
    }
    Ok(normalized)
}

pub fn password(value: &str) -> Result<(), String> {
    let len = value.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(format!(
            "password must be at most {MAX_PASSWORD_LEN} characters"
        ));
    }
    Ok(())
}

/// A missing confirmation is accepted; a present one must match exactly.
pub fn confirmation(password: &str, confirm: Option<&str>) -> Result<(), String> {
    match confirm {
        Some(confirm) if confirm != password => Err("passwords do not match".into()),
        _ => Ok(()),
    }
}

pub fn required_text(value: &str, max: usize) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("is required".into());
    }
    if trimmed.chars().count() > max {
        return Err(format!("must be at most {max} characters"));
    }
    Ok(trimmed.to_string())
}

/// Blank strings collapse to `None`.
pub fn optional_text(value: Option<&str>, max: usize) -> Result<Option<String>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => required_text(text, max).map(Some),
    }
}

/// Converts a currency amount to whole cents.
pub fn amount_cents(value: Option<f64>) -> Result<Option<i64>, String> {
    let Some(amount) = value else {
        return Ok(None);
    };
    if !amount.is_finite() || amount < 0.0 {
        return Err("amount must be a non-negative number".into());
    }
    if amount > MAX_AMOUNT {
        return Err("amount is too large".into());
    }
    Ok(Some((amount * 100.0).round() as i64))
}

#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn check<T>(&mut self, field: &str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.errors.push(FieldError::new(field, message));
                None
            }
        }
    }

    pub fn finish(self) -> ApiResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}
