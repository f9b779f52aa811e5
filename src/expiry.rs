use chrono::{DateTime, Duration, Utc};

use crate::error::{ApiError, ApiResult};
use crate::models::Paste;

/// Absolute expiry for a paste created at `created_at` that lives for `minutes`.
///
/// `None` and `Some(0)` both mean the paste never expires.
pub fn compute_expiry(
    created_at: DateTime<Utc>,
    minutes: Option<u32>,
) -> ApiResult<Option<DateTime<Utc>>> {
    match minutes {
        None | Some(0) => Ok(None),
        Some(minutes) => created_at
            .checked_add_signed(Duration::minutes(i64::from(minutes)))
            .map(Some)
            .ok_or_else(|| ApiError::InvalidInput("expiry is out of range".to_owned())),
    }
}

/// Validate a client supplied `expires_in` against the configured maximum.
pub fn parse_expires_in(expires_in: Option<i64>, max_minutes: u32) -> ApiResult<Option<u32>> {
    let Some(minutes) = expires_in else {
        return Ok(None);
    };

    match u32::try_from(minutes) {
        Ok(minutes) if minutes <= max_minutes => Ok(Some(minutes)),
        _ => Err(ApiError::InvalidInput(format!(
            "expires_in must be between 0 and {max_minutes} minutes"
        ))),
    }
}

pub fn is_expired(paste: &Paste, now: DateTime<Utc>) -> bool {
    paste.expires_at.map_or(false, |expires_at| now >= expires_at)
}
