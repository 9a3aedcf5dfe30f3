//! Uniform error classification for Graph API responses.
//!
//! The platform reports most failures as a JSON `error` object with a
//! numeric code, independent of the HTTP status. Classification maps those
//! codes (and bare HTTP statuses) onto the [`GatewayError`] taxonomy that
//! drives retry and abort decisions upstream.

use autoads_core::error::GatewayError;
use serde_json::Value;

// Graph error codes observed in the wild.
const CODE_INVALID_TOKEN: i64 = 190;
const CODE_UNKNOWN: i64 = 1;
const CODE_SERVICE: i64 = 2;
const RATE_LIMIT_CODES: [i64; 4] = [4, 17, 32, 613];
const PERMISSION_CODES: std::ops::RangeInclusive<i64> = 200..=299;
const CODE_PERMISSION: i64 = 10;

/// Classify a response body (and HTTP status) into a [`GatewayError`].
/// Returns `None` when the response carries no error.
pub fn classify_response(status: u16, body: &Value) -> Option<GatewayError> {
    if let Some(error) = body.get("error") {
        return Some(classify_error_object(error));
    }
    if (200..300).contains(&status) {
        return None;
    }
    Some(classify_http_status(status))
}

/// Classify the platform's `{"error": {...}}` payload.
pub fn classify_error_object(error: &Value) -> GatewayError {
    let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown platform error")
        .to_string();

    if code == CODE_INVALID_TOKEN {
        return GatewayError::InvalidToken { message };
    }
    if code == CODE_PERMISSION || PERMISSION_CODES.contains(&code) {
        return GatewayError::PermissionDenied { message };
    }
    if RATE_LIMIT_CODES.contains(&code) {
        return GatewayError::RateLimited {
            retry_after_secs: None,
        };
    }
    if code == CODE_UNKNOWN || code == CODE_SERVICE {
        return GatewayError::Transient { message };
    }
    GatewayError::Resource { code, message }
}

/// Classify a bare HTTP status with no platform error payload.
pub fn classify_http_status(status: u16) -> GatewayError {
    match status {
        429 => GatewayError::RateLimited {
            retry_after_secs: None,
        },
        401 => GatewayError::InvalidToken {
            message: format!("HTTP {status}"),
        },
        403 => GatewayError::PermissionDenied {
            message: format!("HTTP {status}"),
        },
        s if s >= 500 => GatewayError::Transient {
            message: format!("HTTP {s}"),
        },
        s => GatewayError::Resource {
            code: s as i64,
            message: format!("HTTP {s}"),
        },
    }
}

/// Classify a transport-level failure. Timeouts and connection errors are
/// transient; anything else at this layer is as well, since no platform
/// verdict was received.
pub fn classify_transport(err: &reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::transient(format!("request timed out: {err}"))
    } else {
        GatewayError::transient(format!("transport error: {err}"))
    }
}
