//! HTTP failure classification shared by the reqwest transports.

use reqwest::StatusCode;

use crate::ProviderError;

/// Anthropic's "overloaded" status.
const OVERLOADED: u16 = 529;

pub(crate) fn error_for_status(status: StatusCode, message: String) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::authentication(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ProviderError::timeout(message)
        }
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::invalid_request(message)
        }
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
            ProviderError::unavailable(message)
        }
        status if status.as_u16() == OVERLOADED => ProviderError::unavailable(message),
        _ => ProviderError::transport(message),
    }
}

pub(crate) fn send_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout(err.to_string())
    } else {
        ProviderError::transport(err.to_string())
    }
}
