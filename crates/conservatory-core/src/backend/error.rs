use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - session may be expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Remote function {function} failed: {message}")]
    Rpc { function: String, message: String },
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl BackendError {
    /// Truncate a response body to avoid logging excessive data
    pub fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..end],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => BackendError::Unauthorized,
            403 => BackendError::AccessDenied(truncated),
            404 => BackendError::NotFound(truncated),
            409 => BackendError::Conflict(truncated),
            429 => BackendError::RateLimited,
            500..=599 => BackendError::ServerError(truncated),
            _ => BackendError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            BackendError::from_status(StatusCode::UNAUTHORIZED, ""),
            BackendError::Unauthorized
        ));
        assert!(matches!(
            BackendError::from_status(StatusCode::FORBIDDEN, "nope"),
            BackendError::AccessDenied(ref b) if b == "nope"
        ));
        assert!(matches!(
            BackendError::from_status(StatusCode::NOT_FOUND, "missing"),
            BackendError::NotFound(_)
        ));
        assert!(matches!(
            BackendError::from_status(StatusCode::CONFLICT, "dup"),
            BackendError::Conflict(_)
        ));
        assert!(matches!(
            BackendError::from_status(StatusCode::BAD_GATEWAY, ""),
            BackendError::ServerError(_)
        ));
        assert!(matches!(
            BackendError::from_status(StatusCode::IM_A_TEAPOT, ""),
            BackendError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_long_body_truncated() {
        let body = "x".repeat(2000);
        match BackendError::from_status(StatusCode::NOT_FOUND, &body) {
            BackendError::NotFound(msg) => {
                assert!(msg.len() < 600);
                assert!(msg.contains("2000 total bytes"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
