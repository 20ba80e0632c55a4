//! Error types for Portico

use hyper::StatusCode;

/// Main error type for Portico operations.
///
/// Every variant carries a human-readable detail string; `kind()` returns
/// the stable machine-checkable code that crosses the trust boundary instead
/// of internal detail.
#[derive(Debug, thiserror::Error)]
pub enum PorticoError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Generic decryption failure. Deliberately does not distinguish
    /// padding, key mismatch, or malformed ciphertext.
    #[error("Failed to decrypt payload")]
    Decryption,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PorticoError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MissingField(_) => StatusCode::BAD_REQUEST,
            Self::InvalidKeyFormat(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::BAD_REQUEST,
            Self::Decryption => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Http(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-checkable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::InvalidKeyFormat(_) => "INVALID_KEY_FORMAT",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::Decryption => "DECRYPTION_FAILED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Internal(_) => "INTERNAL",
            Self::Http(_) => "BAD_REQUEST",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for PorticoError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for PorticoError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for PorticoError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for PorticoError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("JWT error: {}", err))
    }
}

/// Result type alias for Portico operations
pub type Result<T> = std::result::Result<T, PorticoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            PorticoError::MissingField("userId".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PorticoError::InvalidKeyFormat("no BEGIN marker".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PorticoError::Decryption.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PorticoError::Unauthorized("bad token".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_kind_is_stable() {
        assert_eq!(PorticoError::Decryption.kind(), "DECRYPTION_FAILED");
        assert_eq!(PorticoError::MissingField("x".into()).kind(), "MISSING_FIELD");
        assert_eq!(
            PorticoError::PayloadTooLarge("190 bytes max".into()).kind(),
            "PAYLOAD_TOO_LARGE"
        );
    }

    #[test]
    fn test_decryption_error_is_generic() {
        // The display string must not reveal which sub-step failed
        let msg = PorticoError::Decryption.to_string();
        assert_eq!(msg, "Failed to decrypt payload");
    }
}
