//! Error types for the library API provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Library API provider errors
#[derive(Error, Debug)]
pub enum LibraryApiError {
    /// API request returned a non-success status
    #[error("Library API error (status {status_code}): {message}")]
    Api { status_code: u16, message: String },

    /// Session cookie missing or expired
    #[error("Unauthorized")]
    Unauthorized,

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// Bridge error
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for library API operations
pub type Result<T> = std::result::Result<T, LibraryApiError>;

impl From<LibraryApiError> for BridgeError {
    fn from(error: LibraryApiError) -> Self {
        match error {
            LibraryApiError::Api {
                status_code,
                message,
            } => BridgeError::Http {
                status: status_code,
                message,
            },
            LibraryApiError::Unauthorized => BridgeError::Http {
                status: 401,
                message: "Unauthorized".to_string(),
            },
            LibraryApiError::Parse(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            LibraryApiError::Bridge(e) => e,
        }
    }
}
