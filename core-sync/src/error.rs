use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{message}")]
    Remote {
        status: Option<u16>,
        message: String,
    },

    #[error("{operation} is already in progress")]
    Busy { operation: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Cannot {operation}: {reason}")]
    InvalidOperation { operation: String, reason: String },

    #[error("Failed to open picker window. Please allow popups for this site.")]
    PopupBlocked,

    #[error("Timed out waiting for photo selection after {polls} polls")]
    PickerTimeout { polls: u32 },

    #[error("Upload failed: {message}")]
    Upload { message: String },

    #[error("Retries exhausted after {attempts} attempts without a result")]
    RetriesExhausted { attempts: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bridge error: {0}")]
    Bridge(BridgeError),
}

impl SyncError {
    /// HTTP status reported by the remote side, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Remote { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether retrying the same call can never succeed.
    ///
    /// Client errors (4xx) are terminal whatever their text; otherwise the
    /// message decides.
    pub fn is_terminal(&self) -> bool {
        match self {
            SyncError::Remote { status, message } => {
                if matches!(status, Some(code) if (400..500).contains(code)) {
                    return true;
                }
                let lower = message.to_lowercase();
                ["not found", "unauthorized", "forbidden"]
                    .iter()
                    .any(|needle| lower.contains(needle))
            }
            SyncError::Busy { .. }
            | SyncError::InvalidStateTransition { .. }
            | SyncError::InvalidOperation { .. }
            | SyncError::PopupBlocked => true,
            _ => false,
        }
    }
}

impl From<BridgeError> for SyncError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Http { status, message } => SyncError::Remote {
                status: Some(status),
                message,
            },
            BridgeError::OperationFailed(message) => SyncError::Remote {
                status: None,
                message,
            },
            BridgeError::Io(e) => SyncError::Io(e),
            other => SyncError::Bridge(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(status: Option<u16>, message: &str) -> SyncError {
        SyncError::Remote {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_client_errors_are_terminal() {
        assert!(remote(Some(404), "gone").is_terminal());
        assert!(remote(Some(400), "bad request").is_terminal());
        assert!(remote(Some(499), "whatever").is_terminal());
    }

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(!remote(Some(500), "Internal Server Error").is_terminal());
        assert!(!remote(Some(503), "unavailable").is_terminal());
        assert!(!remote(None, "connection reset").is_terminal());
    }

    #[test]
    fn test_terminal_messages_ignore_case() {
        assert!(remote(None, "Photo Not Found").is_terminal());
        assert!(remote(Some(502), "upstream said UNAUTHORIZED").is_terminal());
        assert!(remote(None, "Forbidden by policy").is_terminal());
    }

    #[test]
    fn test_bridge_http_error_keeps_status() {
        let err: SyncError = BridgeError::Http {
            status: 404,
            message: "Photo not found".to_string(),
        }
        .into();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "Photo not found");
    }

    #[test]
    fn test_bridge_io_error_maps_to_io() {
        let err: SyncError =
            BridgeError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing")).into();
        assert!(matches!(err, SyncError::Io(_)));
        assert!(!err.is_terminal());
    }
}
