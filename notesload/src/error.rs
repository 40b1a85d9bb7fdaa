use notesload_core::Operation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{operation} failed validation ({reason}): status={status} body={body}")]
    Validation {
        operation: Operation,
        status: u16,
        reason: &'static str,
        body: String,
    },

    #[error("Credentials cannot be encoded as a header: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl ClientError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation { .. })
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unable to write results file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Unable to reach results endpoint: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Results endpoint responded with status {0}")]
    Status(u16),

    #[error("Unable to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}
