use notesload::ClientError;
use notesload_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Unable to build the API client: {0}")]
    Client(#[from] ClientError),
}
