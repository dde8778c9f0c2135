pub mod actions;
pub mod config;
pub mod executor;
pub mod metrics;
pub mod processor;
pub mod server;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("No JSON data received")]
    NoData,
    #[error("{0}")]
    Validation(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors caused by the request payload rather than by this service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::NoData | Error::Validation(_) | Error::SerdeJson(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
