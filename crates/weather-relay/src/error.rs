//! Error types for the relay service.

use thiserror::Error;

/// Errors that stop the relay or prevent it from starting.
///
/// Message-level failures are not represented here: an undecodable body or a
/// failed forward is settled on the broker and the relay moves on.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration file unreadable or invalid values
    #[error("Config error: {0}")]
    Config(String),

    /// Failed to parse configuration YAML
    #[error("Parse error: {0}")]
    Parse(String),

    /// Broker could not be dialed
    #[error("Connect error: {0}")]
    Connect(String),

    /// Channel open, qos, queue declare or consume failed after a successful dial
    #[error("Channel error: {0}")]
    Channel(String),

    /// Broker failure after consumption started
    #[error("Broker error: {0}")]
    Broker(String),

    /// The consumption stream ended while the relay was running
    #[error("Consumer stream closed by broker")]
    StreamClosed,

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Process setup failed (signal handler installation)
    #[error("Init error: {0}")]
    Init(String),

    /// Shutdown was requested before the relay was running
    #[error("Shutdown requested")]
    Shutdown,
}

impl From<serde_yaml::Error> for RelayError {
    fn from(err: serde_yaml::Error) -> Self {
        RelayError::Parse(err.to_string())
    }
}

impl From<ctrlc::Error> for RelayError {
    fn from(err: ctrlc::Error) -> Self {
        RelayError::Init(format!("Failed to install signal handler: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
