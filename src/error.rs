use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Failure taxonomy for the command path. Everything except `Config` and
/// `Io` is contained at the dispatcher boundary and rendered into the
/// result map; it never escapes to the transport.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unable to authenticate")]
    Authentication,
    #[error("missing {0} capability")]
    Authorization(&'static str),
    #[error("no workers available")]
    AdmissionRejected,
    #[error("unable to resolve {0}")]
    Resolution(String),
    #[error("timeout waiting for world reply")]
    Timeout,
    #[error("unknown command {0}")]
    UnknownCommand(String),
    #[error("{0}")]
    Domain(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<toml::de::Error> for GatewayError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for GatewayError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl GatewayError {
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }
}
