use thiserror::Error;

/// Failures raised while establishing or driving the push channel. These
/// never escape [`crate::ChannelManager`]; they are rendered into the
/// store's last-error field and the reconnect loop carries on.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {status} body={body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

impl QueryError {
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            QueryError::UnexpectedStatus { status, .. } => Some(*status),
            QueryError::Http(err) => err.status(),
            QueryError::Url(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid dashboard url '{value}': {source}")]
    DashboardUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("dashboard url '{0}' must use http or https")]
    UnsupportedScheme(String),
    #[error("dashboard url '{0}' has no host")]
    MissingHost(String),
}

/// Raised when a client cannot be built from a [`crate::ClientConfig`].
#[derive(Debug, Error)]
pub enum ClientSetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Query(#[from] QueryError),
}
