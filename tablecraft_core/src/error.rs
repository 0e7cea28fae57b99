use thiserror::Error;

use crate::schema::StoreError;

pub type Result<T> = std::result::Result<T, TablecraftError>;

#[derive(Debug, Error)]
pub enum TablecraftError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Authentication failed (HTTP {status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TablecraftError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Status code of a failed HTTP exchange, if this error came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } | Self::Unauthorized { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Raw response body text for HTTP failures.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Http { body, .. } | Self::Unauthorized { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Store(e) => e.is_not_found(),
            _ => self.status() == Some(404),
        }
    }
}
