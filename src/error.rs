use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Field name to the messages the backend (or local validation) attached to it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// The closed set of failure kinds callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Authentication,
    RateLimited,
    Server,
    Network,
    Timeout,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::Authentication => "authentication",
            Self::RateLimited => "rate_limited",
            Self::Server => "server",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    Configuration(String),
    #[error("{message}")]
    Validation { status: Option<u16>, message: String, fields: FieldErrors },
    #[error("{message}")]
    Authentication { status: Option<u16>, message: String },
    #[error("{message}")]
    RateLimited { message: String, retry_after: Option<Duration> },
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("{0}")]
    Network(String),
    #[error("{0}")]
    Timeout(String),
    #[error("{message}")]
    Unknown { status: Option<u16>, message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Server { .. } => ErrorKind::Server,
            Self::Network(_) => ErrorKind::Network,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// HTTP status that produced this error, when one was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Validation { status, .. } | Self::Authentication { status, .. } | Self::Unknown { status, .. } => {
                *status
            }
            Self::RateLimited { .. } => Some(429),
            Self::Server { status, .. } => Some(*status),
            Self::Configuration(_) | Self::Network(_) | Self::Timeout(_) => None,
        }
    }

    /// Whether repeating the same request later could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::RateLimited | ErrorKind::Server | ErrorKind::Network | ErrorKind::Timeout)
    }

    /// Per-field messages attached to a validation failure.
    #[must_use]
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { fields, .. } if !fields.is_empty() => Some(fields),
            _ => None,
        }
    }

    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub(crate) fn validation(fields: FieldErrors) -> Self {
        let message = fields
            .values()
            .flat_map(|messages| messages.first())
            .next()
            .cloned()
            .unwrap_or_else(|| "Please check the highlighted fields".to_string());
        Self::Validation { status: None, message, fields }
    }

    pub(crate) fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown { status: None, message: message.into() }
    }
}
