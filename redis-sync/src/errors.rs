use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

/// Which side of the copy a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreRole {
    Source,
    Destination,
}

impl fmt::Display for StoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreRole::Source => f.write_str("source"),
            StoreRole::Destination => f.write_str("destination"),
        }
    }
}

/// Top-level error type returned by the synchronizer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid arguments or configuration; raised before any connection is opened.
    #[error("configuration error: {message}")]
    Configuration { message: Cow<'static, str> },

    /// A store could not be reached or rejected the credentials.
    #[error("cannot connect to {role} redis at {endpoint}: {message}")]
    Connection {
        role: StoreRole,
        endpoint: String,
        message: String,
    },

    /// The key holds a type the copier does not know how to write.
    #[error("unsupported type '{type_name}' for key '{key}'")]
    UnsupportedType { key: String, type_name: String },

    /// The required marker key is absent from the source.
    #[error("source does not contain the marker key '{key}'; refusing to sync from it")]
    MissingMarker { key: String },

    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A reply did not have the shape the command promises.
    #[error("unexpected reply: {message}")]
    UnexpectedReply { message: Cow<'static, str> },
}

impl SyncError {
    pub fn configuration(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn connection(role: StoreRole, endpoint: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Connection {
            role,
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        }
    }

    pub fn unexpected_reply(message: impl Into<Cow<'static, str>>) -> Self {
        Self::UnexpectedReply {
            message: message.into(),
        }
    }

    /// Whether the error ends the run even under a continue-on-error policy.
    ///
    /// A dropped connection would fail every remaining key, so it is treated
    /// like a connection error rather than a per-key failure.
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::Configuration { .. } | SyncError::Connection { .. } | SyncError::MissingMarker { .. } => true,
            SyncError::Redis(err) => err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal(),
            SyncError::UnsupportedType { .. } | SyncError::UnexpectedReply { .. } => false,
        }
    }
}
