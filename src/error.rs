//! Error types for noticekit.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! the exact failure. Decode failures are mostly swallowed by the callback
//! path and only surface through streams; encode failures are programmer
//! errors and surface through `Center::try_post`.

use thiserror::Error;

/// An attribute map did not have the shape a payload decoder expected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Notification carried no attribute map")]
    MissingAttributes,

    #[error("Attribute '{key}' is missing")]
    MissingKey {
        key: String,
    },

    #[error("Attribute '{key}' does not hold a value of type {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
    },

    #[error("Structured payload could not be decoded: {message}")]
    Structured {
        message: String,
    },

    #[error("Custom decoder rejected attributes: {message}")]
    Custom {
        message: String,
    },
}

impl DecodeError {
    /// Creates a custom decoder error.
    #[must_use]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// Creates a missing-key error.
    #[must_use]
    pub fn missing_key(key: impl Into<String>) -> Self {
        Self::MissingKey { key: key.into() }
    }
}

/// A payload could not be turned into an attribute map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("Structured payload must serialize to a JSON object, got {kind}")]
    NotAnObject {
        kind: &'static str,
    },

    #[error("Failed to serialize payload: {message}")]
    Serialize {
        message: String,
    },
}

/// Top-level error type for noticekit.
#[derive(Debug, Error)]
pub enum NoticeError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error on channel '{channel}': {source}")]
    Encode {
        channel: String,
        #[source]
        source: EncodeError,
    },

    #[error("Failed to spawn dispatch queue '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {message}")]
    Config {
        message: String,
    },
}

impl NoticeError {
    /// Returns true if this is a decode error.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// Returns true if this is an encode error.
    #[must_use]
    pub const fn is_encode(&self) -> bool {
        matches!(self, Self::Encode { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

/// Result type alias for noticekit operations.
pub type NoticeResult<T> = Result<T, NoticeError>;
