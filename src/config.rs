//! Tunables for centers, streams and dispatch queues.

use serde::{Deserialize, Serialize};

use crate::error::{NoticeError, NoticeResult};

/// Default per-stream buffer capacity.
pub const DEFAULT_STREAM_CAPACITY: usize = 1024;

/// Default dispatch queue backlog.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Configuration for a [`Center`](crate::Center).
///
/// Zero capacities are treated as 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeConfig {
    /// Max decoded values buffered per stream before deliveries are dropped.
    pub stream_capacity: usize,
    /// Max pending jobs for queues created through [`Center::queue`](crate::Center::queue).
    pub queue_capacity: usize,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl NoticeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`NoticeError::Config`] if the input is not a valid config object.
    pub fn from_json_str(input: &str) -> NoticeResult<Self> {
        let value: serde_json::Value = serde_json::from_str(input).map_err(|e| NoticeError::Config {
            message: e.to_string(),
        })?;
        if !value.is_object() {
            return Err(NoticeError::Config {
                message: "expected a JSON object".to_string(),
            });
        }
        serde_json::from_value(value).map_err(|e| NoticeError::Config {
            message: e.to_string(),
        })
    }

    /// Set the per-stream buffer capacity.
    #[must_use]
    pub fn with_stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity;
        self
    }

    /// Set the dispatch queue backlog.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[cfg_attr(not(feature = "stream"), allow(dead_code))]
    pub(crate) fn effective_stream_capacity(&self) -> usize {
        self.stream_capacity.max(1)
    }

    pub(crate) fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = NoticeConfig::default();
        assert_eq!(cfg.stream_capacity, DEFAULT_STREAM_CAPACITY);
        assert_eq!(cfg.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg = NoticeConfig::from_json_str(r#"{"stream_capacity": 8}"#).unwrap();
        assert_eq!(cfg.stream_capacity, 8);
        assert_eq!(cfg.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_non_object_is_config_error() {
        let err = NoticeConfig::from_json_str("[1, 2]").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_mistyped_field_is_config_error() {
        let err = NoticeConfig::from_json_str(r#"{"stream_capacity": "x"}"#).unwrap_err();
        assert!(err.is_config());
        assert!(NoticeConfig::from_json_str("{").unwrap_err().is_config());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cfg = NoticeConfig::default()
            .with_stream_capacity(0)
            .with_queue_capacity(0);
        assert_eq!(cfg.effective_stream_capacity(), 1);
        assert_eq!(cfg.effective_queue_capacity(), 1);
    }
}
