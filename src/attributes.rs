//! Untyped attribute maps carried by notifications.
//!
//! An attribute map is the payload carrier exchanged with a hub. Values are
//! either type-erased boxes (checked by downcast when read back) or
//! structured JSON produced by the serde codec.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::DecodeError;

/// Reserved key under which box-form payloads are stored.
pub const PAYLOAD_KEY: &str = "noticekit.payload";

/// A single attribute value.
///
/// # Examples
///
/// ```
/// use noticekit::AttributeValue;
///
/// let boxed = AttributeValue::boxed(42_i64);
/// let structured = AttributeValue::Structured(serde_json::json!("hello"));
///
/// assert_eq!(boxed.downcast_ref::<i64>(), Some(&42));
/// assert!(boxed.downcast_ref::<u8>().is_none());
/// assert!(structured.is_structured());
/// ```
#[derive(Clone)]
pub enum AttributeValue {
    /// A type-erased value, delivered by reference.
    Boxed(Arc<dyn Any + Send + Sync>),
    /// A JSON value.
    Structured(serde_json::Value),
}

impl AttributeValue {
    /// Boxes an arbitrary value.
    pub fn boxed<T: Any + Send + Sync>(value: T) -> Self {
        Self::Boxed(Arc::new(value))
    }

    /// True for [`AttributeValue::Boxed`].
    #[must_use]
    pub const fn is_boxed(&self) -> bool {
        matches!(self, Self::Boxed(_))
    }

    /// True for [`AttributeValue::Structured`].
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }

    /// Attempts to view a boxed value as `T`.
    ///
    /// Returns `None` for structured values and for boxes holding another type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Boxed(v) => v.as_ref().downcast_ref::<T>(),
            Self::Structured(_) => None,
        }
    }

    /// The JSON value, if structured.
    #[must_use]
    pub const fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Structured(v) => Some(v),
            Self::Boxed(_) => None,
        }
    }

    /// Returns a human-readable kind name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Boxed(_) => "boxed",
            Self::Structured(_) => "structured",
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boxed(_) => f.write_str("Boxed(..)"),
            Self::Structured(v) => f.debug_tuple("Structured").field(v).finish(),
        }
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }
}

/// String-keyed map of attribute values.
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    entries: HashMap<String, AttributeValue>,
}

impl AttributeMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map holding a single box-form payload under [`PAYLOAD_KEY`].
    #[must_use]
    pub fn with_payload<T: Any + Send + Sync>(value: T) -> Self {
        let mut map = Self::new();
        map.insert(PAYLOAD_KEY, AttributeValue::boxed(value));
        map
    }

    /// Insert an attribute, returning the previous value under `key`.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// Insert a boxed attribute.
    pub fn insert_boxed<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), AttributeValue::boxed(value));
    }

    /// Entry under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.get(key)
    }

    /// True if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Box-form payload, if present and of type `T`.
    #[must_use]
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.get(PAYLOAD_KEY).and_then(AttributeValue::downcast_ref::<T>)
    }

    /// Typed read of a boxed attribute.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MissingKey`] if the key is absent and
    /// [`DecodeError::TypeMismatch`] if it holds something other than a boxed `T`.
    pub fn boxed<T: Any>(&self, key: &str) -> Result<&T, DecodeError> {
        let value = self.get(key).ok_or_else(|| DecodeError::missing_key(key))?;
        value.downcast_ref::<T>().ok_or_else(|| DecodeError::TypeMismatch {
            key: key.to_string(),
            expected: type_name::<T>(),
        })
    }

    /// Typed read of an attribute that may be boxed or structured.
    ///
    /// Boxed values are cloned out when they hold exactly `T`; structured
    /// values are deserialized.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when the key is absent or neither
    /// representation yields a `T`.
    pub fn decode<T>(&self, key: &str) -> Result<T, DecodeError>
    where
        T: Any + Clone + DeserializeOwned,
    {
        match self.get(key) {
            None => Err(DecodeError::missing_key(key)),
            Some(AttributeValue::Structured(v)) => {
                T::deserialize(v).map_err(|e| DecodeError::Structured {
                    message: format!("attribute '{key}': {e}"),
                })
            }
            Some(boxed) => boxed
                .downcast_ref::<T>()
                .cloned()
                .ok_or_else(|| DecodeError::TypeMismatch {
                    key: key.to_string(),
                    expected: type_name::<T>(),
                }),
        }
    }

    /// Collects every structured attribute into one JSON object.
    pub(crate) fn structured_object(&self) -> serde_json::Map<String, serde_json::Value> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_structured().map(|s| (k.clone(), s.clone())))
            .collect()
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Payloads that know how to read themselves from an attribute map.
///
/// Useful for notifications produced by code outside this crate, where the
/// attributes are laid out by the producer rather than by a box or codec.
pub trait FromAttributes: Sized {
    /// Decode `Self` from the attributes of one notification.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when the attributes do not describe a `Self`.
    fn from_attributes(attributes: &AttributeMap) -> Result<Self, DecodeError>;
}
