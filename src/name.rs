//! Typed event names and their payload strategies.
//!
//! An [`EventName<V>`] pairs a raw channel identifier with the payload type
//! `V` and the strategy used to move a `V` through an untyped
//! [`AttributeMap`]:
//!
//! - **box**: the value is stored as-is under [`PAYLOAD_KEY`](crate::PAYLOAD_KEY)
//!   and read back by downcast; a miss is a skipped delivery, never an error.
//! - **custom decode**: a decoder reads the whole map; posting still boxes
//!   the value, and the box is tried when the decoder fails.
//! - **structured**: serde-serializable payloads are flattened into JSON
//!   attributes and deserialized on the way back.
//! - **signal**: `()` payloads with no attributes at all.
//!
//! Names compare by channel only. Two names built with the same identifier
//! but different `V` address the same channel; deliveries between them are
//! skipped (box form) or fail to decode (custom and structured forms).

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::attributes::{AttributeMap, FromAttributes};
use crate::error::{DecodeError, EncodeError};
use crate::hub::Notification;

/// Decoder used by the custom-decode form.
pub type DecodeFn<V> = Arc<dyn Fn(&AttributeMap) -> Result<V, DecodeError> + Send + Sync>;

type EncodeFnPtr<V> = fn(&V) -> Result<AttributeMap, EncodeError>;
type DecodeFnPtr<V> = fn(&AttributeMap) -> Result<V, DecodeError>;

enum Strategy<V> {
    Boxed,
    Custom(DecodeFn<V>),
    Structured {
        encode: EncodeFnPtr<V>,
        decode: DecodeFnPtr<V>,
    },
    Signal(fn() -> V),
}

impl<V> Clone for Strategy<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Boxed => Self::Boxed,
            Self::Custom(f) => Self::Custom(Arc::clone(f)),
            Self::Structured { encode, decode } => Self::Structured {
                encode: *encode,
                decode: *decode,
            },
            Self::Signal(make) => Self::Signal(*make),
        }
    }
}

/// Which strategy a name uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadForm {
    /// Value stored as-is under the payload key.
    Boxed,
    /// Caller-supplied decoder over the attribute map.
    Custom,
    /// Serde round-trip through JSON attributes.
    Structured,
    /// No payload.
    Signal,
}

/// Outcome of decoding one delivery.
pub(crate) enum Decoded<V> {
    Value(V),
    /// Not addressed to this payload type; never an error.
    Skip,
    Failed(DecodeError),
}

/// A channel identifier bound to a payload type.
///
/// # Examples
///
/// ```
/// use noticekit::{Center, EventName};
/// use std::sync::atomic::{AtomicI64, Ordering};
/// use std::sync::Arc;
///
/// static COUNTER_CHANGED: EventName<i64> = EventName::new("counter-changed");
///
/// let center = Center::new();
/// let last = Arc::new(AtomicI64::new(0));
/// let seen = Arc::clone(&last);
/// let observer = center.observe(&COUNTER_CHANGED, move |v| seen.store(v, Ordering::SeqCst));
///
/// center.post(&COUNTER_CHANGED, 42);
/// assert_eq!(last.load(Ordering::SeqCst), 42);
/// observer.invalidate();
/// ```
pub struct EventName<V> {
    raw: Cow<'static, str>,
    strategy: Strategy<V>,
}

impl<V> EventName<V> {
    /// Box-form name.
    #[must_use]
    pub const fn new(raw: &'static str) -> Self {
        Self {
            raw: Cow::Borrowed(raw),
            strategy: Strategy::Boxed,
        }
    }

    /// Box-form name with a runtime identifier.
    #[must_use]
    pub fn named(raw: impl Into<String>) -> Self {
        Self {
            raw: Cow::Owned(raw.into()),
            strategy: Strategy::Boxed,
        }
    }

    /// Custom-decode name.
    pub fn with_decoder<F>(raw: impl Into<Cow<'static, str>>, decode: F) -> Self
    where
        F: Fn(&AttributeMap) -> Result<V, DecodeError> + Send + Sync + 'static,
    {
        Self {
            raw: raw.into(),
            strategy: Strategy::Custom(Arc::new(decode)),
        }
    }

    /// The raw channel identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// This name's payload form.
    #[must_use]
    pub const fn form(&self) -> PayloadForm {
        match self.strategy {
            Strategy::Boxed => PayloadForm::Boxed,
            Strategy::Custom(_) => PayloadForm::Custom,
            Strategy::Structured { .. } => PayloadForm::Structured,
            Strategy::Signal(_) => PayloadForm::Signal,
        }
    }

    /// True if both names address the same channel, whatever their payload types.
    #[must_use]
    pub fn same_channel<U>(&self, other: &EventName<U>) -> bool {
        self.raw == other.raw
    }
}

impl<V: FromAttributes + 'static> EventName<V> {
    /// Custom-decode name using the payload's [`FromAttributes`] impl.
    pub fn decodable(raw: impl Into<Cow<'static, str>>) -> Self {
        Self::with_decoder(raw, V::from_attributes)
    }
}

impl<V: Serialize + DeserializeOwned> EventName<V> {
    /// Structured-codec name.
    #[must_use]
    pub const fn structured(raw: &'static str) -> Self {
        Self {
            raw: Cow::Borrowed(raw),
            strategy: Strategy::Structured {
                encode: encode_structured::<V>,
                decode: decode_structured::<V>,
            },
        }
    }
}

impl EventName<()> {
    /// Payload-less name.
    #[must_use]
    pub const fn signal(raw: &'static str) -> Self {
        Self {
            raw: Cow::Borrowed(raw),
            strategy: Strategy::Signal(unit),
        }
    }
}

const fn unit() {}

impl<V: Any + Clone + Send + Sync> EventName<V> {
    /// Attribute map to post for `value`; `None` for signals.
    pub(crate) fn encode(&self, value: V) -> Result<Option<AttributeMap>, EncodeError> {
        match &self.strategy {
            Strategy::Boxed | Strategy::Custom(_) => Ok(Some(AttributeMap::with_payload(value))),
            Strategy::Structured { encode, .. } => encode(&value).map(Some),
            Strategy::Signal(_) => Ok(None),
        }
    }

    pub(crate) fn decode(&self, notification: &Notification) -> Decoded<V> {
        let attributes = notification.attributes.as_ref();
        match &self.strategy {
            Strategy::Signal(make) => Decoded::Value(make()),
            Strategy::Boxed => match attributes.and_then(AttributeMap::payload::<V>) {
                Some(v) => Decoded::Value(v.clone()),
                None => Decoded::Skip,
            },
            Strategy::Custom(decode) => {
                let Some(attributes) = attributes else {
                    return Decoded::Failed(DecodeError::MissingAttributes);
                };
                match decode(attributes) {
                    Ok(v) => Decoded::Value(v),
                    Err(err) => match attributes.payload::<V>() {
                        Some(v) => Decoded::Value(v.clone()),
                        None => Decoded::Failed(err),
                    },
                }
            }
            Strategy::Structured { decode, .. } => match attributes {
                None => Decoded::Failed(DecodeError::MissingAttributes),
                Some(attributes) => match decode(attributes) {
                    Ok(v) => Decoded::Value(v),
                    Err(err) => Decoded::Failed(err),
                },
            },
        }
    }
}

impl<V> Clone for EventName<V> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            strategy: self.strategy.clone(),
        }
    }
}

impl<V> fmt::Debug for EventName<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventName")
            .field("raw", &self.raw)
            .field("form", &self.form())
            .finish()
    }
}

impl<V> fmt::Display for EventName<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn encode_structured<V: Serialize>(value: &V) -> Result<AttributeMap, EncodeError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(fields)) => Ok(fields.into_iter().collect()),
        Ok(other) => Err(EncodeError::NotAnObject {
            kind: json_kind(&other),
        }),
        Err(e) => Err(EncodeError::Serialize {
            message: e.to_string(),
        }),
    }
}

fn decode_structured<V: DeserializeOwned>(attributes: &AttributeMap) -> Result<V, DecodeError> {
    serde_json::from_value(serde_json::Value::Object(attributes.structured_object())).map_err(|e| {
        DecodeError::Structured {
            message: e.to_string(),
        }
    })
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
