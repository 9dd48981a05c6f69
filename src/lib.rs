//! # noticekit - typed notifications over a broadcast hub
//!
//! noticekit lets a program declare a named notification with a statically
//! known payload type, post values under that name, and observe it with a
//! callback that receives the decoded payload instead of an untyped
//! attribute map.
//!
//! ## Core Concepts
//!
//! - **EventName**: a channel identifier bound to a payload type and a payload form
//!   (box, custom decode, structured, signal)
//! - **Hub**: the untyped multicast facility underneath; [`LocalHub`] is the in-process one
//! - **Center**: the typed facade for posting, observing and streaming on one hub
//! - **Observer**: the guard for one registration; dropping it unregisters
//! - **ObserverPool**: batch ownership of observers, torn down together
//!
//! ## Usage
//!
//! ```
//! use noticekit::{Center, EventName, ObserverPool};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! static DOWNLOADED: EventName<u32> = EventName::new("downloaded");
//!
//! let center = Center::new();
//! let pool = ObserverPool::new();
//! let total = Arc::new(AtomicU32::new(0));
//!
//! let sum = Arc::clone(&total);
//! center
//!     .observe(&DOWNLOADED, move |bytes| {
//!         sum.fetch_add(bytes, Ordering::SeqCst);
//!     })
//!     .invalidated_by(&pool);
//!
//! center.post(&DOWNLOADED, 512);
//! pool.clear();
//! center.post(&DOWNLOADED, 512);
//!
//! assert_eq!(total.load(Ordering::SeqCst), 512);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod attributes;
pub mod center;
pub mod config;
pub mod error;
pub mod hub;
pub mod name;
pub mod notice;
pub mod observer;
pub mod queue;

/// Async stream adapter.
#[cfg(feature = "stream")]
pub mod stream;

pub use attributes::{AttributeMap, AttributeValue, FromAttributes, PAYLOAD_KEY};
pub use center::{Center, ObserveOptions};
pub use config::NoticeConfig;
pub use error::{DecodeError, EncodeError, NoticeError, NoticeResult};
pub use hub::{Hub, ListenerSpec, ListenerToken, LocalHub, Notification, RawListener, SenderTag};
pub use name::{DecodeFn, EventName, PayloadForm};
pub use notice::Notice;
pub use observer::{Observer, ObserverPool};
pub use queue::DispatchQueue;

#[cfg(feature = "stream")]
pub use stream::NoticeStream;
