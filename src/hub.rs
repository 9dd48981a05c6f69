//! The broadcast hub contract and the in-process [`LocalHub`].
//!
//! A hub is the untyped multicast facility the typed layer sits on. It knows
//! nothing about payload types: it matches listeners by channel and sender,
//! and hands them the raw [`Notification`].

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::attributes::AttributeMap;
use crate::queue::DispatchQueue;

/// Identity tag for the object a notification is posted from.
///
/// Two tags match iff they point to the same allocation; the tagged value
/// itself is never compared.
#[derive(Clone)]
pub struct SenderTag(Arc<dyn Any + Send + Sync>);

impl SenderTag {
    /// Tag an object by identity.
    pub fn new<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        Self(object)
    }

    /// Identity comparison.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.0).cast::<()>() == Arc::as_ptr(&other.0).cast::<()>()
    }

    /// View the tagged object as `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref().downcast_ref::<T>()
    }
}

impl PartialEq for SenderTag {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for SenderTag {}

impl fmt::Debug for SenderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SenderTag({:p})", Arc::as_ptr(&self.0).cast::<()>())
    }
}

/// A raw delivery.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Raw channel name.
    pub channel: String,
    /// Who posted it, if anyone said.
    pub sender: Option<SenderTag>,
    /// `None` for payload-less posts.
    pub attributes: Option<AttributeMap>,
    /// Wall-clock time of the post.
    pub posted_at: DateTime<Utc>,
}

impl Notification {
    /// An untagged delivery on `channel`.
    #[must_use]
    pub fn new(channel: impl Into<String>, attributes: Option<AttributeMap>) -> Self {
        Self {
            channel: channel.into(),
            sender: None,
            attributes,
            posted_at: Utc::now(),
        }
    }

    /// Tag the delivery with its sender.
    #[must_use]
    pub fn with_sender(mut self, sender: Option<SenderTag>) -> Self {
        self.sender = sender;
        self
    }
}

/// Handle returned by [`Hub::add_listener`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerToken(Uuid);

impl ListenerToken {
    /// Create a new random token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which deliveries a listener receives and where it runs.
#[derive(Debug, Clone)]
pub struct ListenerSpec {
    /// Raw channel name to match.
    pub channel: String,
    /// Only deliveries posted from this sender; `None` accepts any sender.
    pub sender: Option<SenderTag>,
    /// Run the listener on this queue instead of the posting thread.
    pub queue: Option<DispatchQueue>,
}

impl ListenerSpec {
    /// Listen on `channel` from any sender, on the posting thread.
    #[must_use]
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            sender: None,
            queue: None,
        }
    }

    /// Whether a notification falls under this spec.
    #[must_use]
    pub fn matches(&self, notification: &Notification) -> bool {
        if self.channel != notification.channel {
            return false;
        }
        match (&self.sender, &notification.sender) {
            (None, _) => true,
            (Some(want), Some(got)) => want.same_as(got),
            (Some(_), None) => false,
        }
    }
}

/// Untyped listener callback.
pub type RawListener = Arc<dyn Fn(&Notification) + Send + Sync>;

/// An in-process broadcast facility.
///
/// Implementations must be safe to call concurrently, and `remove_listener`
/// must tolerate tokens that are unknown or already removed.
pub trait Hub: Send + Sync + 'static {
    /// Deliver a notification to every matching listener.
    fn post(&self, notification: Notification);

    /// Register a listener. Effective before this returns.
    fn add_listener(&self, spec: ListenerSpec, listener: RawListener) -> ListenerToken;

    /// Unregister a listener. Idempotent.
    fn remove_listener(&self, token: ListenerToken);

    /// Number of registered listeners.
    fn listener_count(&self) -> usize;
}

struct ListenerEntry {
    token: ListenerToken,
    spec: ListenerSpec,
    listener: RawListener,
    active: AtomicBool,
}

impl ListenerEntry {
    fn invoke(&self, notification: &Notification) {
        if self.active.load(Ordering::Acquire) {
            (self.listener)(notification);
        }
    }
}

/// Default hub: an in-process multicast over a listener list.
///
/// Listeners registered without a queue run synchronously on the posting
/// thread, in registration order. Every `LocalHub` is fully isolated from
/// every other.
#[derive(Default)]
pub struct LocalHub {
    listeners: RwLock<Vec<Arc<ListenerEntry>>>,
}

impl LocalHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Hub for LocalHub {
    fn post(&self, notification: Notification) {
        // Snapshot, then call outside the lock so listeners may re-enter the hub.
        let targets: Vec<Arc<ListenerEntry>> = {
            let guard = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            guard
                .iter()
                .filter(|entry| entry.spec.matches(&notification))
                .cloned()
                .collect()
        };

        trace!(
            channel = %notification.channel,
            listeners = targets.len(),
            "Posting notification"
        );

        if targets.is_empty() {
            return;
        }

        let notification = Arc::new(notification);
        for entry in targets {
            match entry.spec.queue.clone() {
                None => entry.invoke(&notification),
                Some(queue) => {
                    let notification = Arc::clone(&notification);
                    queue.dispatch(move || entry.invoke(&notification));
                }
            }
        }
    }

    fn add_listener(&self, spec: ListenerSpec, listener: RawListener) -> ListenerToken {
        let token = ListenerToken::new();
        debug!(channel = %spec.channel, %token, "Listener added");

        let entry = Arc::new(ListenerEntry {
            token,
            spec,
            listener,
            active: AtomicBool::new(true),
        });
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        token
    }

    fn remove_listener(&self, token: ListenerToken) {
        let removed = {
            let mut guard = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
            let idx = guard.iter().position(|entry| entry.token == token);
            idx.map(|idx| guard.remove(idx))
        };

        // Dropped after the lock is released: the listener's captures may
        // themselves touch this hub when they go away.
        if let Some(entry) = removed {
            entry.active.store(false, Ordering::Release);
            debug!(channel = %entry.spec.channel, %token, "Listener removed");
        }
    }

    fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for LocalHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
