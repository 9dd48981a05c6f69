//! Observer handles and pools.
//!
//! An [`Observer`] is a guard for one hub registration. It unregisters when
//! invalidated explicitly, when its owning pool is torn down, or when it is
//! dropped, whichever comes first. It never keeps the hub alive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::{debug, trace};

use crate::hub::{Hub, ListenerToken};

/// One active subscription.
#[derive(Debug)]
#[must_use = "dropping an Observer unregisters it immediately"]
pub struct Observer {
    hub: Weak<dyn Hub>,
    token: ListenerToken,
    channel: String,
    invalidated: AtomicBool,
}

impl Observer {
    pub(crate) fn new(hub: &Arc<dyn Hub>, token: ListenerToken, channel: impl Into<String>) -> Self {
        Self {
            hub: Arc::downgrade(hub),
            token,
            channel: channel.into(),
            invalidated: AtomicBool::new(false),
        }
    }

    /// The hub token backing this observer.
    pub const fn token(&self) -> ListenerToken {
        self.token
    }

    /// The channel this observer listens on.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// False once invalidated or once the hub has gone away.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.invalidated.load(Ordering::Acquire) && self.hub.strong_count() > 0
    }

    /// Unregister from the hub.
    ///
    /// Idempotent. A no-op if the hub has already been dropped. Once this
    /// returns no new callback is started for this observer; one already
    /// running on another thread may still finish.
    pub fn invalidate(&self) {
        if self.invalidated.swap(true, Ordering::AcqRel) {
            return;
        }

        match self.hub.upgrade() {
            Some(hub) => {
                hub.remove_listener(self.token);
                debug!(channel = %self.channel, token = %self.token, "Observer invalidated");
            }
            None => trace!(channel = %self.channel, "Observer outlived its hub"),
        }
    }

    /// Hand this observer to `pool`, which invalidates it on teardown.
    pub fn invalidated_by(self, pool: &ObserverPool) {
        pool.add(self);
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.invalidate();
    }
}

/// Batch owner for observers.
///
/// `clear` tears down the current members and leaves the pool usable;
/// `dispose` (or dropping the pool) is the final teardown.
#[derive(Debug, Default)]
pub struct ObserverPool {
    members: Mutex<Vec<Observer>>,
}

impl ObserverPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an observer.
    pub fn add(&self, observer: Observer) {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if the pool holds no observers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invalidate every member and empty the pool. Returns how many were invalidated.
    ///
    /// Members are invalidated after the lock is released, so an
    /// invalidation that re-enters the pool cannot deadlock.
    pub fn clear(&self) -> usize {
        let drained = std::mem::take(
            &mut *self.members.lock().unwrap_or_else(PoisonError::into_inner),
        );

        let count = drained.len();
        for observer in drained {
            observer.invalidate();
        }
        if count > 0 {
            debug!(count, "Observer pool cleared");
        }
        count
    }

    /// Final teardown. Returns how many members were invalidated.
    pub fn dispose(self) -> usize {
        self.clear()
    }
}

impl Extend<Observer> for ObserverPool {
    fn extend<I: IntoIterator<Item = Observer>>(&mut self, iter: I) {
        self.members
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(iter);
    }
}

impl Drop for ObserverPool {
    fn drop(&mut self) {
        self.clear();
    }
}
