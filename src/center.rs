//! The typed facade over a hub.
//!
//! A [`Center`] wraps exactly one hub. Producers `post` typed values, the
//! center encodes them per the name's payload form and hands the raw
//! notification to the hub. Consumers `observe` with a typed callback; each
//! raw delivery is decoded and the callback only sees successful decodes.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{debug, error, trace};

use crate::config::NoticeConfig;
use crate::error::{NoticeError, NoticeResult};
use crate::hub::{Hub, ListenerSpec, LocalHub, Notification, RawListener, SenderTag};
use crate::name::{Decoded, EventName, PayloadForm};
use crate::notice::Notice;
use crate::observer::Observer;
use crate::queue::DispatchQueue;

/// Registration options for [`Center::observe_with`].
#[derive(Debug, Clone, Default)]
pub struct ObserveOptions {
    /// Only deliveries posted from this sender.
    pub sender: Option<SenderTag>,
    /// Run the callback on this queue instead of the posting thread.
    pub queue: Option<DispatchQueue>,
}

impl ObserveOptions {
    /// Any sender, posting thread.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only deliveries posted from `sender`.
    #[must_use]
    pub fn from_sender(mut self, sender: SenderTag) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Run callbacks on `queue`.
    #[must_use]
    pub fn on_queue(mut self, queue: DispatchQueue) -> Self {
        self.queue = Some(queue);
        self
    }
}

/// Typed notification center.
///
/// Cloning a center shares its hub. Centers built with [`Center::new`] each
/// own a fresh [`LocalHub`] and are isolated from one another.
#[derive(Clone)]
pub struct Center {
    hub: Arc<dyn Hub>,
    config: NoticeConfig,
}

static SHARED: OnceLock<Center> = OnceLock::new();

impl Center {
    /// A center over a fresh [`LocalHub`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(NoticeConfig::default())
    }

    /// A center over a fresh [`LocalHub`] with custom tunables.
    #[must_use]
    pub fn with_config(config: NoticeConfig) -> Self {
        Self::with_hub(Arc::new(LocalHub::new()), config)
    }

    /// A center over an existing hub.
    pub fn from_hub<H: Hub>(hub: Arc<H>) -> Self {
        Self::with_hub(hub, NoticeConfig::default())
    }

    /// A center over `hub` with custom tunables.
    #[must_use]
    pub fn with_hub(hub: Arc<dyn Hub>, config: NoticeConfig) -> Self {
        Self { hub, config }
    }

    /// The process-wide center.
    pub fn shared() -> &'static Self {
        SHARED.get_or_init(Self::new)
    }

    /// The underlying hub.
    #[must_use]
    pub fn hub(&self) -> &Arc<dyn Hub> {
        &self.hub
    }

    /// This center's tunables.
    #[must_use]
    pub const fn config(&self) -> &NoticeConfig {
        &self.config
    }

    /// Spawn a dispatch queue sized by this center's config.
    ///
    /// # Errors
    ///
    /// Returns [`NoticeError::Spawn`] if the worker thread cannot be started.
    pub fn queue(&self, name: impl Into<String>) -> NoticeResult<DispatchQueue> {
        DispatchQueue::with_capacity(name, self.config.effective_queue_capacity())
    }

    /// Broadcast `value` on `name`'s channel.
    ///
    /// A structured payload that fails to encode is a programming error:
    /// this panics in debug builds and logs in release builds. Use
    /// [`Center::try_post`] to handle it instead.
    pub fn post<V>(&self, name: &EventName<V>, value: V)
    where
        V: Any + Clone + Send + Sync,
    {
        self.post_or_report(name, value, None);
    }

    /// Like [`Center::post`], tagged with a sender.
    pub fn post_from<V>(&self, name: &EventName<V>, value: V, sender: &SenderTag)
    where
        V: Any + Clone + Send + Sync,
    {
        self.post_or_report(name, value, Some(sender.clone()));
    }

    /// Broadcast `value`, surfacing encode failures.
    ///
    /// # Errors
    ///
    /// Returns [`NoticeError::Encode`] if a structured payload cannot be
    /// encoded; nothing is posted in that case.
    pub fn try_post<V>(&self, name: &EventName<V>, value: V) -> NoticeResult<()>
    where
        V: Any + Clone + Send + Sync,
    {
        self.post_inner(name, value, None)
    }

    /// Like [`Center::try_post`], tagged with a sender.
    ///
    /// # Errors
    ///
    /// Returns [`NoticeError::Encode`] if a structured payload cannot be encoded.
    pub fn try_post_from<V>(
        &self,
        name: &EventName<V>,
        value: V,
        sender: &SenderTag,
    ) -> NoticeResult<()>
    where
        V: Any + Clone + Send + Sync,
    {
        self.post_inner(name, value, Some(sender.clone()))
    }

    /// Broadcast a payload-less notification.
    pub fn notify(&self, name: &EventName<()>) {
        self.post(name, ());
    }

    /// Like [`Center::notify`], tagged with a sender.
    pub fn notify_from(&self, name: &EventName<()>, sender: &SenderTag) {
        self.post_from(name, (), sender);
    }

    /// Observe `name` on any sender, on the posting thread.
    pub fn observe<V, F>(&self, name: &EventName<V>, callback: F) -> Observer
    where
        V: Any + Clone + Send + Sync,
        F: Fn(V) + Send + Sync + 'static,
    {
        self.observe_with(name, ObserveOptions::default(), callback)
    }

    /// Observe `name` with a sender filter and/or a dispatch queue.
    ///
    /// The registration is live before this returns. Deliveries that fail to
    /// decode are dropped, except under a structured name, where a decode
    /// failure is a programming error: it panics in debug builds and logs at
    /// error level in release builds.
    pub fn observe_with<V, F>(
        &self,
        name: &EventName<V>,
        options: ObserveOptions,
        callback: F,
    ) -> Observer
    where
        V: Any + Clone + Send + Sync,
        F: Fn(V) + Send + Sync + 'static,
    {
        let typed = name.clone();
        let structured = name.form() == PayloadForm::Structured;
        let listener: RawListener = Arc::new(move |n: &Notification| match typed.decode(n) {
            Decoded::Value(v) => callback(v),
            Decoded::Skip => trace!(channel = %n.channel, "Delivery skipped: payload type mismatch"),
            Decoded::Failed(err) if structured => {
                error!(channel = %n.channel, error = %err, "Structured payload could not be decoded");
                if cfg!(debug_assertions) {
                    panic!("noticekit: structured payload on {} could not be decoded: {err}", n.channel);
                }
            }
            Decoded::Failed(err) => {
                debug!(channel = %n.channel, error = %err, "Delivery dropped: decode failed");
            }
        });

        let observer = self.register(name.as_str(), options.sender, options.queue, listener);
        trace!(channel = %name, form = ?name.form(), "Observing");
        observer
    }

    /// Broadcast a [`Notice`] payload.
    pub fn post_notice<N: Notice>(&self, value: N::Payload) {
        self.post(&N::event_name(), value);
    }

    /// Observe a [`Notice`].
    pub fn observe_notice<N, F>(&self, callback: F) -> Observer
    where
        N: Notice,
        F: Fn(N::Payload) + Send + Sync + 'static,
    {
        self.observe(&N::event_name(), callback)
    }

    pub(crate) fn register(
        &self,
        channel: &str,
        sender: Option<SenderTag>,
        queue: Option<DispatchQueue>,
        listener: RawListener,
    ) -> Observer {
        let spec = ListenerSpec {
            channel: channel.to_string(),
            sender,
            queue,
        };
        let token = self.hub.add_listener(spec, listener);
        Observer::new(&self.hub, token, channel)
    }

    fn post_or_report<V>(&self, name: &EventName<V>, value: V, sender: Option<SenderTag>)
    where
        V: Any + Clone + Send + Sync,
    {
        if let Err(err) = self.post_inner(name, value, sender) {
            error!(channel = %name, error = %err, "Payload could not be encoded, nothing posted");
            if cfg!(debug_assertions) {
                panic!("noticekit: {err}");
            }
        }
    }

    fn post_inner<V>(
        &self,
        name: &EventName<V>,
        value: V,
        sender: Option<SenderTag>,
    ) -> NoticeResult<()>
    where
        V: Any + Clone + Send + Sync,
    {
        let attributes = name.encode(value).map_err(|source| NoticeError::Encode {
            channel: name.as_str().to_string(),
            source,
        })?;

        self.hub
            .post(Notification::new(name.as_str(), attributes).with_sender(sender));
        Ok(())
    }
}

impl Default for Center {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Hub> From<Arc<H>> for Center {
    fn from(hub: Arc<H>) -> Self {
        Self::from_hub(hub)
    }
}

impl fmt::Debug for Center {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Center")
            .field("listeners", &self.hub.listener_count())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeMap;
    use crate::error::DecodeError;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Login {
        user: String,
        attempts: u8,
    }

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let c = Arc::new(AtomicUsize::new(0));
        (Arc::clone(&c), c)
    }

    #[test]
    fn test_post_and_observe_box_form() {
        let center = Center::new();
        let name = EventName::<i64>::new("evt-int");
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&received);
        let observer = center.observe(&name, move |v| sink.lock().unwrap().push(v));

        center.post(&name, 42);
        observer.invalidate();
        center.post(&name, 42);

        assert_eq!(*received.lock().unwrap(), vec![42]);
    }

    #[test]
    fn test_structured_roundtrip() {
        let center = Center::new();
        let name = EventName::<Login>::structured("login");
        let got = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&got);
        let _observer = center.observe(&name, move |v| *sink.lock().unwrap() = Some(v));

        let login = Login {
            user: "ada".to_string(),
            attempts: 2,
        };
        center.post(&name, login.clone());
        assert_eq!(got.lock().unwrap().clone(), Some(login));
    }

    #[test]
    fn test_try_post_surfaces_encode_failure() {
        let center = Center::new();
        let name = EventName::<Vec<u8>>::structured("bytes");
        let (count, c) = counter();
        let _observer = center.observe(&name, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let err = center.try_post(&name, vec![1, 2, 3]).unwrap_err();
        assert!(err.is_encode());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "noticekit")]
    fn test_post_panics_on_encode_failure_in_debug() {
        let center = Center::new();
        let name = EventName::<String>::structured("scalar");
        center.post(&name, "not an object".to_string());
    }

    fn post_malformed_login(center: &Center) -> Arc<AtomicUsize> {
        let name = EventName::<Login>::structured("login-malformed");
        let (count, c) = counter();
        let _observer = center.observe(&name, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let mut attributes = AttributeMap::new();
        attributes.insert("user", serde_json::json!(7));
        center
            .hub()
            .post(Notification::new("login-malformed", Some(attributes)));
        count
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "could not be decoded")]
    fn test_structured_decode_failure_panics_in_debug() {
        let center = Center::new();
        post_malformed_login(&center);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_structured_decode_failure_is_not_delivered_in_release() {
        let center = Center::new();
        let count = post_malformed_login(&center);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_custom_decoder_failure_drops_delivery() {
        let center = Center::new();
        let name = EventName::<u32>::with_decoder("evt-custom", |_m: &AttributeMap| {
            Err(DecodeError::custom("always fails"))
        });
        let (count, c) = counter();
        let _observer = center.observe(&name, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let mut attributes = AttributeMap::new();
        attributes.insert("n", serde_json::json!(1));
        center
            .hub()
            .post(Notification::new("evt-custom", Some(attributes)));
        center.hub().post(Notification::new("evt-custom", None));

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_signal_notify() {
        let center = Center::new();
        let name = EventName::signal("did-become-active");
        let (count, c) = counter();
        let _observer = center.observe(&name, move |()| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        center.notify(&name);
        center.notify(&name);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_sender_filtering() {
        let center = Center::new();
        let name = EventName::<u8>::new("evt-sender");
        let window = SenderTag::new(Arc::new("window"));
        let other = SenderTag::new(Arc::new("other"));

        let (count, c) = counter();
        let _observer = center.observe_with(
            &name,
            ObserveOptions::new().from_sender(window.clone()),
            move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            },
        );

        center.post(&name, 1);
        center.post_from(&name, 1, &other);
        center.post_from(&name, 1, &window);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_queue_delivery_runs_on_queue_thread() {
        let center = Center::new();
        let queue = center.queue("noticekit-center-queue").unwrap();
        let name = EventName::<u8>::new("evt-queued");
        let threads = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&threads);
        let _observer = center.observe_with(&name, ObserveOptions::new().on_queue(queue.clone()), move |_| {
            let t = std::thread::current().name().map(str::to_string);
            sink.lock().unwrap().push(t);
        });

        center.post(&name, 7);
        queue.flush();

        assert_eq!(
            *threads.lock().unwrap(),
            vec![Some("noticekit-center-queue".to_string())]
        );
    }

    #[test]
    fn test_observer_can_invalidate_itself_from_callback() {
        let center = Center::new();
        let name = EventName::<u8>::new("evt-reentrant");
        let slot: Arc<Mutex<Option<Observer>>> = Arc::default();
        let (count, c) = counter();

        let slot_ref = Arc::clone(&slot);
        let observer = center.observe(&name, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = slot_ref.lock().unwrap().take() {
                me.invalidate();
            }
        });
        *slot.lock().unwrap() = Some(observer);

        center.post(&name, 1);
        center.post(&name, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(center.hub().listener_count(), 0);
    }

    #[test]
    fn test_from_hub_shares_hub() {
        let hub = Arc::new(LocalHub::new());
        let a = Center::from(Arc::clone(&hub));
        let b = Center::from_hub(hub);
        let name = EventName::<u8>::new("evt-shared-hub");

        let (count, c) = counter();
        let _observer = a.observe(&name, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        b.post(&name, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shared_center_is_singleton() {
        assert!(Arc::ptr_eq(Center::shared().hub(), Center::shared().hub()));
    }
}
