//! Typed notifications as an async stream.
//!
//! A [`NoticeStream`] is a single-consumer, lazy, non-restartable sequence of
//! decoded payloads. It stays registered on the hub until it is dropped, until
//! [`NoticeStream::close`] is called, or until a decode failure ends it.
//! Box-form names never fail: deliveries of another type are filtered out.

use std::any::Any;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::Stream;
use tracing::{debug, warn};

use crate::center::Center;
use crate::error::{DecodeError, NoticeResult};
use crate::hub::{Notification, RawListener, SenderTag};
use crate::name::{Decoded, EventName};
use crate::observer::Observer;

/// Stream of decoded payloads for one event name.
///
/// ```
/// use noticekit::{Center, EventName};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let center = Center::new();
/// let name = EventName::<u32>::new("ticks");
/// let mut ticks = center.stream(&name);
///
/// center.post(&name, 1);
/// center.post(&name, 2);
///
/// assert_eq!(ticks.next().await.unwrap().unwrap(), 1);
/// assert_eq!(ticks.next().await.unwrap().unwrap(), 2);
/// # }
/// ```
#[derive(Debug)]
#[must_use = "streams unregister when dropped"]
pub struct NoticeStream<V> {
    rx: mpsc::Receiver<V>,
    /// Terminal decode failure, yielded after the buffered values.
    failure: Arc<Mutex<Option<DecodeError>>>,
    observer: Option<Observer>,
}

impl<V> NoticeStream<V> {
    /// Wait for the next value.
    ///
    /// Returns `Some(Err(_))` once if a delivery fails to decode, then `None`.
    pub async fn next(&mut self) -> Option<NoticeResult<V>> {
        std::future::poll_fn(|cx| self.poll_item(cx)).await
    }

    /// Blocking variant of [`NoticeStream::next`] for synchronous consumers.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async execution context.
    pub fn blocking_next(&mut self) -> Option<NoticeResult<V>> {
        if self.observer.is_none() {
            return None;
        }
        let item = self.rx.blocking_recv();
        self.settle(item)
    }

    /// Next buffered value without waiting.
    pub fn try_next(&mut self) -> Option<NoticeResult<V>> {
        if self.observer.is_none() {
            return None;
        }
        match self.rx.try_recv() {
            Ok(item) => self.settle(Some(item)),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => self.settle(None),
        }
    }

    /// Stop the stream and unregister from the hub.
    pub fn close(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.invalidate();
        }
        self.rx.close();
    }

    /// True once the stream has ended.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.observer.is_none()
    }

    fn poll_item(&mut self, cx: &mut Context<'_>) -> Poll<Option<NoticeResult<V>>> {
        if self.observer.is_none() {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(item) => Poll::Ready(self.settle(item)),
            Poll::Pending => Poll::Pending,
        }
    }

    fn settle(&mut self, item: Option<V>) -> Option<NoticeResult<V>> {
        if let Some(v) = item {
            return Some(Ok(v));
        }
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.close();
        failure.map(|err| {
            debug!(error = %err, "Notice stream terminated by decode failure");
            Err(err.into())
        })
    }
}

impl<V> Unpin for NoticeStream<V> {}

impl<V> Stream for NoticeStream<V> {
    type Item = NoticeResult<V>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_item(cx)
    }
}

impl Center {
    /// Stream `name`'s payloads from any sender.
    pub fn stream<V>(&self, name: &EventName<V>) -> NoticeStream<V>
    where
        V: Any + Clone + Send + Sync,
    {
        self.stream_inner(name, None)
    }

    /// Stream `name`'s payloads posted from `sender`.
    pub fn stream_from<V>(&self, name: &EventName<V>, sender: &SenderTag) -> NoticeStream<V>
    where
        V: Any + Clone + Send + Sync,
    {
        self.stream_inner(name, Some(sender.clone()))
    }

    fn stream_inner<V>(&self, name: &EventName<V>, sender: Option<SenderTag>) -> NoticeStream<V>
    where
        V: Any + Clone + Send + Sync,
    {
        let (tx, rx) = mpsc::channel(self.config().effective_stream_capacity());
        let typed = name.clone();
        // Dropping the sender wakes the consumer once the buffer is drained.
        let tx = Mutex::new(Some(tx));
        let failure = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&failure);
        let listener: RawListener = Arc::new(move |n: &Notification| {
            let mut guard = tx.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(active) = guard.as_ref() else {
                return;
            };
            match typed.decode(n) {
                Decoded::Value(v) => match active.try_send(v) {
                    Ok(()) | Err(TrySendError::Closed(_)) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!(channel = %n.channel, "Notice stream full, delivery dropped");
                    }
                },
                Decoded::Skip => {}
                Decoded::Failed(err) => {
                    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(err);
                    guard.take();
                }
            }
        });

        let observer = self.register(name.as_str(), sender, None, listener);
        NoticeStream {
            rx,
            failure,
            observer: Some(observer),
        }
    }
}
