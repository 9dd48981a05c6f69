//! Dispatch queues: execution contexts for observer callbacks.
//!
//! A queue owns one named worker thread fed by a bounded channel. Jobs are
//! run in submission order. Submitting never blocks the poster; when the
//! queue is full the job is dropped and counted.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{error, trace, warn};

use crate::config::DEFAULT_QUEUE_CAPACITY;
use crate::error::{NoticeError, NoticeResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum QueueMsg {
    Run(Job),
    Flush(Sender<()>),
}

struct QueueInner {
    name: String,
    tx: Sender<QueueMsg>,
    dropped_jobs: AtomicU64,
}

/// Serial execution context backed by a worker thread.
///
/// Cloning is cheap; clones submit to the same worker. The worker exits once
/// every clone has been dropped and the backlog is drained.
#[derive(Clone)]
pub struct DispatchQueue {
    inner: Arc<QueueInner>,
}

impl DispatchQueue {
    /// Spawn a queue with the default capacity.
    ///
    /// # Errors
    ///
    /// Returns [`NoticeError::Spawn`] if the worker thread cannot be started.
    pub fn new(name: impl Into<String>) -> NoticeResult<Self> {
        Self::with_capacity(name, DEFAULT_QUEUE_CAPACITY)
    }

    /// Spawn a queue that buffers at most `capacity` pending jobs.
    ///
    /// # Errors
    ///
    /// Returns [`NoticeError::Spawn`] if the worker thread cannot be started.
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> NoticeResult<Self> {
        let name = name.into();
        let (tx, rx) = bounded::<QueueMsg>(capacity.max(1));

        thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(rx))
            .map_err(|source| NoticeError::Spawn {
                name: name.clone(),
                source,
            })?;

        Ok(Self {
            inner: Arc::new(QueueInner {
                name,
                tx,
                dropped_jobs: AtomicU64::new(0),
            }),
        })
    }

    /// The worker thread's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Non-blocking job submission.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self.inner.tx.try_send(QueueMsg::Run(Box::new(job))) {
            Ok(()) => trace!(queue = %self.inner.name, "Job queued"),
            Err(TrySendError::Full(_)) => {
                self.inner.dropped_jobs.fetch_add(1, Ordering::Relaxed);
                warn!(queue = %self.inner.name, "Dispatch queue full, job dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.inner.dropped_jobs.fetch_add(1, Ordering::Relaxed);
                error!(queue = %self.inner.name, "Dispatch queue worker has exited, job dropped");
            }
        }
    }

    /// Block until every job submitted before this call has run.
    ///
    /// Must not be called from the queue's own worker thread.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = bounded::<()>(1);
        if self.inner.tx.send(QueueMsg::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Number of jobs dropped because the queue was full or its worker had exited.
    #[must_use]
    pub fn dropped_jobs(&self) -> u64 {
        self.inner.dropped_jobs.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("name", &self.inner.name)
            .field("dropped_jobs", &self.dropped_jobs())
            .finish()
    }
}

fn worker_loop(rx: Receiver<QueueMsg>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            QueueMsg::Run(job) => job(),
            QueueMsg::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_jobs_run_in_order_on_worker_thread() {
        let queue = DispatchQueue::new("noticekit-test-order").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let seen = Arc::clone(&seen);
            queue.dispatch(move || {
                let name = thread::current().name().map(str::to_string);
                seen.lock().unwrap().push((i, name));
            });
        }
        queue.flush();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 10);
        for (idx, (i, name)) in seen.iter().enumerate() {
            assert_eq!(*i, idx);
            assert_eq!(name.as_deref(), Some("noticekit-test-order"));
        }
    }

    #[test]
    fn test_full_queue_drops_jobs() {
        let queue = DispatchQueue::with_capacity("noticekit-test-full", 1).unwrap();
        let (gate_tx, gate_rx) = bounded::<()>(0);

        // Park the worker so the buffer fills up.
        queue.dispatch(move || {
            let _ = gate_rx.recv();
        });
        for _ in 0..16 {
            queue.dispatch(|| {});
        }
        assert!(queue.dropped_jobs() > 0);

        gate_tx.send(()).unwrap();
        queue.flush();
    }

    #[test]
    fn test_jobs_after_worker_panic_are_dropped() {
        let queue = DispatchQueue::with_capacity("noticekit-test-panic", 1024).unwrap();
        queue.dispatch(|| panic!("job failed"));

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while queue.dropped_jobs() == 0 && std::time::Instant::now() < deadline {
            queue.dispatch(|| {});
            thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(queue.dropped_jobs() > 0);
        queue.flush();
    }

    #[test]
    fn test_clone_shares_worker() {
        let queue = DispatchQueue::new("noticekit-test-clone").unwrap();
        let other = queue.clone();
        assert_eq!(other.name(), "noticekit-test-clone");

        let hits = Arc::new(AtomicU64::new(0));
        let h = Arc::clone(&hits);
        other.dispatch(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        queue.flush();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
