//! Coalescing debouncer for side-effect targets.
//!
//! Each durable target gets its own `Debouncer`: submitting a snapshot
//! replaces whatever was pending and restarts the timer, so when the
//! window finally elapses only the most recent snapshot is flushed.
//! Dropping intermediates is safe because snapshots are full state,
//! not deltas.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

type FlushFn<T> = Arc<dyn Fn(T) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Debounced, coalescing dispatcher to a single flush function.
pub struct Debouncer<T> {
    delay: Duration,
    pending: Arc<Mutex<Option<T>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    flush: FlushFn<T>,
}

impl<T: Clone + Send + 'static> Debouncer<T> {
    /// Build a debouncer around an async flush function.
    pub fn new<F, Fut>(delay: Duration, flush: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            delay,
            pending: Arc::new(Mutex::new(None)),
            timer: Mutex::new(None),
            flush: Arc::new(move |value| Box::pin(flush(value))),
        }
    }

    /// Replace the pending value and restart the timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, value: T) {
        {
            let mut pending = self.pending.lock().expect("debounce lock poisoned");
            *pending = Some(value);
        }

        let mut timer = self.timer.lock().expect("debounce lock poisoned");
        if let Some(handle) = timer.take() {
            handle.abort();
        }

        let pending = Arc::clone(&self.pending);
        let flush = Arc::clone(&self.flush);
        let delay = self.delay;
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let value = pending.lock().expect("debounce lock poisoned").take();
            if let Some(value) = value {
                flush(value).await;
            }
        }));
    }

    /// Drop any pending value and stop the timer.
    pub fn cancel(&self) {
        let mut timer = self.timer.lock().expect("debounce lock poisoned");
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        let mut pending = self.pending.lock().expect("debounce lock poisoned");
        *pending = None;
    }

    /// Flush any pending value immediately, skipping the timer.
    pub async fn flush_now(&self) {
        {
            let mut timer = self.timer.lock().expect("debounce lock poisoned");
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
        let value = self.pending.lock().expect("debounce lock poisoned").take();
        if let Some(value) = value {
            (self.flush)(value).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    #[tokio::test]
    async fn test_only_latest_value_flushes() {
        let seen: Arc<AsyncMutex<Vec<u32>>> = Arc::new(AsyncMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let debouncer = Debouncer::new(Duration::from_millis(20), move |value: u32| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().await.push(value);
            }
        });

        debouncer.submit(1);
        debouncer.submit(2);
        debouncer.submit(3);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(*seen.lock().await, vec![3]);
    }

    #[tokio::test]
    async fn test_each_window_flushes_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let debouncer = Debouncer::new(Duration::from_millis(10), move |_: u32| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        debouncer.submit(1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        debouncer.submit(2);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_drops_pending() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let debouncer = Debouncer::new(Duration::from_millis(10), move |_: u32| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        debouncer.submit(1);
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_flush_now_skips_the_timer() {
        let seen: Arc<AsyncMutex<Vec<u32>>> = Arc::new(AsyncMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let debouncer = Debouncer::new(Duration::from_secs(3600), move |value: u32| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().await.push(value);
            }
        });

        debouncer.submit(9);
        debouncer.flush_now().await;
        assert_eq!(*seen.lock().await, vec![9]);

        // Nothing left pending afterwards.
        debouncer.flush_now().await;
        assert_eq!(*seen.lock().await, vec![9]);
    }
}
