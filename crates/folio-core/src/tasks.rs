//! Cancelable scheduled work: delayed one-shots, intervals, throttling and debouncing
//!
//! Every timer a tracking context owns is a [`TaskHandle`]. Dropping the handle
//! cancels the task, so tearing a context down cannot leave timers behind.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Handle to a spawned task that is cancelled when dropped
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    token: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Run `fut` once after `delay`, unless cancelled first
    pub fn spawn_after<F>(name: &'static str, delay: Duration, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let join = tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {
                    trace!("{} cancelled before firing", name);
                }
                _ = time::sleep(delay) => {
                    fut.await;
                }
            }
        });

        Self {
            name,
            token,
            join: Some(join),
        }
    }

    /// Run `tick` every `period`, first run one period from now
    pub fn spawn_interval<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let join = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = child.cancelled() => {
                        trace!("{} interval stopped", name);
                        return;
                    }
                    _ = interval.tick() => {
                        tick().await;
                    }
                }
            }
        });

        Self {
            name,
            token,
            join: Some(join),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the task ran to completion (fired, or observed its cancellation)
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map(|j| j.is_finished()).unwrap_or(true)
    }

    /// Cancel and wait for the task to observe the cancellation
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Leading-edge throttle: the first call in each window passes, the rest are dropped
#[derive(Debug)]
pub struct Throttle {
    window: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: Mutex::new(None),
        }
    }

    /// Returns true if the caller may proceed now
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let Ok(mut last) = self.last.lock() else {
            return false;
        };
        match *last {
            Some(prev) if now.duration_since(prev) < self.window => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    pub fn reset(&self) {
        if let Ok(mut last) = self.last.lock() {
            *last = None;
        }
    }
}

/// Trailing-edge debouncer: only the last call in a burst runs, `delay` after it
#[derive(Debug)]
pub struct Debouncer {
    name: &'static str,
    delay: Duration,
    pending: Mutex<Option<TaskHandle>>,
}

impl Debouncer {
    pub fn new(name: &'static str, delay: Duration) -> Self {
        Self {
            name,
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedule `fut`, replacing (and cancelling) any call still pending
    pub fn call<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = TaskHandle::spawn_after(self.name, self.delay, fut);
        if let Ok(mut pending) = self.pending.lock() {
            // the previous handle is dropped here, which cancels it
            *pending = Some(handle);
        }
    }

    pub fn cancel(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.take();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .map(|p| p.as_ref().map(|h| !h.is_finished()).unwrap_or(false))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_spawn_after_fires_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _handle = TaskHandle::spawn_after("test", Duration::from_millis(50), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        time::sleep(Duration::from_millis(49)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let handle = TaskHandle::spawn_after("test", Duration::from_millis(50), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(handle);

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticks_until_shutdown() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let handle = TaskHandle::spawn_interval("tick", Duration::from_secs(30), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        time::sleep(Duration::from_secs(95)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        handle.shutdown().await;
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_drops_calls_inside_window() {
        let throttle = Throttle::new(Duration::from_millis(100));
        assert!(throttle.try_acquire());
        assert!(!throttle.try_acquire());

        time::advance(Duration::from_millis(60)).await;
        assert!(!throttle.try_acquire());

        time::advance(Duration::from_millis(40)).await;
        assert!(throttle.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_runs_only_last_call() {
        let runs = Arc::new(Mutex::new(Vec::new()));
        let debouncer = Debouncer::new("resize", Duration::from_millis(250));

        for i in 0..3 {
            let runs = runs.clone();
            debouncer.call(async move {
                runs.lock().unwrap().push(i);
            });
            time::sleep(Duration::from_millis(100)).await;
        }
        assert!(debouncer.is_pending());

        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*runs.lock().unwrap(), vec![2]);
    }
}
