//! Coalesces bursts of triggers into one delayed firing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Default)]
struct Pending {
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// A cancellable delayed task that restarts on every trigger.
///
/// Only the last trigger of a burst fires. A trigger that lands exactly as
/// the timer fires can still let one redundant firing through.
pub struct Debouncer {
    delay: Duration,
    pending: Arc<Mutex<Pending>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(Pending::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)start the quiet period; `fire` runs on its own task once it elapses.
    pub async fn trigger<F>(&self, fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock().await;
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }
        pending.generation += 1;
        let generation = pending.generation;

        let shared = self.pending.clone();
        let delay = self.delay;
        pending.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut pending = shared.lock().await;
                if pending.generation != generation {
                    return;
                }
                pending.timer = None;
            }
            debug!(generation, "Debounce timer fired");
            // Detached so a later trigger cannot abort work already under way.
            tokio::spawn(fire);
        }));
    }

    /// Drop the pending timer without firing it.
    pub async fn cancel_pending(&self) {
        let mut pending = self.pending.lock().await;
        if let Some(timer) = pending.timer.take() {
            timer.abort();
            debug!("Debounce timer cancelled");
        }
        pending.generation += 1;
    }

    pub async fn is_pending(&self) -> bool {
        self.pending.lock().await.timer.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.try_lock() {
            if let Some(timer) = pending.timer.take() {
                timer.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn bump(count: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let count = count.clone();
        async move {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let count = counter();

        for _ in 0..5 {
            debouncer.trigger(bump(&count)).await;
            sleep(Duration::from_millis(100)).await;
        }
        sleep(Duration::from_secs(3)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_period_restarts() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let count = counter();

        debouncer.trigger(bump(&count)).await;
        sleep(Duration::from_millis(500)).await;
        debouncer.trigger(bump(&count)).await;

        sleep(Duration::from_millis(700)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(400)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let count = counter();

        debouncer.trigger(bump(&count)).await;
        assert!(debouncer.is_pending().await);
        debouncer.cancel_pending().await;
        sleep(Duration::from_secs(2)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_fire_separately() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let count = counter();

        debouncer.trigger(bump(&count)).await;
        sleep(Duration::from_secs(2)).await;
        debouncer.trigger(bump(&count)).await;
        sleep(Duration::from_secs(2)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
