use core::time::Duration;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Limits concurrency and supports temporary pausing of work dispatch.
///
/// Call [`Throttler::acquire`] before each request. At most `max_concurrent` requests
/// run at once. Any task can call [`Throttler::pause_for`] to hold back new requests,
/// e.g. after a rate-limit response. Overlapping pauses resolve to the longest one.
#[derive(Debug)]
pub struct Throttler {
    semaphore: Arc<Semaphore>,
    resume_at: Mutex<Option<Instant>>,
}

impl Throttler {
    /// A new pause must extend an active one by at least this much to replace it.
    const MIN_PAUSE_EXTENSION: Duration = Duration::from_secs(1);

    #[must_use]
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            resume_at: Mutex::new(None),
        })
    }

    /// Wait until unpaused, then take a concurrency slot for as long as the permit lives.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        while let Some(deadline) = self.active_deadline() {
            tokio::time::sleep_until(deadline).await;
        }

        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("semaphore is never closed")
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.active_deadline().is_some()
    }

    /// Hold back new work for `duration`.
    ///
    /// Requests already running are not interrupted. Returns `false` when an equivalent
    /// or longer pause is already active.
    pub fn pause_for(&self, duration: Duration) -> bool {
        let now = Instant::now();
        let new_deadline = now + duration;

        let mut resume_at = self.resume_at.lock().unwrap_or_else(PoisonError::into_inner);
        if resume_at.is_some_and(|existing| existing > now && existing + Self::MIN_PAUSE_EXTENSION >= new_deadline) {
            return false;
        }

        *resume_at = Some(new_deadline);
        true
    }

    fn active_deadline(&self) -> Option<Instant> {
        let resume_at = *self.resume_at.lock().unwrap_or_else(PoisonError::into_inner);
        resume_at.filter(|deadline| *deadline > Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
    async fn limits_concurrency() {
        let throttler = Throttler::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let throttler = Arc::clone(&throttler);
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                tokio::spawn(async move {
                    let _permit = throttler.acquire().await;
                    let current = active.fetch_add(1, Ordering::SeqCst) + 1;
                    _ = max_seen.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    _ = active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        _ = futures_util::future::join_all(tasks).await;

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_blocks_new_work() {
        let throttler = Throttler::new(5);
        assert!(throttler.pause_for(Duration::from_secs(60)));
        assert!(throttler.is_paused());

        let start = Instant::now();
        let _permit = throttler.acquire().await;

        assert!(start.elapsed() >= Duration::from_secs(60));
        assert!(!throttler.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn longest_pause_wins() {
        let throttler = Throttler::new(1);
        assert!(throttler.pause_for(Duration::from_secs(30)));
        assert!(!throttler.pause_for(Duration::from_secs(10)));
        assert!(!throttler.pause_for(Duration::from_millis(30_500)));
        assert!(throttler.pause_for(Duration::from_secs(90)));

        let start = Instant::now();
        let _permit = throttler.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn survives_a_poisoned_lock() {
        let throttler = Throttler::new(1);
        let poisoner = Arc::clone(&throttler);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.resume_at.lock();
            panic!("poison the pause lock");
        })
        .join();
        assert!(throttler.resume_at.is_poisoned());

        assert!(throttler.pause_for(Duration::from_secs(5)));
        assert!(throttler.is_paused());
        let _permit = throttler.acquire().await;
        assert!(!throttler.is_paused());
    }
}
