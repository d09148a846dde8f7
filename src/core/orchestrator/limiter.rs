//! Concurrency limiter for in-flight chunks
//!
//! Wraps a Tokio semaphore. Tokio semaphores are fair, so permits are handed
//! out in request order; the dispatcher requests them in chunk order, which
//! makes dispatch FIFO by chunk index.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the number of chunks under detection at once
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: AtomicUsize,
    label: String,
}

impl ConcurrencyLimiter {
    /// Creates a limiter; `max_concurrent` is clamped to
    /// `1..=Semaphore::MAX_PERMITS`
    pub fn new(max_concurrent: usize, label: impl Into<String>) -> Self {
        let max_concurrent = max_concurrent.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_permits: max_concurrent,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: AtomicUsize::new(0),
            label: label.into(),
        }
    }

    /// Waits for a free slot
    ///
    /// Returns `None` if the semaphore has been closed. The permit can be moved
    /// into a spawned task and releases its slot when dropped.
    pub async fn acquire(&self) -> Option<ChunkPermit> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.update_peak(current);

        Some(ChunkPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    fn update_peak(&self, current: usize) {
        let mut peak = self.peak_in_flight.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_in_flight.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    /// Returns the label for this limiter
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the maximum number of chunks in flight
    pub fn max_concurrent(&self) -> usize {
        self.max_permits
    }

    /// Returns the current number of chunks in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Returns the highest number of chunks observed in flight
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }
}

/// Slot held by one chunk task
#[derive(Debug)]
pub struct ChunkPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for ChunkPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let limiter = ConcurrencyLimiter::new(2, "chunks");
        assert_eq!(limiter.label(), "chunks");
        assert_eq!(limiter.max_concurrent(), 2);

        let a = limiter.acquire().await.unwrap();
        let b = limiter.acquire().await.unwrap();
        assert_eq!(limiter.in_flight(), 2);

        drop(a);
        assert_eq!(limiter.in_flight(), 1);
        drop(b);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.peak_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_waits_when_full() {
        let limiter = Arc::new(ConcurrencyLimiter::new(1, "chunks"));
        let held = limiter.acquire().await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(20), limiter.acquire()).await;
        assert!(waiting.is_err());

        drop(held);
        assert!(limiter.acquire().await.is_some());
    }

    #[test]
    fn test_zero_is_clamped() {
        assert_eq!(ConcurrencyLimiter::new(0, "chunks").max_concurrent(), 1);
    }

    #[test]
    fn test_oversized_is_clamped() {
        let limiter = ConcurrencyLimiter::new(usize::MAX, "chunks");
        assert_eq!(limiter.max_concurrent(), Semaphore::MAX_PERMITS);
    }
}
