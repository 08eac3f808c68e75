//! Chunked concurrency limiter.
//!
//! Items are taken from the front of the queue in chunks of at most `K`.
//! Every operation in a chunk is spawned at once and the whole chunk is
//! awaited before the next one starts, so a slow item holds back the next
//! chunk rather than only its own slot. Results come back in input order.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinError;
use tracing::{debug, trace};

use leadflow_shared::RunConfig;

/// Runs an async operation over a sequence with at most `K` in flight.
#[derive(Debug, Clone)]
pub struct ChunkedLimiter {
    concurrency: usize,
    pause: Duration,
}

impl ChunkedLimiter {
    /// A limiter with bound `concurrency` (clamped to at least 1) and no pacing.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            pause: Duration::ZERO,
        }
    }

    /// Sleep for `pause` between consecutive chunks.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.concurrency).with_pause(config.chunk_delay)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Apply `op` to every item. See [`ChunkedLimiter::run_with_progress`].
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, op: F) -> Vec<Result<R, JoinError>>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        self.run_with_progress(items, op, |_, _| {}).await
    }

    /// Apply `op` to every item, calling `on_chunk(done, total)` after each chunk.
    ///
    /// The output has one entry per input, in input order. An entry is `Err`
    /// only if that item's task panicked; sibling tasks are unaffected.
    pub async fn run_with_progress<T, R, F, Fut>(
        &self,
        items: Vec<T>,
        op: F,
        mut on_chunk: impl FnMut(usize, usize),
    ) -> Vec<Result<R, JoinError>>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let total = items.len();
        let mut queue = items;
        let mut results = Vec::with_capacity(total);

        while !queue.is_empty() {
            if !results.is_empty() && !self.pause.is_zero() {
                trace!(pause_ms = self.pause.as_millis() as u64, "pacing between chunks");
                tokio::time::sleep(self.pause).await;
            }

            // Take a chunk from the queue (up to the concurrency bound)
            let chunk: Vec<T> = {
                let drain_count = queue.len().min(self.concurrency);
                queue.drain(..drain_count).collect()
            };

            debug!(
                chunk_len = chunk.len(),
                done = results.len(),
                total,
                "starting chunk"
            );

            let handles: Vec<_> = chunk.into_iter().map(|item| tokio::spawn(op(item))).collect();

            // Await in spawn order so output order matches input order
            for handle in handles {
                results.push(handle.await);
            }

            on_chunk(results.len(), total);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[tokio::test]
    async fn preserves_input_order_regardless_of_latency() {
        let limiter = ChunkedLimiter::new(3);
        let items: Vec<u64> = (1..=10).collect();

        // Later items finish first within each chunk.
        let results = limiter
            .run(items, |i| async move {
                tokio::time::sleep(Duration::from_millis((11 - i) * 3)).await;
                i
            })
            .await;

        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn never_exceeds_bound() {
        let limiter = ChunkedLimiter::new(4);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let results = limiter
            .run((0..17).collect::<Vec<u64>>(), |i| {
                let in_flight = Arc::clone(&in_flight);
                let max_seen = Arc::clone(&max_seen);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2 + i % 3)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    i
                }
            })
            .await;

        assert_eq!(results.len(), 17);
        assert!(max_seen.load(Ordering::SeqCst) <= 4);
        assert_eq!(max_seen.load(Ordering::SeqCst), 4);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn next_chunk_waits_for_whole_previous_chunk() {
        let limiter = ChunkedLimiter::new(2);
        let completed = Arc::new(AtomicUsize::new(0));
        let seen_at_start = Arc::new(Mutex::new(Vec::new()));

        limiter
            .run((0..6).collect::<Vec<usize>>(), |i| {
                let completed = Arc::clone(&completed);
                let seen_at_start = Arc::clone(&seen_at_start);
                async move {
                    seen_at_start
                        .lock()
                        .unwrap()
                        .push((i, completed.load(Ordering::SeqCst)));
                    // First item of each chunk is the slow one.
                    let ms = if i % 2 == 0 { 20 } else { 1 };
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        for (i, done_before_start) in seen_at_start.lock().unwrap().iter() {
            let chunk_start = (i / 2) * 2;
            assert!(
                *done_before_start >= chunk_start,
                "item {i} started with only {done_before_start} complete"
            );
        }
    }

    #[tokio::test]
    async fn panicking_item_does_not_abort_siblings() {
        let limiter = ChunkedLimiter::new(3);
        let results = limiter
            .run((0..7).collect::<Vec<u32>>(), |i| async move {
                if i == 1 {
                    panic!("boom");
                }
                i * 10
            })
            .await;

        assert_eq!(results.len(), 7);
        assert!(results[1].as_ref().unwrap_err().is_panic());
        let ok: Vec<u32> = results
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| *idx != 1)
            .map(|(_, r)| r.unwrap())
            .collect();
        assert_eq!(ok, vec![0, 20, 30, 40, 50, 60]);
    }

    #[tokio::test]
    async fn empty_input_never_calls_op() {
        let calls = Arc::new(AtomicUsize::new(0));
        let results = ChunkedLimiter::new(5)
            .run(Vec::<u8>::new(), |_| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;
        assert!(results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pause_applies_between_chunks_only() {
        let limiter = ChunkedLimiter::new(2).with_pause(Duration::from_millis(30));
        let start = Instant::now();
        let results = limiter
            .run(vec![1, 2, 3, 4], |i| async move { i })
            .await;
        assert_eq!(results.len(), 4);
        // Two chunks, one pause between them.
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn progress_reports_after_each_chunk() {
        let mut reports = Vec::new();
        ChunkedLimiter::new(2)
            .run_with_progress(vec![1, 2, 3, 4, 5], |i| async move { i }, |done, total| {
                reports.push((done, total))
            })
            .await;
        assert_eq!(reports, vec![(2, 5), (4, 5), (5, 5)]);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        assert_eq!(ChunkedLimiter::new(0).concurrency(), 1);
        let from_config = ChunkedLimiter::from_config(&RunConfig::new(3, Duration::from_millis(5)));
        assert_eq!(from_config.concurrency(), 3);
    }
}
