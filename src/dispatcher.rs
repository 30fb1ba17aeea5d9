//! Bounded fan-out of per-item fetch work.
//!
//! Runs one async operation per item under a fixed worker limit and collects
//! the results without preserving submission order. A failed item never
//! cancels its siblings: it is logged, counted, and replaced with the zero
//! value of the result type so the batch always completes.

use crate::error::Result;
use futures::stream::{self, StreamExt};
use std::future::Future;

#[derive(Debug)]
pub struct DispatchOutcome<T> {
    /// One result per submitted item, in completion order.
    pub results: Vec<T>,
    /// How many items failed and were replaced with `T::default()`.
    pub failures: usize,
}

/// Executes `op` for every item with at most `limit` operations in flight.
pub async fn dispatch<I, T, F, Fut>(items: Vec<I>, limit: usize, op: F) -> DispatchOutcome<T>
where
    T: Default,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut failures = 0usize;
    let results = stream::iter(items)
        .map(|item| op(item))
        .buffer_unordered(limit.max(1))
        .map(|result| match result {
            Ok(value) => value,
            Err(e) => {
                failures += 1;
                tracing::warn!(error = %e, "item fetch failed, contributing zero metric");
                T::default()
            }
        })
        .collect::<Vec<_>>()
        .await;

    DispatchOutcome { results, failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let outcome = dispatch((0..50).collect::<Vec<u32>>(), 8, |n| async move {
            if n == 13 {
                Err(AppError::Http {
                    status: StatusCode::NOT_FOUND,
                    body: "missing".to_string(),
                })
            } else {
                Ok(1u64)
            }
        })
        .await;

        assert_eq!(outcome.results.len(), 50);
        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.results.iter().sum::<u64>(), 49);
    }

    #[tokio::test]
    async fn respects_concurrency_limit() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let outcome = {
            let active = Arc::clone(&active);
            let max_seen = Arc::clone(&max_seen);
            dispatch((0..20).collect::<Vec<u32>>(), 3, move |_| {
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                async move {
                    let current = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(1u64)
                }
            })
            .await
        };

        assert_eq!(outcome.results.len(), 20);
        assert!(max_seen.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn zero_limit_still_makes_progress() {
        let outcome = dispatch(vec![1, 2, 3], 0, |n| async move { Ok(n * 2) }).await;
        let mut doubled = outcome.results;
        doubled.sort_unstable();
        assert_eq!(doubled, vec![2, 4, 6]);
    }
}
