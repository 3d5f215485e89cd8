//! Bounded concurrent map
//!
//! One worker-pool shape shared by conversion, folder analysis and manifest
//! analysis: submit one task per item, cap concurrency with a semaphore,
//! collect results as they complete.
//!
//! The `on_complete` callback runs on the collecting task only. Everything
//! that mutates shared state (progress bars, the manifest table write-back)
//! goes through it, which keeps a single writer without any locking.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

/// Run `task` over `items` with at most `limit` tasks in flight, invoking
/// `on_complete` once per finished task in completion order.
///
/// Returns `(index, output)` pairs in completion order; `index` is the
/// item's position in the input. Task functions are expected to capture
/// their own failures and return outcome values; a task that panics anyway
/// is logged and dropped from the results.
pub async fn map_bounded_with<T, R, F, Fut, C>(
    items: Vec<T>,
    limit: usize,
    task: F,
    mut on_complete: C,
) -> Vec<(usize, R)>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
    C: FnMut(usize, &R),
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut in_flight = FuturesUnordered::new();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let fut = task(index, item);
        in_flight.push(tokio::spawn(async move {
            // holding the permit for the whole task bounds the pool
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            (index, fut.await)
        }));
    }

    let mut results = Vec::with_capacity(in_flight.len());
    while let Some(joined) = in_flight.next().await {
        match joined {
            Ok((index, output)) => {
                on_complete(index, &output);
                results.push((index, output));
            }
            Err(e) => {
                tracing::error!("worker task panicked: {e}");
            }
        }
    }
    results
}

/// [`map_bounded_with`] without a completion callback.
pub async fn map_bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, task: F) -> Vec<(usize, R)>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    map_bounded_with(items, limit, task, |_, _| {}).await
}
