//! Spaced sequential dispatcher.
//!
//! Launches a fixed list of deferred operations at a constant cadence (one
//! launch per interval, regardless of how long earlier launches take) and
//! collects their results.
//!
//! Results are collected in **completion order**, not launch order. When every
//! operation resolves before the next launch the two coincide.
//!
//! On the first failure the dispatcher returns that error. Operations not yet
//! launched are dropped without being invoked; operations already launched
//! keep running to completion on a detached task and their results are
//! discarded.

use crate::work::{into_thunk, Thunk};
use crate::{Error, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, warn};

pub struct SpacedDispatcher<T> {
    ops: Vec<Thunk<T>>,
}

impl<T: Send + 'static> SpacedDispatcher<T> {
    pub fn new(ops: Vec<Thunk<T>>) -> Self {
        Self { ops }
    }

    pub fn push<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.ops.push(into_thunk(f));
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub async fn execute_ms(self, interval_ms: u64) -> Result<Vec<T>> {
        self.execute(Duration::from_millis(interval_ms)).await
    }

    /// Launch every operation, one per `interval`, and gather the results.
    ///
    /// A zero interval launches everything at once.
    pub async fn execute(self, interval: Duration) -> Result<Vec<T>> {
        let total = self.ops.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let mut pending = self.ops.into_iter().enumerate();
        let mut running = FuturesUnordered::new();
        let mut results = Vec::with_capacity(total);
        let mut launched = 0usize;

        let mut ticker = if interval.is_zero() {
            for (index, op) in pending.by_ref() {
                running.push(launch(index, op));
            }
            launched = total;
            None
        } else {
            let mut t = tokio::time::interval(interval);
            t.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(t)
        };

        loop {
            tokio::select! {
                biased;

                Some((index, outcome)) = running.next(), if !running.is_empty() => {
                    match outcome {
                        Ok(value) => {
                            results.push(value);
                            if results.len() == total {
                                return Ok(results);
                            }
                        }
                        Err(source) => {
                            warn!(index, launched, total, error = %source, "spaced dispatch failed");
                            if !running.is_empty() {
                                tokio::spawn(async move {
                                    while running.next().await.is_some() {}
                                });
                            }
                            return Err(Error::Dispatch { index, source });
                        }
                    }
                }
                _ = next_tick(&mut ticker), if launched < total => {
                    if let Some((index, op)) = pending.next() {
                        debug!(index, total, "spaced dispatch launch");
                        running.push(launch(index, op));
                        launched += 1;
                    }
                }
                else => return Ok(results),
            }
        }
    }
}

impl<T: Send + 'static> Default for SpacedDispatcher<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> FromIterator<Thunk<T>> for SpacedDispatcher<T> {
    fn from_iter<It: IntoIterator<Item = Thunk<T>>>(iter: It) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

fn launch<T>(index: usize, op: Thunk<T>) -> impl Future<Output = (usize, anyhow::Result<T>)> {
    let fut = op();
    async move { (index, fut.await) }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Instant};

    #[tokio::test]
    async fn test_empty_resolves_immediately() {
        let results = SpacedDispatcher::<u32>::default().execute_ms(1000).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_order_quirk() {
        let results = SpacedDispatcher::default()
            .push(|| async {
                sleep(Duration::from_millis(50)).await;
                Ok("slow")
            })
            .push(|| async { Ok("fast") })
            .execute(Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(results, vec!["fast", "slow"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_launches_together() {
        let start = Instant::now();
        let results = SpacedDispatcher::default()
            .push(|| async {
                sleep(Duration::from_millis(30)).await;
                Ok(1)
            })
            .push(|| async {
                sleep(Duration::from_millis(30)).await;
                Ok(2)
            })
            .execute(Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_cadence_ignores_slow_operations() {
        let start = Instant::now();
        let dispatcher: SpacedDispatcher<u64> = (0..3)
            .map(|_| {
                into_thunk(move || async move {
                    let launched_at = start.elapsed().as_millis() as u64;
                    sleep(Duration::from_millis(100)).await;
                    Ok(launched_at)
                })
            })
            .collect();
        let mut results = dispatcher.execute_ms(20).await.unwrap();
        results.sort_unstable();
        assert_eq!(results, vec![0, 20, 40]);
    }
}
