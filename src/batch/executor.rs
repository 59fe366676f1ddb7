//! Batch executor.

use crate::work::WorkUnit;
use crate::{Error, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Outputs of one fully successful chunk, in chunk order.
#[derive(Debug, Clone)]
pub struct BatchResult<T> {
    pub outputs: Vec<T>,
    pub execution_time: Duration,
    pub total_processed: usize,
}

/// Runs one chunk of work units concurrently.
///
/// The first failure (in completion order) is reported as soon as it resolves.
/// Units of the chunk still in flight keep running to completion on a detached
/// task; outputs of a failed chunk are discarded.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    max_concurrency: usize,
}

impl BatchExecutor {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub async fn execute<T>(&self, chunk: Vec<WorkUnit<T>>) -> Result<BatchResult<T>>
    where
        T: Send + 'static,
    {
        debug_assert!(chunk.len() <= self.max_concurrency);
        let start = Instant::now();
        let total = chunk.len();

        // Thunks are invoked here, in chunk order.
        let mut running: FuturesUnordered<_> = chunk
            .into_iter()
            .enumerate()
            .map(|(index, unit)| {
                let fut = unit.launch();
                async move { (index, fut.await) }
            })
            .collect();

        let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
        while let Some((index, outcome)) = running.next().await {
            match outcome {
                Ok(value) => slots[index] = Some(value),
                Err(source) => {
                    let survivors = running.len();
                    if survivors > 0 {
                        debug!(index, survivors, "detaching in-flight units of failed chunk");
                        tokio::spawn(async move {
                            while let Some((index, outcome)) = running.next().await {
                                if let Err(source) = outcome {
                                    debug!(index, error = %source, "additional unit failure in chunk");
                                }
                            }
                        });
                    }
                    return Err(Error::Unit { index, source });
                }
            }
        }

        Ok(BatchResult {
            outputs: slots.into_iter().flatten().collect(),
            execution_time: start.elapsed(),
            total_processed: total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    #[derive(Debug, thiserror::Error)]
    #[error("unit {0} failed")]
    struct UnitFailed(u32);

    #[tokio::test(start_paused = true)]
    async fn test_outputs_follow_chunk_order() {
        let executor = BatchExecutor::new(3);
        let chunk = vec![
            WorkUnit::awaitable(async {
                sleep(Duration::from_millis(30)).await;
                Ok("slow")
            }),
            WorkUnit::awaitable(async {
                sleep(Duration::from_millis(10)).await;
                Ok("fast")
            }),
            WorkUnit::thunk(|| async { Ok("instant") }),
        ];
        let result = executor.execute(chunk).await.unwrap();
        assert_eq!(result.outputs, vec!["slow", "fast", "instant"]);
        assert_eq!(result.total_processed, 3);
        // Units overlap: the chunk takes as long as the slowest unit
        assert_eq!(result.execution_time, Duration::from_millis(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reported_before_survivors_finish() {
        let finished = Arc::new(AtomicUsize::new(0));
        let executor = BatchExecutor::new(3);
        let mut chunk: Vec<WorkUnit<u32>> = Vec::new();
        for i in 0..3u32 {
            let finished = finished.clone();
            chunk.push(WorkUnit::awaitable(async move {
                if i == 0 {
                    return Err(UnitFailed(i).into());
                }
                sleep(Duration::from_millis(20)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            }));
        }
        let start = Instant::now();
        let err = executor.execute(chunk).await.unwrap_err();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(err, Error::Unit { index: 0, .. }));
        assert_eq!(err.downcast_work_error::<UnitFailed>().map(|e| e.0), Some(0));
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        // Survivors are not cancelled
        sleep(Duration::from_millis(30)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_failure_in_completion_order() {
        let executor = BatchExecutor::new(2);
        let chunk: Vec<WorkUnit<u32>> = vec![
            WorkUnit::awaitable(async {
                sleep(Duration::from_millis(50)).await;
                Err(UnitFailed(1).into())
            }),
            WorkUnit::awaitable(async {
                sleep(Duration::from_millis(5)).await;
                Err(UnitFailed(2).into())
            }),
        ];
        let err = executor.execute(chunk).await.unwrap_err();
        assert!(matches!(err, Error::Unit { index: 1, .. }));
        assert_eq!(err.downcast_work_error::<UnitFailed>().map(|e| e.0), Some(2));
    }

    #[tokio::test]
    async fn test_empty_chunk() {
        let executor = BatchExecutor::new(4);
        let result = executor.execute::<u32>(Vec::new()).await.unwrap();
        assert!(result.outputs.is_empty());
        assert_eq!(result.total_processed, 0);
    }
}
