//! Paced concurrent batch processor.
//!
//! [`PacedWorkStream`] accepts items one at a time through the [`Transform`]
//! interface, expands them into work units with the configured work function,
//! and runs the units in chunks of at most `concurrency`, each chunk occupying
//! at least `work_ms` of wall-clock time. Results are handed to an [`Emit`] sink
//! in chunk order.
//!
//! ```rust
//! use paced_work::{PacedConfig, PacedWorkStream, TagCounter, Transform, Work};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> paced_work::Result<()> {
//! let mut processor = PacedWorkStream::new(PacedConfig::new().with_concurrency(2))
//!     .with_work_fn(|item: u32, tags: &TagCounter| {
//!         let tags = tags.clone();
//!         Ok(Work::ready(async move {
//!             tags.count("workDone");
//!             Ok(item * 10)
//!         }))
//!     });
//!
//! let mut out = Vec::new();
//! for item in [1, 2, 3] {
//!     processor.ingest(item, &mut out).await?;
//! }
//! let counts = processor.flush(&mut out).await?;
//! assert_eq!(out, vec![10, 20, 30]);
//! assert_eq!(counts.get("workDone"), 3);
//! # Ok(())
//! # }
//! ```

use crate::batch::{Admission, BatchAccumulator, BatchExecutor};
use crate::config::PacedConfig;
use crate::pacing::{millis, Pacer};
use crate::tags::{TagCounter, TagCounts};
use crate::work::{Expander, Work, WorkFn, WorkUnit};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Downstream receiver of forwarded results.
#[async_trait]
pub trait Emit<O>: Send {
    async fn emit(&mut self, value: O) -> Result<()>;
}

#[async_trait]
impl<O: Send + 'static> Emit<O> for Vec<O> {
    async fn emit(&mut self, value: O) -> Result<()> {
        self.push(value);
        Ok(())
    }
}

/// Push-style transform: items go in one at a time, results come out through
/// an [`Emit`] sink.
#[async_trait]
pub trait Transform<I, O>: Send {
    /// Accept one item; may forward zero or more results.
    async fn ingest(&mut self, item: I, out: &mut dyn Emit<O>) -> Result<()>;

    /// No more input: drain everything, then return the final tag counts.
    async fn flush(&mut self, out: &mut dyn Emit<O>) -> Result<TagCounts>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Active,
    Finished,
    Failed,
}

impl Lifecycle {
    fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Active => "active",
            Lifecycle::Finished => "finished",
            Lifecycle::Failed => "failed",
        }
    }
}

pub struct PacedWorkStream<I, O> {
    id: Uuid,
    config: PacedConfig,
    expander: Expander<I, O>,
    executor: BatchExecutor,
    pacer: Pacer,
    buffers: BatchAccumulator<I, WorkUnit<O>>,
    tags: TagCounter,
    state: Lifecycle,
    chunks_dispatched: usize,
}

impl<I, O> PacedWorkStream<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Processor without a work function. Install one with
    /// [`with_work_fn`](Self::with_work_fn); otherwise the first call fails with
    /// [`Error::MissingWorkFunction`].
    pub fn new(config: PacedConfig) -> Self {
        let config = PacedConfig {
            concurrency: config.concurrency.max(1),
            ..config
        };
        let tags = TagCounter::new();
        Self {
            id: Uuid::new_v4(),
            expander: Expander::new(tags.clone()),
            executor: BatchExecutor::new(config.concurrency),
            pacer: Pacer::new(config.work_duration()),
            buffers: BatchAccumulator::new(config.concurrency),
            tags,
            state: Lifecycle::Active,
            chunks_dispatched: 0,
            config,
        }
    }

    pub fn with_work_fn<F>(self, f: F) -> Self
    where
        F: Fn(I, &TagCounter) -> anyhow::Result<Work<O>> + Send + Sync + 'static,
    {
        self.with_work(f)
    }

    pub fn with_work<W>(mut self, work: W) -> Self
    where
        W: WorkFn<I, O> + 'static,
    {
        self.expander.set_work_fn(Arc::new(work));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &PacedConfig {
        &self.config
    }

    /// Counting capability shared with the work function.
    pub fn tag_counter(&self) -> TagCounter {
        self.tags.clone()
    }

    pub fn tag_counts(&self) -> TagCounts {
        self.tags.snapshot()
    }

    pub fn chunks_dispatched(&self) -> usize {
        self.chunks_dispatched
    }

    pub fn is_finished(&self) -> bool {
        self.state == Lifecycle::Finished
    }

    pub fn is_failed(&self) -> bool {
        self.state == Lifecycle::Failed
    }

    fn ensure_active(&mut self) -> Result<()> {
        if self.state != Lifecycle::Active {
            return Err(Error::Terminated {
                state: self.state.as_str(),
            });
        }
        if !self.expander.is_ready() {
            self.state = Lifecycle::Failed;
            warn!(processor_id = %self.id, "paced-work processor has no work function");
            return Err(Error::MissingWorkFunction);
        }
        Ok(())
    }

    fn mark_failed(&mut self, err: &Error) {
        self.state = Lifecycle::Failed;
        self.buffers.clear();
        warn!(
            processor_id = %self.id,
            chunks = self.chunks_dispatched,
            error = %err,
            "paced-work processor failed"
        );
    }

    fn expand_into_queue(&mut self, items: Vec<I>) -> Result<()> {
        let units = self.expander.expand(items)?;
        self.buffers.enqueue_units(units);
        Ok(())
    }

    async fn dispatch_next(&mut self, out: &mut dyn Emit<O>) -> Result<()> {
        let chunk = self.buffers.next_chunk();
        if chunk.is_empty() {
            return Ok(());
        }
        let chunk_len = chunk.len();
        let deferred = chunk.iter().filter(|unit| unit.is_deferred()).count();
        let pace = self.pacer.start();
        self.chunks_dispatched += 1;

        let result = self.executor.execute(chunk).await?;
        debug!(
            processor_id = %self.id,
            chunk = self.chunks_dispatched,
            chunk_len,
            deferred,
            queued_units = self.buffers.buffered_units(),
            elapsed_ms = millis(result.execution_time),
            "chunk settled"
        );
        for value in result.outputs {
            out.emit(value).await?;
        }
        pace.wait().await;
        Ok(())
    }

    async fn ingest_inner(&mut self, item: I, out: &mut dyn Emit<O>) -> Result<()> {
        match self.buffers.admit(item) {
            Admission::Buffered { .. } => Ok(()),
            Admission::DrainBacklog => self.dispatch_next(out).await,
            Admission::Expand(items) => {
                self.expand_into_queue(items)?;
                self.dispatch_next(out).await
            }
        }
    }

    async fn flush_inner(&mut self, out: &mut dyn Emit<O>) -> Result<TagCounts> {
        let rest = self.buffers.take_remaining_items();
        if !rest.is_empty() {
            self.expand_into_queue(rest)?;
        }
        while !self.buffers.is_drained() {
            self.dispatch_next(out).await?;
        }
        self.state = Lifecycle::Finished;
        let counts = self.tags.snapshot();
        info!(
            processor_id = %self.id,
            chunks = self.chunks_dispatched,
            tags = counts.len(),
            "paced-work processor done"
        );
        Ok(counts)
    }
}

#[async_trait]
impl<I, O> Transform<I, O> for PacedWorkStream<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn ingest(&mut self, item: I, out: &mut dyn Emit<O>) -> Result<()> {
        self.ensure_active()?;
        let result = self.ingest_inner(item, out).await;
        if let Err(ref e) = result {
            self.mark_failed(e);
        }
        result
    }

    async fn flush(&mut self, out: &mut dyn Emit<O>) -> Result<TagCounts> {
        self.ensure_active()?;
        let result = self.flush_inner(out).await;
        if let Err(ref e) = result {
            self.mark_failed(e);
        }
        result
    }
}

impl<I, O> std::fmt::Debug for PacedWorkStream<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacedWorkStream")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("buffered_items", &self.buffers.buffered_items())
            .field("buffered_units", &self.buffers.buffered_units())
            .field("chunks_dispatched", &self.chunks_dispatched)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fan_out_first(item: u32, _tags: &TagCounter) -> anyhow::Result<Work<String>> {
        if item == 1 {
            return Ok((1..=5)
                .map(|i| WorkUnit::awaitable(async move { Ok(format!("1-{}", i)) }))
                .collect());
        }
        Ok(Work::ready(async move { Ok(item.to_string()) }))
    }

    #[tokio::test]
    async fn test_backlog_drains_one_chunk_per_item() {
        let mut p = PacedWorkStream::new(PacedConfig::new().with_concurrency(2))
            .with_work_fn(fan_out_first);
        let mut out: Vec<String> = Vec::new();

        p.ingest(1, &mut out).await.unwrap();
        assert!(out.is_empty());
        // Expands 1 and 2 into six units, runs the first two
        p.ingest(2, &mut out).await.unwrap();
        assert_eq!(out, vec!["1-1", "1-2"]);
        // Backlog of four: each arrival drains one chunk
        p.ingest(3, &mut out).await.unwrap();
        assert_eq!(out.len(), 4);
        p.ingest(4, &mut out).await.unwrap();
        assert_eq!(&out[4..], &["1-5", "2"]);
        // Backlog empty again: 3 and 4 get expanded
        p.ingest(5, &mut out).await.unwrap();
        assert_eq!(&out[6..], &["3", "4"]);

        let counts = p.flush(&mut out).await.unwrap();
        assert!(counts.is_empty());
        assert_eq!(out.last().map(String::as_str), Some("5"));
        assert_eq!(out.len(), 9);
        assert_eq!(p.chunks_dispatched(), 5);
        assert!(p.is_finished());
    }

    #[tokio::test]
    async fn test_terminated_after_finish() {
        let mut p = PacedWorkStream::new(PacedConfig::default()).with_work_fn(fan_out_first);
        let mut out = Vec::new();
        p.flush(&mut out).await.unwrap();
        let err = p.ingest(2, &mut out).await.unwrap_err();
        assert!(matches!(err, Error::Terminated { state: "finished" }));
    }

    #[tokio::test]
    async fn test_missing_work_function() {
        let mut p: PacedWorkStream<&str, &str> = PacedWorkStream::new(PacedConfig::default());
        let mut out = Vec::new();
        let err = p.ingest("a", &mut out).await.unwrap_err();
        assert_eq!(err.to_string(), "Required work function");
        assert!(p.is_failed());
        assert!(matches!(
            p.flush(&mut out).await,
            Err(Error::Terminated { state: "failed" })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unit_failure_stops_processor() {
        let mut p = PacedWorkStream::new(
            PacedConfig::new()
                .with_concurrency(1)
                .with_work_ms(10),
        )
        .with_work_fn(|item: u32, _tags: &TagCounter| {
            Ok(Work::ready(async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                if item == 2 {
                    anyhow::bail!("no {}", item);
                }
                Ok(item)
            }))
        });
        let mut out = Vec::new();
        p.ingest(1, &mut out).await.unwrap();
        let err = p.ingest(2, &mut out).await.unwrap_err();
        assert!(matches!(err, Error::Unit { index: 0, .. }));
        assert_eq!(out, vec![1]);
        assert!(p.is_failed());
        assert!(p.ingest(3, &mut out).await.is_err());
        assert_eq!(p.chunks_dispatched(), 2);
    }
}
