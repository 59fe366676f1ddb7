//! Stream adapter for [`PacedWorkStream`].
//!
//! [`PacedWorkStream::run`] drives the processor from any `futures::Stream` of
//! items into an [`Emit`] sink. [`PacedWorkStream::into_stream`] spawns that
//! driver on the current tokio runtime and returns the outputs as a
//! [`BoxStream`]: zero or more `Ok(PacedEvent::Output(_))`, then exactly one of
//! `Ok(PacedEvent::Done(_))` or `Err(_)`.

use crate::processor::{Emit, PacedWorkStream, Transform};
use crate::tags::TagCounts;
use crate::{BoxStream, Error, ErrorContext, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacedEvent<O> {
    /// One forwarded result.
    Output(O),
    /// Input exhausted and every unit settled.
    Done(TagCounts),
}

impl<O> PacedEvent<O> {
    pub fn into_output(self) -> Option<O> {
        match self {
            PacedEvent::Output(o) => Some(o),
            PacedEvent::Done(_) => None,
        }
    }

    pub fn tag_counts(&self) -> Option<&TagCounts> {
        match self {
            PacedEvent::Done(counts) => Some(counts),
            PacedEvent::Output(_) => None,
        }
    }
}

struct ChannelEmitter<O> {
    tx: mpsc::Sender<Result<PacedEvent<O>>>,
}

#[async_trait]
impl<O: Send + 'static> Emit<O> for ChannelEmitter<O> {
    async fn emit(&mut self, value: O) -> Result<()> {
        self.tx
            .send(Ok(PacedEvent::Output(value)))
            .await
            .map_err(|_| Error::OutputClosed)
    }
}

impl<I, O> PacedWorkStream<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Feed every item of `input`, then flush. Returns the final tag counts.
    pub async fn run<S>(&mut self, input: S, out: &mut dyn Emit<O>) -> Result<TagCounts>
    where
        S: Stream<Item = I> + Send,
    {
        futures::pin_mut!(input);
        while let Some(item) = input.next().await {
            self.ingest(item, out).await?;
        }
        self.flush(out).await
    }

    /// Spawn the driver and return its outputs as a stream.
    ///
    /// At most `high_water_mark` outputs are buffered ahead of the consumer.
    /// Dropping the returned stream stops the driver at its next output. A
    /// panic inside the driver surfaces as a final [`Error::Runtime`].
    /// Must be called from within a tokio runtime.
    pub fn into_stream<S>(mut self, input: S) -> BoxStream<'static, PacedEvent<O>>
    where
        S: Stream<Item = I> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.config().high_water_mark.max(1));
        let driver_tx = tx.clone();
        let processor_id = self.id();
        let driver = tokio::spawn(async move {
            let mut emitter = ChannelEmitter {
                tx: driver_tx.clone(),
            };
            let terminal = match self.run(input, &mut emitter).await {
                Ok(counts) => Ok(PacedEvent::Done(counts)),
                Err(Error::OutputClosed) => {
                    debug!(processor_id = %self.id(), "output stream dropped by consumer");
                    return;
                }
                Err(e) => Err(e),
            };
            let _ = driver_tx.send(terminal).await;
        });
        tokio::spawn(async move {
            if let Err(join_err) = driver.await {
                if join_err.is_panic() {
                    warn!(%processor_id, "paced-work driver panicked");
                    let _ = tx
                        .send(Err(Error::runtime_with_context(
                            "stream driver panicked",
                            ErrorContext::new()
                                .with_source("stream_driver")
                                .with_details(processor_id.to_string()),
                        )))
                        .await;
                }
            }
        });
        Box::pin(ReceiverStream::new(rx))
    }
}
