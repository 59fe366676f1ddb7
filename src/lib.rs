//! # paced-work
//!
//! Concurrency-bounded, paced execution of asynchronous work over a stream of
//! input items.
//!
//! ## Overview
//!
//! The crate provides two engines:
//!
//! - [`PacedWorkStream`]: expands each input item into zero, one or many work
//!   units, runs them in chunks of at most `concurrency` units, and keeps every
//!   chunk busy for at least `work_ms` milliseconds. Results are forwarded in
//!   input order. Work code records metrics through a [`TagCounter`].
//! - [`SpacedDispatcher`]: launches a fixed list of deferred operations at a
//!   constant interval and aggregates their results, failing on the first error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use paced_work::{PacedConfig, PacedEvent, PacedWorkStream, TagCounter, Work};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> paced_work::Result<()> {
//!     let processor = PacedWorkStream::new(
//!         PacedConfig::new().with_concurrency(2).with_work_ms(1000),
//!     )
//!     .with_work_fn(|item: u32, tags: &TagCounter| {
//!         let tags = tags.clone();
//!         Ok(Work::ready(async move {
//!             tokio::time::sleep(Duration::from_millis(600)).await;
//!             tags.count("workDone");
//!             Ok(item)
//!         }))
//!     });
//!
//!     let mut events = processor.into_stream(futures::stream::iter(vec![11, 12, 21, 22, 31]));
//!     while let Some(event) = events.next().await {
//!         if let PacedEvent::Done(counts) = event? {
//!             println!("{:?}", counts);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Processor configuration (builder, env, YAML) |
//! | [`tags`] | Tag counters and snapshots |
//! | [`work`] | Work units, work functions and expansion |
//! | [`batch`] | Item/unit buffering and chunk execution |
//! | [`pacing`] | Minimum duration per chunk |
//! | [`processor`] | The paced processor and its `Transform` interface |
//! | [`stream`] | Driving the processor from and into `futures` streams |
//! | [`dispatch`] | Spaced sequential dispatcher |

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod pacing;
pub mod processor;
pub mod stream;
pub mod tags;
pub mod work;

pub use config::PacedConfig;
pub use dispatch::SpacedDispatcher;
pub use processor::{Emit, PacedWorkStream, Transform};
pub use stream::PacedEvent;
pub use tags::{TagCounter, TagCounts};
pub use work::{Thunk, UnitFuture, Work, WorkFn, WorkUnit};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
