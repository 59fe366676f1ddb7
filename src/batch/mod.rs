//! Chunked execution: buffering items and units, and running one chunk at a time.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`BatchAccumulator`] | FIFO buffers for items and expanded units; decides when to dispatch |
//! | [`Admission`] | Outcome of admitting one item |
//! | [`BatchExecutor`] | Runs one chunk concurrently; fails fast without cancelling survivors |
//! | [`BatchResult`] | Ordered outputs of a successful chunk |
//!
//! ## Example
//!
//! ```rust
//! use paced_work::batch::{Admission, BatchAccumulator};
//!
//! let mut acc: BatchAccumulator<u32, String> = BatchAccumulator::new(2);
//! assert_eq!(acc.admit(1), Admission::Buffered { count: 1 });
//! assert_eq!(acc.admit(2), Admission::Expand(vec![1, 2]));
//! ```

mod collector;
mod executor;

pub use collector::{Admission, BatchAccumulator};
pub use executor::{BatchExecutor, BatchResult};
