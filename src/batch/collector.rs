//! Batch accumulator.

use std::collections::VecDeque;

/// What the processor should do after an item was admitted.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission<I> {
    /// Units are backlogged; dispatch the next chunk from the unit queue.
    DrainBacklog,
    /// Item buffered, nothing to dispatch yet.
    Buffered { count: usize },
    /// A full group of items was taken from the buffer; expand and dispatch.
    Expand(Vec<I>),
}

/// Buffered items and buffered work units, both FIFO.
///
/// Owned exclusively by one processor.
#[derive(Debug)]
pub struct BatchAccumulator<I, U> {
    concurrency: usize,
    items: VecDeque<I>,
    units: VecDeque<U>,
}

impl<I, U> BatchAccumulator<I, U> {
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            concurrency,
            items: VecDeque::with_capacity(concurrency),
            units: VecDeque::new(),
        }
    }

    /// Buffer `item` and decide the next step.
    ///
    /// A unit backlog of at least one chunk is drained before more items are
    /// expanded.
    pub fn admit(&mut self, item: I) -> Admission<I> {
        self.items.push_back(item);
        if self.units.len() >= self.concurrency {
            return Admission::DrainBacklog;
        }
        if self.items.len() < self.concurrency {
            return Admission::Buffered {
                count: self.items.len(),
            };
        }
        Admission::Expand(self.items.drain(..self.concurrency).collect())
    }

    pub fn enqueue_units<It: IntoIterator<Item = U>>(&mut self, units: It) {
        self.units.extend(units);
    }

    /// Remove up to `concurrency` units from the front of the queue.
    pub fn next_chunk(&mut self) -> Vec<U> {
        let n = self.units.len().min(self.concurrency);
        self.units.drain(..n).collect()
    }

    /// Remove every buffered item, for the final flush.
    pub fn take_remaining_items(&mut self) -> Vec<I> {
        self.items.drain(..).collect()
    }

    pub fn buffered_items(&self) -> usize {
        self.items.len()
    }

    pub fn buffered_units(&self) -> usize {
        self.units.len()
    }

    pub fn is_drained(&self) -> bool {
        self.items.is_empty() && self.units.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.units.clear();
    }
}
