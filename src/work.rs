//! Work units and item expansion.
//!
//! A work function turns one input item into a [`Work`] value: an ordered list of
//! zero or more [`WorkUnit`]s. Each unit is either an already-created future
//! ([`WorkUnit::Awaitable`]) or a deferred thunk ([`WorkUnit::Thunk`]) that is
//! only invoked when its chunk is launched.

use crate::tags::TagCounter;
use crate::{Error, Result};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// A boxed unit of asynchronous work.
pub type UnitFuture<T> = BoxFuture<'static, anyhow::Result<T>>;

/// A deferred operation producing a [`UnitFuture`] when invoked.
pub type Thunk<T> = Box<dyn FnOnce() -> UnitFuture<T> + Send>;

/// Box a closure returning a future into a [`Thunk`].
pub fn into_thunk<T, F, Fut>(f: F) -> Thunk<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Box::new(move || {
        let fut: UnitFuture<T> = Box::pin(f());
        fut
    })
}

pub enum WorkUnit<T> {
    Awaitable(UnitFuture<T>),
    Thunk(Thunk<T>),
}

impl<T: 'static> WorkUnit<T> {
    pub fn awaitable<F>(fut: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        WorkUnit::Awaitable(Box::pin(fut))
    }

    pub fn thunk<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        WorkUnit::Thunk(into_thunk(f))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, WorkUnit::Thunk(_))
    }

    /// Turn the unit into a runnable future, invoking the thunk if deferred.
    pub fn launch(self) -> UnitFuture<T> {
        match self {
            WorkUnit::Awaitable(fut) => fut,
            WorkUnit::Thunk(thunk) => thunk(),
        }
    }
}

impl<T> std::fmt::Debug for WorkUnit<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkUnit::Awaitable(_) => f.write_str("WorkUnit::Awaitable"),
            WorkUnit::Thunk(_) => f.write_str("WorkUnit::Thunk"),
        }
    }
}

/// The result of expanding one item: zero or more work units, in order.
#[derive(Debug)]
pub struct Work<T> {
    units: Vec<WorkUnit<T>>,
}

impl<T: 'static> Work<T> {
    /// No work; the item produces no output.
    pub fn none() -> Self {
        Self { units: Vec::new() }
    }

    /// A single awaitable unit.
    pub fn ready<F>(fut: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        WorkUnit::awaitable(fut).into()
    }

    /// A single deferred unit.
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        WorkUnit::thunk(f).into()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn into_units(self) -> Vec<WorkUnit<T>> {
        self.units
    }
}

impl<T: 'static> Default for Work<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> From<WorkUnit<T>> for Work<T> {
    fn from(unit: WorkUnit<T>) -> Self {
        Self { units: vec![unit] }
    }
}

impl<T> From<Vec<WorkUnit<T>>> for Work<T> {
    fn from(units: Vec<WorkUnit<T>>) -> Self {
        Self { units }
    }
}

impl<T> From<Option<WorkUnit<T>>> for Work<T> {
    fn from(unit: Option<WorkUnit<T>>) -> Self {
        Self {
            units: unit.into_iter().collect(),
        }
    }
}

impl<T> FromIterator<WorkUnit<T>> for Work<T> {
    fn from_iter<It: IntoIterator<Item = WorkUnit<T>>>(iter: It) -> Self {
        Self {
            units: iter.into_iter().collect(),
        }
    }
}

/// User-supplied mapping from an item to its work.
///
/// Implemented for every `Fn(I, &TagCounter) -> anyhow::Result<Work<T>>`.
/// An `Err` is fatal for the processor.
pub trait WorkFn<I, T>: Send + Sync {
    fn call(&self, item: I, tags: &TagCounter) -> anyhow::Result<Work<T>>;
}

impl<I, T, F> WorkFn<I, T> for F
where
    F: Fn(I, &TagCounter) -> anyhow::Result<Work<T>> + Send + Sync,
{
    fn call(&self, item: I, tags: &TagCounter) -> anyhow::Result<Work<T>> {
        self(item, tags)
    }
}

/// Applies the work function to buffered items.
pub struct Expander<I, T> {
    work_fn: Option<Arc<dyn WorkFn<I, T>>>,
    tags: TagCounter,
}

impl<I, T> Expander<I, T> {
    pub fn new(tags: TagCounter) -> Self {
        Self {
            work_fn: None,
            tags,
        }
    }

    pub fn set_work_fn(&mut self, work_fn: Arc<dyn WorkFn<I, T>>) {
        self.work_fn = Some(work_fn);
    }

    pub fn is_ready(&self) -> bool {
        self.work_fn.is_some()
    }

    /// Expand `items` in order. Stops at the first failing item; nothing is
    /// returned from a failed call.
    pub fn expand<It>(&self, items: It) -> Result<Vec<WorkUnit<T>>>
    where
        It: IntoIterator<Item = I>,
    {
        let work_fn = self.work_fn.as_ref().ok_or(Error::MissingWorkFunction)?;
        let mut units = Vec::new();
        for item in items {
            let work = work_fn
                .call(item, &self.tags)
                .map_err(|source| Error::Expansion { source })?;
            units.extend(work.units);
        }
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fan_out(item: u32, _tags: &TagCounter) -> anyhow::Result<Work<u32>> {
        Ok(match item % 3 {
            0 => Work::none(),
            1 => Work::ready(async move { Ok(item) }),
            _ => (0..item).map(|i| WorkUnit::awaitable(async move { Ok(i) })).collect(),
        })
    }

    #[test]
    fn test_work_conversions() {
        assert!(Work::<u32>::from(None).is_empty());
        assert_eq!(Work::from(Some(WorkUnit::awaitable(async { Ok(1u32) }))).len(), 1);
        let many: Work<u32> = vec![
            WorkUnit::awaitable(async { Ok(1) }),
            WorkUnit::thunk(|| async { Ok(2) }),
        ]
        .into();
        assert_eq!(many.len(), 2);
        assert!(many.into_units()[1].is_deferred());
    }

    #[tokio::test]
    async fn test_launch_invokes_thunk_lazily() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let unit = WorkUnit::thunk(move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok("done") }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let fut = unit.launch();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(fut.await.unwrap(), "done");
    }

    #[test]
    fn test_expand_fans_out_in_order() {
        let mut expander: Expander<u32, u32> = Expander::new(TagCounter::new());
        expander.set_work_fn(Arc::new(fan_out));
        // 1 -> 1 unit, 2 -> 2 units, 3 -> none, 4 -> 1 unit
        let units = expander.expand(vec![1, 2, 3, 4]).unwrap();
        assert_eq!(units.len(), 4);
    }

    #[test]
    fn test_expand_without_work_fn() {
        let expander: Expander<u32, u32> = Expander::new(TagCounter::new());
        assert!(!expander.is_ready());
        assert!(matches!(
            expander.expand(vec![1]),
            Err(Error::MissingWorkFunction)
        ));
    }

    #[test]
    fn test_expand_stops_at_first_failure() {
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        let mut expander: Expander<u32, u32> = Expander::new(TagCounter::new());
        expander.set_work_fn(Arc::new(
            move |item: u32, _tags: &TagCounter| -> anyhow::Result<Work<u32>> {
                s.fetch_add(1, Ordering::SeqCst);
                if item == 2 {
                    anyhow::bail!("bad item {}", item);
                }
                Ok(Work::ready(async move { Ok(item) }))
            },
        ));
        let err = expander.expand(vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::Expansion { .. }));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
