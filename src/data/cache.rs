use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::{PriceQuery, PriceSource, Result};
use crate::core::PriceSample;

/// Entries kept by [`CachedPriceSource::new`].
pub const DEFAULT_CAPACITY: usize = 256;

/// Memoizes successful fetches keyed by instrument, window and granularity.
///
/// Failed fetches are not stored, so a later request retries the inner source.
/// At most `capacity` windows are held; storing past that evicts the oldest.
pub struct CachedPriceSource<S> {
    inner: S,
    capacity: usize,
    entries: Mutex<Entries>,
}

#[derive(Default)]
struct Entries {
    samples: HashMap<PriceQuery, Arc<Vec<PriceSample>>>,
    // Insertion order, oldest first.
    order: VecDeque<PriceQuery>,
}

impl<S: PriceSource> CachedPriceSource<S> {
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_CAPACITY)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    pub async fn get(&self, query: &PriceQuery) -> Result<Arc<Vec<PriceSample>>> {
        if let Some(hit) = self.lookup(query) {
            debug!(instrument = %query.instrument, "price cache hit");
            return Ok(hit);
        }

        let samples = Arc::new(self.inner.fetch(query).await?);
        debug!(
            instrument = %query.instrument,
            samples = samples.len(),
            "price cache store"
        );
        self.store(query, Arc::clone(&samples));
        Ok(samples)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries();
        entries.samples.clear();
        entries.order.clear();
    }

    fn lookup(&self, query: &PriceQuery) -> Option<Arc<Vec<PriceSample>>> {
        self.entries().samples.get(query).cloned()
    }

    fn store(&self, query: &PriceQuery, samples: Arc<Vec<PriceSample>>) {
        let mut entries = self.entries();
        // A concurrent miss on the same key may already have stored it.
        if entries.samples.insert(query.clone(), samples).is_some() {
            return;
        }
        entries.order.push_back(query.clone());
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.samples.remove(&oldest);
                debug!(instrument = %oldest.instrument, "price cache evict");
            }
        }
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<S: PriceSource> PriceSource for CachedPriceSource<S> {
    async fn fetch(&self, query: &PriceQuery) -> Result<Vec<PriceSample>> {
        self.get(query).await.map(|samples| samples.as_ref().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataError, Granularity};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl PriceSource for CountingSource {
        async fn fetch(&self, query: &PriceQuery) -> Result<Vec<PriceSample>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(query.unavailable());
            }
            Ok(vec![PriceSample::new(query.start, 100.0)])
        }
    }

    fn query(instrument: &str, granularity: Granularity) -> PriceQuery {
        PriceQuery {
            instrument: instrument.to_string(),
            start: NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid test date"),
            end: NaiveDate::from_ymd_opt(2021, 1, 1).expect("valid test date"),
            granularity,
        }
    }

    fn query_starting(day: u32) -> PriceQuery {
        PriceQuery {
            start: NaiveDate::from_ymd_opt(2020, 1, day).expect("valid test date"),
            ..query("^GSPC", Granularity::Daily)
        }
    }

    #[tokio::test]
    async fn repeated_query_is_served_from_cache() {
        let cache = CachedPriceSource::new(CountingSource::new(false));
        let q = query("^GSPC", Granularity::Weekly);

        let first = cache.get(&q).await.expect("fetch succeeds");
        let second = cache.get(&q).await.expect("fetch succeeds");

        assert_eq!(first, second);
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn distinct_keys_are_fetched_separately() {
        let cache = CachedPriceSource::new(CountingSource::new(false));

        cache
            .fetch(&query("^GSPC", Granularity::Weekly))
            .await
            .expect("fetch succeeds");
        cache
            .fetch(&query("^GSPC", Granularity::Daily))
            .await
            .expect("fetch succeeds");
        cache
            .fetch(&query("SPY", Granularity::Weekly))
            .await
            .expect("fetch succeeds");

        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 3);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = CachedPriceSource::new(CountingSource::new(true));
        let q = query("NOPE", Granularity::Weekly);

        for _ in 0..2 {
            let err = cache.get(&q).await.expect_err("source always fails");
            assert!(matches!(err, DataError::Unavailable { .. }));
        }
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn distinct_windows_are_bounded_by_capacity() {
        let cache = CachedPriceSource::with_capacity(CountingSource::new(false), 3);

        for day in 1..=10 {
            cache.get(&query_starting(day)).await.expect("fetch succeeds");
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.capacity(), 3);

        // Days 8..=10 survive; day 1 was evicted and is fetched again.
        cache.get(&query_starting(10)).await.expect("fetch succeeds");
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 10);
        cache.get(&query_starting(1)).await.expect("fetch succeeds");
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 11);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn default_capacity_is_bounded() {
        let cache = CachedPriceSource::new(CountingSource::new(false));
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
        assert!(CachedPriceSource::with_capacity(CountingSource::new(false), 0).capacity() >= 1);
    }
}
