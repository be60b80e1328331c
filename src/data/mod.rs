//! Price sources feeding the engine.
//!
//! Every source honours the same contract: the returned series is ascending,
//! holds one sample per date, stays inside the requested window and only
//! carries positive prices. An empty result is reported as
//! [`DataError::Unavailable`] and is never retried here.

mod cache;
mod error;
mod file;
mod yahoo;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

use crate::core::PriceSample;

pub use cache::CachedPriceSource;
pub use error::{DataError, Result};
pub use file::JsonFileSource;
pub use yahoo::YahooSource;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Granularity {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

impl Granularity {
    /// Interval string understood by Yahoo Finance.
    pub fn interval(self) -> &'static str {
        match self {
            Granularity::Daily => "1d",
            Granularity::Weekly => "1wk",
            Granularity::Monthly => "1mo",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PriceQuery {
    pub instrument: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: Granularity,
}

impl PriceQuery {
    pub(crate) fn unavailable(&self) -> DataError {
        DataError::Unavailable {
            instrument: self.instrument.clone(),
            start: self.start,
            end: self.end,
        }
    }
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self, query: &PriceQuery) -> Result<Vec<PriceSample>>;
}

#[async_trait]
impl<T: PriceSource + ?Sized> PriceSource for Box<T> {
    async fn fetch(&self, query: &PriceQuery) -> Result<Vec<PriceSample>> {
        (**self).fetch(query).await
    }
}

#[async_trait]
impl<T: PriceSource + ?Sized> PriceSource for Arc<T> {
    async fn fetch(&self, query: &PriceQuery) -> Result<Vec<PriceSample>> {
        (**self).fetch(query).await
    }
}

/// Sorts by date, keeps the last sample for a repeated date, and drops
/// samples that are outside `start..=end` or not priced positively.
pub fn normalize_samples(
    mut samples: Vec<PriceSample>,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<PriceSample> {
    samples.retain(|s| s.price.is_finite() && s.price > 0.0 && s.date >= start && s.date <= end);
    samples.sort_by_key(|s| s.date);

    let mut out: Vec<PriceSample> = Vec::with_capacity(samples.len());
    for sample in samples {
        match out.last_mut() {
            Some(last) if last.date == sample.date => *last = sample,
            _ => out.push(sample),
        }
    }
    out
}

/// Keeps the last sample of each ISO week or calendar month.
///
/// Input must already be normalized.
pub fn resample(samples: Vec<PriceSample>, granularity: Granularity) -> Vec<PriceSample> {
    let period = |date: NaiveDate| -> (i32, u32) {
        match granularity {
            Granularity::Daily => (date.year(), date.ordinal()),
            Granularity::Weekly => {
                let week = date.iso_week();
                (week.year(), week.week())
            }
            Granularity::Monthly => (date.year(), date.month()),
        }
    };

    let mut out: Vec<PriceSample> = Vec::with_capacity(samples.len());
    for sample in samples {
        match out.last_mut() {
            Some(last) if period(last.date) == period(sample.date) => *last = sample,
            _ => out.push(sample),
        }
    }
    out
}
