use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate};
use time::OffsetDateTime;
use tracing::debug;
use yahoo_finance_api as yahoo;

use super::{DataError, PriceQuery, PriceSource, Result, normalize_samples};
use crate::core::PriceSample;

/// Historical closes from Yahoo Finance.
pub struct YahooSource {
    connector: yahoo::YahooConnector,
}

impl YahooSource {
    pub fn new() -> Result<Self> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| DataError::Fetch(format!("failed to create Yahoo Finance connector: {e}")))?;
        Ok(Self { connector })
    }
}

#[async_trait]
impl PriceSource for YahooSource {
    async fn fetch(&self, query: &PriceQuery) -> Result<Vec<PriceSample>> {
        // The provider treats the end bound as exclusive.
        let start = to_offset_datetime(query.start)?;
        let end = to_offset_datetime(query.end.succ_opt().unwrap_or(query.end))?;
        let interval = query.granularity.interval();

        debug!(
            instrument = %query.instrument,
            interval,
            start = %query.start,
            end = %query.end,
            "requesting Yahoo Finance history"
        );

        let response = self
            .connector
            .get_quote_history_interval(&query.instrument, start, end, interval)
            .await
            .map_err(|e| DataError::Fetch(format!("Yahoo Finance ({}): {e}", query.instrument)))?;
        let quotes = response
            .quotes()
            .map_err(|e| DataError::Parse(format!("Yahoo Finance quotes: {e}")))?;

        let raw_count = quotes.len();
        let samples: Vec<PriceSample> = quotes
            .iter()
            .filter_map(|q| {
                let date = DateTime::from_timestamp(q.timestamp as i64, 0)?.date_naive();
                Some(PriceSample::new(date, q.close))
            })
            .collect();
        let samples = normalize_samples(samples, query.start, query.end);

        if samples.len() < raw_count {
            debug!(
                instrument = %query.instrument,
                dropped = raw_count - samples.len(),
                "discarded out-of-window, duplicate or unpriced quotes"
            );
        }
        if samples.is_empty() {
            return Err(query.unavailable());
        }
        Ok(samples)
    }
}

fn to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime> {
    let month = u8::try_from(date.month())
        .ok()
        .and_then(|m| time::Month::try_from(m).ok())
        .ok_or_else(|| DataError::Parse(format!("invalid month in {date}")))?;
    let day = u8::try_from(date.day()).map_err(|e| DataError::Parse(e.to_string()))?;
    let date = time::Date::from_calendar_date(date.year(), month, day)
        .map_err(|e| DataError::Parse(e.to_string()))?;
    Ok(date.midnight().assume_utc())
}
