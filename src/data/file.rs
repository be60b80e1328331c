use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{DataError, PriceQuery, PriceSource, Result, normalize_samples, resample};
use crate::core::PriceSample;

/// Reads `<dir>/<instrument>.json`, an array of `{"date": "YYYY-MM-DD", "price": n}`.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    dir: PathBuf,
}

impl JsonFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, instrument: &str) -> Result<PathBuf> {
        let trimmed = instrument.trim();
        if trimmed.is_empty()
            || trimmed.contains(['/', '\\'])
            || trimmed.starts_with('.')
        {
            return Err(DataError::InvalidInstrument(instrument.to_string()));
        }
        Ok(self.dir.join(format!("{trimmed}.json")))
    }
}

#[async_trait]
impl PriceSource for JsonFileSource {
    async fn fetch(&self, query: &PriceQuery) -> Result<Vec<PriceSample>> {
        let path = self.path_for(&query.instrument)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(query.unavailable()),
            Err(e) => return Err(e.into()),
        };

        let samples: Vec<PriceSample> = serde_json::from_str(&raw)
            .map_err(|e| DataError::Parse(format!("{}: {e}", path.display())))?;
        let samples = resample(
            normalize_samples(samples, query.start, query.end),
            query.granularity,
        );
        debug!(path = %path.display(), samples = samples.len(), "loaded price file");

        if samples.is_empty() {
            return Err(query.unavailable());
        }
        Ok(samples)
    }
}
