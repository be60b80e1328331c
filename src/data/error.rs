use chrono::NaiveDate;
use thiserror::Error;

/// Failures raised by price sources.
#[derive(Debug, Error)]
pub enum DataError {
    /// The provider returned no rows for the requested window.
    #[error("no data found for {instrument} between {start} and {end}")]
    Unavailable {
        instrument: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("invalid instrument identifier: {0:?}")]
    InvalidInstrument(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DataError>;
