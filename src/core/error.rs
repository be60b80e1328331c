use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("no data found for the selected window")]
    EmptyInput,

    #[error("price series is not strictly ascending at row {index}: {current} follows {previous}")]
    UnsortedInput {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("price on {date} must be a positive number, got {price}")]
    InvalidPrice { date: NaiveDate, price: f64 },

    #[error("values overflow on {date}: units held {units_held}, wealth {wealth}")]
    NonFiniteValue {
        date: NaiveDate,
        units_held: f64,
        wealth: f64,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
