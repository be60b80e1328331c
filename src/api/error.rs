use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::core::EngineError;
use crate::data::DataError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(EngineError::InvalidConfiguration(_)) => StatusCode::BAD_REQUEST,
            ApiError::Engine(EngineError::EmptyInput) => StatusCode::NOT_FOUND,
            ApiError::Engine(EngineError::UnsortedInput { .. })
            | ApiError::Engine(EngineError::InvalidPrice { .. })
            | ApiError::Engine(EngineError::NonFiniteValue { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Data(DataError::Unavailable { .. }) => StatusCode::NOT_FOUND,
            ApiError::Data(DataError::InvalidInstrument(_)) => StatusCode::BAD_REQUEST,
            ApiError::Data(_) => StatusCode::BAD_GATEWAY,
            ApiError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        super::error_response(self.status(), &self.to_string())
    }
}
