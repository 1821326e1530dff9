use std::io;

use thiserror::Error;

pub type GeoResult<T> = Result<T, GeoError>;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("{0}")]
    Config(String),
    #[error("{0}")]
    Parse(String),
    #[error("geocoding failed: {0}")]
    Geocode(String),
    #[error("cache error: {0}")]
    Cache(String),
}
