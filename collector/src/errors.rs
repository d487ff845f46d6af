use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Geocoding error: {0}")]
    Geocode(#[from] GeocodeError),

    #[error("Invalid isoformat string: '{0}'")]
    InvalidTimestamp(String),

    #[error("Entry {0} not found")]
    EntryNotFound(Uuid),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures talking to the IP geolocation API.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("response body could not be decoded: {0}")]
    Body(String),

    #[error("response has no location field")]
    MissingLocation,

    #[error("malformed location field: {0:?}")]
    MalformedLocation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
