use chrono::{DateTime, Utc};
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// A numeric knob is outside the range the computors accept.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("invalid time range: end {end} must be after start {start}")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// The external series source failed outright. An empty fetch is not an error.
    #[error("series source failed for station={station} series={series_id}: {message}")]
    Source {
        station: String,
        series_id: String,
        message: String,
    },

    #[error("no zone pair found for station={station} zone_root={zone_root}")]
    ZoneNotFound { station: String, zone_root: String },
}

impl EngineError {
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    pub fn source(
        station: impl Into<String>,
        series_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Source {
            station: station.into(),
            series_id: series_id.into(),
            message: message.into(),
        }
    }
}
