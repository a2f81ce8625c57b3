use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

use crate::variable::RegistryError;

/// Violations of the `TimeSeries` shape invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("Series has {dates} dates but {values} values")]
    LengthMismatch { dates: usize, values: usize },

    #[error("Series dates are not strictly increasing at {0}")]
    NotIncreasing(NaiveDate),
}

/// Failures of the historical data client.
///
/// Every variant except `UnsupportedVariable` and `InvalidRange` is a
/// transport or payload problem with the upstream provider.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Variable {0} not supported")]
    UnsupportedVariable(String),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Upstream request failed with status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Unexpected upstream response format: {0}")]
    Parse(String),

    #[error("Upstream request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Failed to send request to upstream provider")]
    Transport(#[source] reqwest::Error),
}

impl From<RegistryError> for FetchError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(name) => FetchError::UnsupportedVariable(name),
        }
    }
}

impl From<SeriesError> for FetchError {
    fn from(err: SeriesError) -> Self {
        FetchError::Parse(err.to_string())
    }
}

/// Per-variable model failures. These are always reported in-band on the
/// variable's forecast entry and never fail the whole request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Training failed: {0}")]
    Training(String),

    #[error("Forecast generation failed: {0}")]
    Generation(String),
}

/// Request-level failures that produce a top-level error result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SystemError {
    #[error("No variables are registered")]
    EmptyRegistry,

    #[error("Invalid forecast date '{0}', expected YYYY-MM-DD")]
    InvalidForecastDate(String),

    #[error("Latitude {0} must be between -90 and 90")]
    InvalidLatitude(f64),

    #[error("Longitude {0} must be between -180 and 180")]
    InvalidLongitude(f64),

    #[error("Days ahead {0} must be between 1 and 30")]
    InvalidHorizon(u32),

    #[error("forecast cancelled")]
    Cancelled,
}

/// Shorten an upstream body before it ends up in an error message.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_not_found_maps_to_unsupported_variable() {
        let err: FetchError = RegistryError::NotFound("snow".into()).into();
        assert!(matches!(err, FetchError::UnsupportedVariable(ref name) if name == "snow"));
        assert_eq!(err.to_string(), "Variable snow not supported");
    }

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("bad request"), "bad request");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "é".repeat(150);
        let out = truncate_body(&body);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 203);
    }
}
