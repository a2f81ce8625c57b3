use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{
    TimeSeries,
    error::{FetchError, truncate_body},
};

use super::{HistoricalDataSource, SeriesQuery};

/// Value the provider reports for points it has no data for.
const MISSING_VALUE: f64 = -999.0;

#[derive(Debug, Clone)]
pub struct MeteomaticsProvider {
    base_url: String,
    username: String,
    password: String,
    interval: String,
    timeout: Duration,
    http: Client,
}

impl MeteomaticsProvider {
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        interval: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Meteomatics HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            interval: interval.to_string(),
            timeout,
            http,
        })
    }

    /// `{base}/{start}--{end}:{interval}/{param}/{lat},{lon}/json`
    fn series_url(&self, query: &SeriesQuery<'_>) -> String {
        format!(
            "{}/{}--{}:{}/{}/{},{}/json",
            self.base_url,
            instant(query.start),
            instant(query.end),
            self.interval,
            query.param,
            query.lat,
            query.lon,
        )
    }

    fn transport_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(err)
        }
    }
}

#[async_trait]
impl HistoricalDataSource for MeteomaticsProvider {
    async fn fetch_param(&self, query: &SeriesQuery<'_>) -> Result<TimeSeries, FetchError> {
        let url = self.series_url(query);
        debug!(%url, "requesting historical series");

        let res = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(FetchError::Upstream {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        parse_series(&body)
    }
}

#[derive(Debug, Deserialize)]
struct MmResponse {
    data: Vec<MmParameter>,
}

#[derive(Debug, Deserialize)]
struct MmParameter {
    coordinates: Vec<MmCoordinate>,
}

#[derive(Debug, Deserialize)]
struct MmCoordinate {
    dates: Vec<MmValue>,
}

#[derive(Debug, Deserialize)]
struct MmValue {
    date: String,
    value: Option<f64>,
}

/// Flatten a single-parameter, single-location response into a series.
pub(crate) fn parse_series(body: &str) -> Result<TimeSeries, FetchError> {
    let parsed: MmResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("invalid JSON: {e}")))?;

    let points = parsed
        .data
        .into_iter()
        .next()
        .and_then(|p| p.coordinates.into_iter().next())
        .map(|c| c.dates)
        .ok_or_else(|| FetchError::Parse("response contained no coordinate data".into()))?;

    let mut dates = Vec::with_capacity(points.len());
    let mut values = Vec::with_capacity(points.len());
    for point in points {
        let Some(value) = point.value.filter(|v| v.is_finite() && *v != MISSING_VALUE) else {
            continue;
        };
        let date = DateTime::parse_from_rfc3339(&point.date)
            .map(|dt| dt.with_timezone(&Utc).date_naive())
            .map_err(|e| FetchError::Parse(format!("invalid date '{}': {e}", point.date)))?;
        dates.push(date);
        values.push(value);
    }

    if values.is_empty() {
        return Err(FetchError::Parse("response contained no observations".into()));
    }

    Ok(TimeSeries::new(dates, values)?)
}

fn instant(date: NaiveDate) -> String {
    format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
}
