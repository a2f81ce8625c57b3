use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::SeriesError;

/// A daily series of observations or predictions.
///
/// `dates` and `values` always have the same length and `dates` is strictly
/// increasing. Missing upstream points are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, SeriesError> {
        if dates.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                dates: dates.len(),
                values: values.len(),
            });
        }

        if let Some(pair) = dates.windows(2).find(|w| w[1] <= w[0]) {
            return Err(SeriesError::NotIncreasing(pair[1]));
        }

        Ok(Self { dates, values })
    }

    /// One value per calendar day starting at `start`. Values past the last
    /// representable date are dropped.
    pub fn daily(start: NaiveDate, mut values: Vec<f64>) -> Self {
        let dates: Vec<NaiveDate> = start.iter_days().take(values.len()).collect();
        values.truncate(dates.len());
        Self { dates, values }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The last `n` observations (or all of them when shorter).
    pub fn tail(&self, n: usize) -> TimeSeries {
        let start = self.len().saturating_sub(n);
        Self {
            dates: self.dates[start..].to_vec(),
            values: self.values[start..].to_vec(),
        }
    }

    /// Split at `index`: `[0, index)` and `[index, len)`.
    pub fn split_at(&self, index: usize) -> (TimeSeries, TimeSeries) {
        let index = index.min(self.len());
        let (d1, d2) = self.dates.split_at(index);
        let (v1, v2) = self.values.split_at(index);
        (
            Self { dates: d1.to_vec(), values: v1.to_vec() },
            Self { dates: d2.to_vec(), values: v2.to_vec() },
        )
    }

    pub fn into_parts(self) -> (Vec<NaiveDate>, Vec<f64>) {
        (self.dates, self.values)
    }
}

/// Accuracy of a model on held-out observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    #[serde(rename = "MSE")]
    pub mse: f64,
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    #[serde(rename = "MAE")]
    pub mae: f64,
    #[serde(rename = "R2")]
    pub r2: f64,
}

impl AccuracyMetrics {
    /// Compare predictions against actual values. Returns `None` when the
    /// slices are empty or of different length.
    pub fn from_predictions(predicted: &[f64], actual: &[f64]) -> Option<Self> {
        if predicted.is_empty() || predicted.len() != actual.len() {
            return None;
        }

        let n = actual.len() as f64;
        let mse = predicted
            .iter()
            .zip(actual)
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / n;
        let mae = predicted.iter().zip(actual).map(|(p, a)| (p - a).abs()).sum::<f64>() / n;

        let mean = actual.iter().sum::<f64>() / n;
        let ss_tot = actual.iter().map(|a| (a - mean).powi(2)).sum::<f64>();
        let ss_res = mse * n;
        // A constant validation span has no variance to explain.
        let r2 = if ss_tot == 0.0 {
            if ss_res == 0.0 { 1.0 } else { 0.0 }
        } else {
            1.0 - ss_res / ss_tot
        };

        Some(Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Forecast for one variable within one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub values: Vec<f64>,
    pub dates: Vec<NaiveDate>,
    pub unit: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<AccuracyMetrics>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ForecastEntry {
    pub fn success(
        series: TimeSeries,
        unit: &str,
        description: &str,
        metrics: Option<AccuracyMetrics>,
    ) -> Self {
        let (dates, values) = series.into_parts();
        Self {
            values,
            dates,
            unit: unit.to_string(),
            description: description.to_string(),
            metrics,
            status: Status::Success,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            values: Vec::new(),
            dates: Vec::new(),
            unit: String::new(),
            description: String::new(),
            metrics: None,
            status: Status::Error,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// The aggregated multi-variable forecast returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub location: Location,
    pub forecast_date: String,
    pub days_ahead: u32,
    pub forecasts: BTreeMap<String, ForecastEntry>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ForecastResult {
    pub fn failed(
        location: Location,
        forecast_date: &str,
        days_ahead: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            location,
            forecast_date: forecast_date.to_string(),
            days_ahead,
            forecasts: BTreeMap::new(),
            status: Status::Error,
            error: Some(message.into()),
        }
    }
}
