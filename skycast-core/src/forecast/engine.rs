use chrono::{DateTime, NaiveDate, Utc};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    AccuracyMetrics, Config, ForecastEntry, ForecastResult, Location, Status, TimeSeries,
    client::HistoricalDataClient,
    config::HistoryWindow,
    error::{FetchError, ModelError, SystemError},
    provider::{HistoricalDataSource, provider_from_config},
    variable::VariableDefinition,
};

use super::{
    algorithm::{FittedModel, ForecastAlgorithm, algorithm_from_config, holdout_metrics},
    fallback::synthetic_history,
};

const MODEL_UNAVAILABLE: &str = "Modelo no disponible";
const MAX_DAYS_AHEAD: u32 = 30;

/// Tunables for model preparation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub history: HistoryWindow,
    pub training_window: usize,
    pub validation_fraction: f64,
    pub request_deadline: Option<Duration>,
    pub seed: u64,
    pub model_dir: String,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            history: config.history,
            training_window: config.engine.training_window,
            validation_fraction: config.engine.validation_fraction,
            request_deadline: config.request_deadline(),
            seed: config.engine.seed,
            model_dir: config.engine.model_dir.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Where the training history for a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistorySource {
    Upstream,
    /// Synthetic stand-in; there is nothing real to score against.
    Fallback,
}

/// Request-scoped model state for one (location, variable) pair.
#[derive(Debug)]
pub struct ModelHandle {
    pub variable: String,
    pub artifact_location: String,
    pub training_window: TimeSeries,
    pub metrics: Option<AccuracyMetrics>,
    pub training_completed: bool,
    pub training_error: Option<String>,
    model: Option<Box<dyn FittedModel>>,
}

impl ModelHandle {
    fn trained(
        variable: &str,
        artifact_location: String,
        training_window: TimeSeries,
        metrics: Option<AccuracyMetrics>,
        model: Box<dyn FittedModel>,
    ) -> Self {
        Self {
            variable: variable.to_string(),
            artifact_location,
            training_window,
            metrics,
            training_completed: true,
            training_error: None,
            model: Some(model),
        }
    }

    fn failed(variable: &str, artifact_location: String, message: String) -> Self {
        Self {
            variable: variable.to_string(),
            artifact_location,
            training_window: TimeSeries::default(),
            metrics: None,
            training_completed: false,
            training_error: Some(message),
            model: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.training_completed && self.training_error.is_none() && self.model.is_some()
    }
}

/// Orchestrates history retrieval, per-variable model preparation and
/// forecast aggregation for one location at a time.
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    client: HistoricalDataClient,
    algorithm: Arc<dyn ForecastAlgorithm>,
    settings: EngineSettings,
}

impl ForecastEngine {
    pub fn new(
        client: HistoricalDataClient,
        algorithm: Arc<dyn ForecastAlgorithm>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            client,
            algorithm,
            settings,
        }
    }

    /// Wire up provider, registry and algorithm from config.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let registry = Arc::new(config.registry());
        let source: Arc<dyn HistoricalDataSource> = Arc::from(provider_from_config(config)?);
        let client = HistoricalDataClient::new(source, registry)
            .with_concurrency(config.engine.fetch_concurrency);
        let algorithm = algorithm_from_config(config)?;

        Ok(Self::new(client, algorithm, EngineSettings::from_config(config)))
    }

    pub async fn generate_forecast(
        &self,
        lat: f64,
        lon: f64,
        forecast_date: &str,
        days_ahead: u32,
    ) -> ForecastResult {
        let cancel = CancellationToken::new();
        self.generate_forecast_with_cancel(lat, lon, forecast_date, days_ahead, &cancel)
            .await
    }

    /// Like [`generate_forecast`](Self::generate_forecast), but gives up with a
    /// top-level error as soon as `cancel` fires.
    pub async fn generate_forecast_with_cancel(
        &self,
        lat: f64,
        lon: f64,
        forecast_date: &str,
        days_ahead: u32,
        cancel: &CancellationToken,
    ) -> ForecastResult {
        info!(lat, lon, forecast_date, days_ahead, "generating forecast");
        let location = Location { lat, lon };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SystemError::Cancelled),
            res = self.run(lat, lon, forecast_date, days_ahead) => res,
        };

        match outcome {
            Ok(forecasts) => ForecastResult {
                location,
                forecast_date: forecast_date.to_string(),
                days_ahead,
                forecasts,
                status: Status::Success,
                error: None,
            },
            Err(err) => {
                error!(error = %err, "forecast failed");
                ForecastResult::failed(location, forecast_date, days_ahead, err.to_string())
            }
        }
    }

    async fn run(
        &self,
        lat: f64,
        lon: f64,
        forecast_date: &str,
        days_ahead: u32,
    ) -> Result<BTreeMap<String, ForecastEntry>, SystemError> {
        let start = validate_request(lat, lon, forecast_date, days_ahead)?;
        if self.client.registry().is_empty() {
            return Err(SystemError::EmptyRegistry);
        }

        let models = self.prepare_models(lat, lon).await;

        let forecasts = self
            .client
            .registry()
            .definitions()
            .iter()
            .map(|definition| {
                let entry = match models.get(&definition.name) {
                    Some(handle) => self.forecast_entry(definition, handle, start, days_ahead),
                    None => ForecastEntry::failed(MODEL_UNAVAILABLE),
                };
                (definition.name.clone(), entry)
            })
            .collect();

        Ok(forecasts)
    }

    /// Download history for every variable and prepare one model each.
    ///
    /// A failed download never fails the request: every variable is then
    /// trained on synthetic history instead.
    pub async fn prepare_models(&self, lat: f64, lon: f64) -> BTreeMap<String, ModelHandle> {
        info!(lat, lon, "preparing models");

        let (history, source) = match self.fetch_history(lat, lon).await {
            Ok(history) => (history, HistorySource::Upstream),
            Err(err) => {
                warn!(error = %err, "historical download failed, training on synthetic data");
                let history = synthetic_history(
                    self.client.registry(),
                    lat,
                    lon,
                    self.settings.history.end,
                    self.settings.training_window,
                    self.settings.seed,
                );
                (history, HistorySource::Fallback)
            }
        };

        self.client
            .registry()
            .all_names()
            .map(|name| {
                let handle = match history.get(name) {
                    Some(series) => self.train(name, series, source, lat, lon),
                    None => ModelHandle::failed(
                        name,
                        self.artifact_location(name, lat, lon),
                        format!("No historical data for {name}"),
                    ),
                };
                (name.to_string(), handle)
            })
            .collect()
    }

    async fn fetch_history(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<BTreeMap<String, TimeSeries>, FetchError> {
        let HistoryWindow { start, end } = self.settings.history;
        let fetch = self.client.fetch_all(lat, lon, start, end);

        match self.settings.request_deadline {
            Some(deadline) => tokio::time::timeout(deadline, fetch)
                .await
                .map_err(|_| FetchError::Timeout(deadline))?,
            None => fetch.await,
        }
    }

    /// Fit on the most recent window. Only upstream history is scored.
    fn train(
        &self,
        variable: &str,
        history: &TimeSeries,
        source: HistorySource,
        lat: f64,
        lon: f64,
    ) -> ModelHandle {
        debug!(variable, observations = history.len(), ?source, "training model");
        let artifact_location = self.artifact_location(variable, lat, lon);
        let training_window = history.tail(self.settings.training_window);

        let trained = self
            .algorithm
            .fit(variable, &training_window)
            .and_then(|model| {
                let metrics = match source {
                    HistorySource::Upstream => holdout_metrics(
                        self.algorithm.as_ref(),
                        variable,
                        history,
                        self.settings.training_window,
                        self.settings.validation_fraction,
                    )?,
                    HistorySource::Fallback => None,
                };
                Ok((model, metrics))
            });

        match trained {
            Ok((model, metrics)) => {
                info!(variable, algorithm = self.algorithm.name(), "model ready");
                ModelHandle::trained(variable, artifact_location, training_window, metrics, model)
            }
            Err(err) => {
                warn!(variable, error = %err, "model training failed");
                ModelHandle::failed(variable, artifact_location, err.to_string())
            }
        }
    }

    fn forecast_entry(
        &self,
        definition: &VariableDefinition,
        handle: &ModelHandle,
        start: NaiveDate,
        days_ahead: u32,
    ) -> ForecastEntry {
        let model = match (&handle.model, handle.is_ready()) {
            (Some(model), true) => model,
            _ => {
                let message = handle
                    .training_error
                    .clone()
                    .unwrap_or_else(|| MODEL_UNAVAILABLE.to_string());
                warn!(variable = %definition.name, error = %message, "model unavailable");
                return ForecastEntry::failed(message);
            }
        };

        let horizon = days_ahead as usize;
        let forecast = model
            .predict(start, horizon)
            .and_then(|series| check_forecast(series, start, horizon));

        match forecast {
            Ok(series) => ForecastEntry::success(
                series,
                &definition.unit,
                &definition.description,
                handle.metrics,
            ),
            Err(err) => {
                warn!(variable = %definition.name, error = %err, "forecast generation failed");
                ForecastEntry::failed(err.to_string())
            }
        }
    }

    fn artifact_location(&self, variable: &str, lat: f64, lon: f64) -> String {
        format!(
            "{}/forecast_{variable}_{lat}_{lon}.json",
            self.settings.model_dir.trim_end_matches('/')
        )
    }
}

/// Defense in depth: the outer layer validates too, but the engine must not
/// trust it.
fn validate_request(
    lat: f64,
    lon: f64,
    forecast_date: &str,
    days_ahead: u32,
) -> Result<NaiveDate, SystemError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(SystemError::InvalidLatitude(lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(SystemError::InvalidLongitude(lon));
    }
    if !(1..=MAX_DAYS_AHEAD).contains(&days_ahead) {
        return Err(SystemError::InvalidHorizon(days_ahead));
    }
    parse_forecast_date(forecast_date)
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_forecast_date(raw: &str) -> Result<NaiveDate, SystemError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| {
            DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc).date_naive())
        })
        .map_err(|_| SystemError::InvalidForecastDate(raw.to_string()))
}

/// Enforce the forecast contract on whatever the algorithm produced.
fn check_forecast(
    series: TimeSeries,
    start: NaiveDate,
    horizon: usize,
) -> Result<TimeSeries, ModelError> {
    if series.len() != horizon || series.dates().len() != horizon {
        return Err(ModelError::Generation(format!(
            "expected {horizon} values, got {}",
            series.len()
        )));
    }
    if !series.dates().iter().copied().eq(start.iter_days().take(horizon)) {
        return Err(ModelError::Generation(format!(
            "dates must run daily from {start}"
        )));
    }
    if let Some(v) = series.values().iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
        return Err(ModelError::Generation(format!("invalid forecast value {v}")));
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn request_bounds_are_enforced() {
        assert_eq!(
            validate_request(91.0, 0.0, "2025-01-01", 1),
            Err(SystemError::InvalidLatitude(91.0))
        );
        assert_eq!(
            validate_request(0.0, -181.0, "2025-01-01", 1),
            Err(SystemError::InvalidLongitude(-181.0))
        );
        assert_eq!(
            validate_request(0.0, 0.0, "2025-01-01", 0),
            Err(SystemError::InvalidHorizon(0))
        );
        assert_eq!(
            validate_request(0.0, 0.0, "2025-01-01", 31),
            Err(SystemError::InvalidHorizon(31))
        );
        assert!(validate_request(f64::NAN, 0.0, "2025-01-01", 1).is_err());
        assert_eq!(validate_request(-90.0, 180.0, "2025-01-01", 30), Ok(date("2025-01-01")));
    }

    #[test]
    fn forecast_date_accepts_plain_and_rfc3339() {
        assert_eq!(parse_forecast_date("2025-01-01"), Ok(date("2025-01-01")));
        assert_eq!(parse_forecast_date("2025-01-01T10:00:00Z"), Ok(date("2025-01-01")));
        assert_eq!(
            parse_forecast_date("tomorrow"),
            Err(SystemError::InvalidForecastDate("tomorrow".into()))
        );
    }

    #[test]
    fn check_forecast_rejects_contract_violations() {
        let start = date("2025-01-01");

        let short = TimeSeries::daily(start, vec![1.0]);
        assert!(check_forecast(short, start, 2).is_err());

        let shifted = TimeSeries::daily(date("2025-01-02"), vec![1.0, 2.0]);
        assert!(check_forecast(shifted, start, 2).is_err());

        let negative = TimeSeries::daily(start, vec![1.0, -0.5]);
        assert!(check_forecast(negative, start, 2).is_err());

        let last = NaiveDate::MAX.pred_opt().unwrap();
        let truncated = TimeSeries::daily(last, vec![1.0, 2.0, 3.0]);
        assert!(check_forecast(truncated, last, 3).is_err());

        let ok = TimeSeries::daily(start, vec![0.0, 2.0]);
        assert!(check_forecast(ok, start, 2).is_ok());
    }
}
