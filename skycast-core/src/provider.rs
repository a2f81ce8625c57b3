use crate::{Config, TimeSeries, error::FetchError, provider::meteomatics::MeteomaticsProvider};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt::Debug;

pub mod meteomatics;

/// One single-parameter, single-location request to the upstream provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesQuery<'a> {
    pub lat: f64,
    pub lon: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Provider-specific parameter, e.g. "t_2m:C".
    pub param: &'a str,
}

/// Transport to a historical time-series API.
///
/// Implementations own the wire format and authentication; variable names
/// are resolved before this layer is reached.
#[async_trait]
pub trait HistoricalDataSource: Send + Sync + Debug {
    async fn fetch_param(&self, query: &SeriesQuery<'_>) -> Result<TimeSeries, FetchError>;
}

/// Construct the upstream provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn HistoricalDataSource>> {
    let (username, password) = config.provider.credentials().ok_or_else(|| {
        anyhow::anyhow!(
            "No credentials configured for the historical data provider.\n\
                 Hint: run `skycast configure` or set MET_USER and MET_PASS."
        )
    })?;

    let provider = MeteomaticsProvider::new(
        &config.provider.base_url,
        username,
        password,
        &config.provider.sampling_interval,
        config.provider.timeout(),
    )?;

    Ok(Box::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_config_errors_when_missing_credentials() {
        let cfg = Config::default();
        let err = provider_from_config(&cfg).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("No credentials configured"));
        assert!(msg.contains("Hint: run `skycast configure`"));
    }

    #[test]
    fn provider_from_config_works_when_configured() {
        let mut cfg = Config::default();
        cfg.set_credentials("user".into(), "pass".into());
        assert!(provider_from_config(&cfg).is_ok());
    }
}
