use chrono::NaiveDate;
use futures_util::{StreamExt, TryStreamExt, stream};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{error, info};

use crate::{
    TimeSeries,
    error::FetchError,
    provider::{HistoricalDataSource, SeriesQuery},
    variable::VariableRegistry,
};

/// Resolves variables against the registry and fetches their history from
/// the upstream source.
#[derive(Debug, Clone)]
pub struct HistoricalDataClient {
    source: Arc<dyn HistoricalDataSource>,
    registry: Arc<VariableRegistry>,
    concurrency: usize,
}

impl HistoricalDataClient {
    pub fn new(source: Arc<dyn HistoricalDataSource>, registry: Arc<VariableRegistry>) -> Self {
        Self {
            source,
            registry,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` variables to be fetched at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    pub async fn fetch_series(
        &self,
        lat: f64,
        lon: f64,
        start: NaiveDate,
        end: NaiveDate,
        variable: &str,
    ) -> Result<TimeSeries, FetchError> {
        let definition = self.registry.lookup(variable)?;
        if start > end {
            return Err(FetchError::InvalidRange { start, end });
        }

        let query = SeriesQuery {
            lat,
            lon,
            start,
            end,
            param: &definition.upstream_param,
        };
        self.source.fetch_param(&query).await
    }

    /// Fetch every registered variable. The first failure aborts the whole
    /// call; a partial mapping is never returned.
    pub async fn fetch_all(
        &self,
        lat: f64,
        lon: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<String, TimeSeries>, FetchError> {
        let names: Vec<String> = self.registry.all_names().map(str::to_string).collect();

        stream::iter(names)
            .map(|name| async move {
                info!(variable = %name, "downloading historical data");
                match self.fetch_series(lat, lon, start, end, &name).await {
                    Ok(series) => {
                        info!(
                            variable = %name,
                            observations = series.len(),
                            "historical data downloaded"
                        );
                        Ok((name, series))
                    }
                    Err(err) => {
                        error!(variable = %name, error = %err, "historical download failed");
                        Err(err)
                    }
                }
            })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }
}
