use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use inquire::{Password, Text};
use skycast_core::{Config, ForecastEngine, ForecastResult, Status, service_status};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skycast", version, about = "Location-based weather forecasts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for the historical data provider.
    Configure,

    /// Forecast every supported variable for a location.
    Forecast {
        /// Latitude in degrees, -90..=90.
        #[arg(long, default_value_t = -12.04318, allow_negative_numbers = true)]
        lat: f64,

        /// Longitude in degrees, -180..=180.
        #[arg(long, default_value_t = -77.02824, allow_negative_numbers = true)]
        lon: f64,

        /// First forecast day (YYYY-MM-DD); if absent, means "today".
        #[arg(long)]
        date: Option<String>,

        /// Number of days to forecast, 1..=30.
        #[arg(long, default_value_t = 1)]
        days: u32,

        /// Print the raw JSON result instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show service status and supported variables as JSON.
    Status,

    /// List the supported variables.
    Variables,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure()?,
            Command::Forecast {
                lat,
                lon,
                date,
                days,
                json,
            } => {
                validate_request(lat, lon, days)?;
                let date = date.unwrap_or_else(|| Utc::now().date_naive().to_string());

                let config = Config::load()?;
                let engine = ForecastEngine::from_config(&config)?;

                let cancel = CancellationToken::new();
                let on_signal = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupted, cancelling forecast");
                        on_signal.cancel();
                    }
                });

                let result = engine
                    .generate_forecast_with_cancel(lat, lon, &date, days, &cancel)
                    .await;

                if json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                } else {
                    print!("{}", render_forecast(&result));
                }

                if result.status == Status::Error {
                    bail!(
                        "{}",
                        result.error.unwrap_or_else(|| "forecast failed".to_string())
                    );
                }
            }
            Command::Status => {
                let config = Config::load()?;
                let status = service_status(&config.registry());
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            Command::Variables => {
                let config = Config::load()?;
                for def in config.registry().definitions() {
                    println!(
                        "{:<15} {:<25} {:<6} {}",
                        def.name, def.upstream_param, def.unit, def.description
                    );
                }
            }
        }

        Ok(())
    }
}

fn configure() -> anyhow::Result<()> {
    let path = Config::config_file_path()?;
    // Read the file directly so environment credentials are not persisted.
    let mut config = if path.exists() {
        Config::load_from(&path)?
    } else {
        Config::default()
    };

    let mut username = Text::new("Provider username:");
    if let Some(current) = config.provider.username.as_deref() {
        username = username.with_default(current);
    }
    let username = username.prompt().context("Failed to read username")?;

    let password = Password::new("Provider password:")
        .without_confirmation()
        .prompt()
        .context("Failed to read password")?;

    config.set_credentials(username, password);
    config.save()?;

    println!("Configuration saved to {}", path.display());
    Ok(())
}

/// Request bounds, checked before the engine is involved.
fn validate_request(lat: f64, lon: f64, days: u32) -> anyhow::Result<()> {
    if !(-90.0..=90.0).contains(&lat) {
        bail!("Latitud debe estar entre -90 y 90");
    }
    if !(-180.0..=180.0).contains(&lon) {
        bail!("Longitud debe estar entre -180 y 180");
    }
    if !(1..=30).contains(&days) {
        bail!("Días de pronóstico debe estar entre 1 y 30");
    }
    Ok(())
}

fn render_forecast(result: &ForecastResult) -> String {
    let mut out = format!(
        "Forecast for {}, {} from {} ({} days)\n",
        result.location.lat, result.location.lon, result.forecast_date, result.days_ahead
    );

    for (name, entry) in &result.forecasts {
        out.push('\n');
        if !entry.is_success() {
            out.push_str(&format!(
                "{name}: unavailable ({})\n",
                entry.error.as_deref().unwrap_or("unknown error")
            ));
            continue;
        }

        out.push_str(&format!("{name} [{}] {}\n", entry.unit, entry.description));
        for (date, value) in entry.dates.iter().zip(&entry.values) {
            out.push_str(&format!("  {date}  {value:>8.2}\n"));
        }
        if let Some(m) = entry.metrics {
            out.push_str(&format!(
                "  MSE {:.3}  RMSE {:.3}  MAE {:.3}  R2 {:.3}\n",
                m.mse, m.rmse, m.mae, m.r2
            ));
        }
    }

    out
}
