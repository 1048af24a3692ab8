use crate::{Config, LocationQuery, LookupError, WeatherReport};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

pub use openweather::OpenWeatherProvider;

/// Source of current conditions. OpenWeather is the only production
/// implementation; tests plug in scripted doubles.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(&self, query: &LocationQuery) -> Result<WeatherReport, LookupError>;
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.api_key()?;
    let provider =
        OpenWeatherProvider::new(api_key, config.language.clone(), config.request_timeout())?;

    Ok(Arc::new(provider))
}
