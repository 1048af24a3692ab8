use anyhow::Context;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::{
    config::ApiKey,
    error::LookupError,
    model::{LocationQuery, WeatherReport},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
const CURRENT_PATH: &str = "/data/2.5/weather";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: ApiKey,
    language: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: ApiKey, language: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for OpenWeather")?;

        Ok(Self {
            api_key,
            language,
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
        })
    }

    /// Use a preconfigured HTTP client (proxy settings, custom timeouts).
    pub fn with_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Point the provider at another host, e.g. a local test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn query_params(&self, query: &LocationQuery) -> Vec<(&'static str, String)> {
        let mut params = location_params(query);
        params.push(("appid", self.api_key.expose().to_string()));
        params.push(("units", "metric".to_string()));
        params.push(("lang", self.language.clone()));
        params
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(&self, query: &LocationQuery) -> Result<WeatherReport, LookupError> {
        let url = format!("{}{CURRENT_PATH}", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&self.query_params(query))
            .send()
            .await
            .map_err(transport_error)?;

        let status = res.status();
        let body = res.text().await.map_err(transport_error)?;

        log::debug!("OpenWeather answered {status} for {query}");
        parse_current(status, &body)
    }
}

/// `q` for names, `lat`/`lon` for coordinates; never both.
pub fn location_params(query: &LocationQuery) -> Vec<(&'static str, String)> {
    match query {
        LocationQuery::ByName(name) => vec![("q", name.trim().to_string())],
        LocationQuery::ByCoordinates { lat, lon } => {
            vec![("lat", lat.to_string()), ("lon", lon.to_string())]
        }
    }
}

/// Turn a raw HTTP answer into a report or a user-facing error.
pub fn parse_current(status: StatusCode, body: &str) -> Result<WeatherReport, LookupError> {
    let envelope = serde_json::from_str::<OwStatus>(body).ok();

    if !status.is_success() {
        let message = envelope
            .and_then(|e| e.message)
            .and_then(|m| capitalize(&m))
            .unwrap_or_else(|| format!("Weather service returned {status}"));
        return Err(LookupError::Provider(message));
    }

    if let Some(envelope) = envelope {
        if envelope.cod.as_ref().is_some_and(|cod| !cod.is_ok()) {
            let message = envelope
                .message
                .and_then(|m| capitalize(&m))
                .unwrap_or_else(|| "The weather service could not answer this request".into());
            return Err(LookupError::Provider(message));
        }
    }

    let parsed: OwCurrentResponse = serde_json::from_str(body).map_err(|err| {
        log::debug!("OpenWeather body did not match the expected shape: {err}");
        LookupError::Transport("Received a malformed response from the weather service".into())
    })?;

    let (description, icon) = parsed
        .weather
        .into_iter()
        .next()
        .map(|w| (w.description, w.icon))
        .unwrap_or_else(|| ("Unknown".to_string(), String::new()));

    Ok(WeatherReport {
        city: parsed.name,
        country: parsed.sys.country.unwrap_or_default(),
        temperature_c: parsed.main.temp,
        feels_like_c: parsed.main.feels_like,
        humidity_pct: parsed.main.humidity,
        wind_speed_mps: parsed.wind.speed,
        description,
        icon,
        observed_at: parsed.dt.and_then(|ts| DateTime::from_timestamp(ts, 0)),
    })
}

fn transport_error(err: reqwest::Error) -> LookupError {
    // The URL carries the API key.
    let err = err.without_url();
    log::debug!("OpenWeather request failed: {err}");

    let message = if err.is_timeout() {
        "The weather service did not respond in time"
    } else if err.is_connect() {
        "Could not connect to the weather service"
    } else {
        "Network error while contacting the weather service"
    };
    LookupError::Transport(message.to_string())
}

fn capitalize(message: &str) -> Option<String> {
    let trimmed = message.trim();
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

/// `cod` arrives as a number on success and as a string on most errors.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OwCode {
    Number(i64),
    Text(String),
}

impl OwCode {
    fn is_ok(&self) -> bool {
        match self {
            OwCode::Number(n) => *n == 200,
            OwCode::Text(s) => s.trim() == "200",
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwStatus {
    cod: Option<OwCode>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: Option<i64>,
    #[serde(default)]
    sys: OwSys,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: OwWind,
}
