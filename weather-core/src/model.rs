use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::LookupError;

const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

/// What to look up: a city by name or a coordinate pair.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    ByName(String),
    ByCoordinates { lat: f64, lon: f64 },
}

impl LocationQuery {
    /// Build a name query from raw user input, trimming it.
    pub fn by_name(input: &str) -> Result<Self, LookupError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(LookupError::Validation(
                "Please enter a city name.".to_string(),
            ));
        }
        Ok(LocationQuery::ByName(trimmed.to_string()))
    }

    pub fn by_coordinates(coords: Coordinates) -> Self {
        LocationQuery::ByCoordinates {
            lat: coords.latitude,
            lon: coords.longitude,
        }
    }

    /// Re-check a query that may have been built directly from the enum.
    pub fn validate(&self) -> Result<(), LookupError> {
        match self {
            LocationQuery::ByName(name) => Self::by_name(name).map(|_| ()),
            LocationQuery::ByCoordinates { .. } => Ok(()),
        }
    }
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationQuery::ByName(name) => f.write_str(name.trim()),
            LocationQuery::ByCoordinates { lat, lon } => write!(f, "({lat}, {lon})"),
        }
    }
}

/// A position reported by a [`crate::geolocation::Locator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Display-ready snapshot of current conditions for one location.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub city: String,
    pub country: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    pub description: String,
    /// Key into the provider's icon namespace, e.g. `01d`.
    pub icon: String,
    pub observed_at: Option<DateTime<Utc>>,
}

impl WeatherReport {
    pub fn rounded_temperature(&self) -> i64 {
        round_half_up(self.temperature_c)
    }

    pub fn rounded_feels_like(&self) -> i64 {
        round_half_up(self.feels_like_c)
    }

    pub fn icon_url(&self) -> String {
        format!("{ICON_BASE_URL}/{}@2x.png", self.icon)
    }
}

/// Halves round toward positive infinity: 2.5 -> 3, -2.5 -> -2.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Lifecycle of the most recent lookup. Exactly one variant holds at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Loading,
    Error(String),
    Loaded(WeatherReport),
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Error(_) | RequestState::Loaded(_))
    }

    pub fn report(&self) -> Option<&WeatherReport> {
        match self {
            RequestState::Loaded(report) => Some(report),
            _ => None,
        }
    }
}

impl From<Result<WeatherReport, LookupError>> for RequestState {
    fn from(result: Result<WeatherReport, LookupError>) -> Self {
        match result {
            Ok(report) => RequestState::Loaded(report),
            Err(err) => RequestState::Error(err.message().to_string()),
        }
    }
}
