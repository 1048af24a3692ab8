//! Core library for the `weather` lookup client.
//!
//! This crate defines:
//! - Configuration & credential handling
//! - The OpenWeather current-conditions client
//! - Geolocation for the startup lookup
//! - [`WeatherClient`], which owns the observable [`RequestState`]
//!
//! It is used by `weather-lookup`, but can also be driven by other front ends.

pub mod client;
pub mod config;
pub mod error;
pub mod geolocation;
pub mod model;
pub mod provider;

pub use client::{Lookup, Settled, WeatherClient};
pub use config::{ApiKey, Config};
pub use error::LookupError;
pub use geolocation::{DisabledLocator, IpLocator, Locator};
pub use model::{Coordinates, LocationQuery, RequestState, WeatherReport};
pub use provider::{OpenWeatherProvider, WeatherProvider, provider_from_config};
