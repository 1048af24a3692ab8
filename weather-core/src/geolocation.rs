//! Where am I? Coordinates for the startup lookup.
//!
//! A terminal has no platform location service, so the production locator
//! asks an IP geolocation endpoint. Any failure is a
//! [`LookupError::Capability`], which callers treat as "use the default city".

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};

use crate::{error::LookupError, model::Coordinates};

pub const DEFAULT_ENDPOINT: &str = "https://ipapi.co/json/";

#[async_trait]
pub trait Locator: Send + Sync + Debug {
    async fn locate(&self) -> Result<Coordinates, LookupError>;
}

#[derive(Debug, Clone)]
pub struct IpLocator {
    endpoint: String,
    http: Client,
}

impl IpLocator {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for geolocation")?;

        Ok(Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            http,
        })
    }

    pub fn with_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Locator for IpLocator {
    async fn locate(&self) -> Result<Coordinates, LookupError> {
        let res = self
            .http
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|err| LookupError::Capability(format!("Geolocation unavailable: {err}")))?;

        let status = res.status();
        if !status.is_success() {
            return Err(LookupError::Capability(format!(
                "Geolocation service returned {status}"
            )));
        }

        let body = res
            .text()
            .await
            .map_err(|err| LookupError::Capability(format!("Geolocation unavailable: {err}")))?;

        parse_position(&body)
    }
}

/// Always fails; used when the user opts out of geolocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLocator;

#[async_trait]
impl Locator for DisabledLocator {
    async fn locate(&self) -> Result<Coordinates, LookupError> {
        Err(LookupError::Capability("Geolocation disabled".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct IpPosition {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

fn parse_position(body: &str) -> Result<Coordinates, LookupError> {
    let position: IpPosition = serde_json::from_str(body)
        .map_err(|err| LookupError::Capability(format!("Unreadable geolocation answer: {err}")))?;

    match (position.latitude, position.longitude) {
        (Some(latitude), Some(longitude)) => Ok(Coordinates {
            latitude,
            longitude,
        }),
        _ => Err(LookupError::Capability(
            "Geolocation answer carried no coordinates".to_string(),
        )),
    }
}
