//! what3words v3 HTTP client
//!
//! - `GET /v3/convert-to-coordinates?words=...&key=...`
//! - `GET /v3/convert-to-3wa?coordinates=lat,lng&key=...`
//!
//! Reference: <https://developer.what3words.com/public-api/docs>

use super::{Coordinates, GeocodingError, Geocoder, ThreeWordAddress};
use crate::config::GeocodingConfig;
use crate::metrics::MetricsSink;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct CoordinatesResponse {
    coordinates: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct WordsResponse {
    words: String,
}

pub struct W3wClient {
    config: GeocodingConfig,
    http: Client,
    metrics: Arc<dyn MetricsSink>,
}

impl W3wClient {
    pub fn new(config: GeocodingConfig, metrics: Arc<dyn MetricsSink>) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            config,
            http,
            metrics,
        })
    }

    /// Issue one GET against the API; the call is counted before it is sent
    async fn get<T>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T, GeocodingError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/v3/{}", self.config.base_url.trim_end_matches('/'), endpoint);

        self.metrics.increment();
        let resp = self
            .http
            .get(&url)
            .query(query)
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!(endpoint, %status, "what3words request rejected");
            return Err(GeocodingError::Status { status, body });
        }

        serde_json::from_str(&body).map_err(|e| GeocodingError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl Geocoder for W3wClient {
    async fn resolve_address_to_coordinates(
        &self,
        address: &ThreeWordAddress,
    ) -> Result<Coordinates, GeocodingError> {
        debug!(address = %address, "Resolving three-word address");
        let resp: CoordinatesResponse = self
            .get("convert-to-coordinates", &[("words", address.as_str())])
            .await?;
        Ok(Coordinates::new(resp.coordinates.lat, resp.coordinates.lng))
    }

    async fn resolve_coordinates_to_address(
        &self,
        coordinates: Coordinates,
    ) -> Result<ThreeWordAddress, GeocodingError> {
        debug!(%coordinates, "Resolving coordinates");
        let latlng = coordinates.to_string();
        let resp: WordsResponse = self
            .get("convert-to-3wa", &[("coordinates", latlng.as_str())])
            .await?;
        resp.words
            .parse()
            .map_err(|_| GeocodingError::Malformed(format!("unexpected words {:?}", resp.words)))
    }
}
