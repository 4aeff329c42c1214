//! Census Bureau geocoder client.
//!
//! Two endpoints are used: `locations/onelineaddress` turns an address into a
//! longitude/latitude, `geographies/coordinates` names the place and county
//! subdivision that contain a coordinate.

use crate::config::toml_config::GeocoderConfig;
use crate::domain::model::GeographyNames;
use crate::domain::ports::Geocoder;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const COUNTY_SUBDIVISIONS: &str = "County Subdivisions";
const PLACES: &str = "Places";

#[derive(Debug, Deserialize)]
struct LocationResponse {
    result: LocationResult,
}

#[derive(Debug, Deserialize)]
struct LocationResult {
    #[serde(rename = "addressMatches", default)]
    address_matches: Vec<AddressMatch>,
}

#[derive(Debug, Deserialize)]
struct AddressMatch {
    coordinates: Coordinates,
}

#[derive(Debug, Deserialize)]
struct Coordinates {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct GeographyResponse {
    result: GeographyResult,
}

#[derive(Debug, Deserialize)]
struct GeographyResult {
    #[serde(default)]
    geographies: HashMap<String, Vec<GeographyEntry>>,
}

#[derive(Debug, Deserialize)]
struct GeographyEntry {
    #[serde(rename = "NAME")]
    name: Option<String>,
}

impl GeographyResult {
    fn first_name(&self, layer: &str) -> Option<String> {
        self.geographies
            .get(layer)
            .and_then(|entries| entries.first())
            .and_then(|entry| entry.name.clone())
            .filter(|name| !name.trim().is_empty())
    }
}

pub struct CensusGeocoder {
    client: Client,
    config: GeocoderConfig,
}

impl CensusGeocoder {
    pub fn new(config: GeocoderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Geocoder for CensusGeocoder {
    async fn coordinates(&self, address: &str) -> Result<Option<(f64, f64)>> {
        let url = self.endpoint("locations/onelineaddress");
        tracing::debug!("Geocoding '{}' via {}", address, url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("address", address),
                ("benchmark", self.config.benchmark.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: LocationResponse = response.json().await?;
        Ok(body
            .result
            .address_matches
            .first()
            .map(|m| (m.coordinates.x, m.coordinates.y)))
    }

    async fn geographies(&self, lon: f64, lat: f64) -> Result<GeographyNames> {
        let url = self.endpoint("geographies/coordinates");
        tracing::debug!("Looking up geographies for ({}, {})", lon, lat);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("x", lon.to_string()),
                ("y", lat.to_string()),
                ("benchmark", self.config.benchmark.clone()),
                ("vintage", self.config.vintage.clone()),
                ("format", "json".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: GeographyResponse = response.json().await?;
        Ok(GeographyNames {
            county_subdivision: body.result.first_name(COUNTY_SUBDIVISIONS),
            place: body.result.first_name(PLACES),
        })
    }
}
