//! Nominatim geocoding client
//!
//! Uses the structured search endpoint so street/city/postcode are matched
//! field-by-field instead of as one free-text query.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::Coordinates;

/// Nominatim API response row
#[derive(Debug, Deserialize)]
pub struct NominatimResult {
    pub lat: String,
    pub lon: String,
    pub display_name: String,
}

/// A resolved search hit
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub coordinates: Coordinates,
    pub display_name: String,
}

/// Nominatim geocoding client
pub struct NominatimClient {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimClient {
    /// Create a new client
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("FieldRoute/0.3 (https://fieldroute.app)")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Structured address search; returns the best hit, if any.
    pub async fn search(&self, street: &str, city: &str, postcode: &str) -> Result<Option<SearchHit>> {
        let url = format!(
            "{}/search?street={}&city={}&postalcode={}&format=jsonv2&limit=1",
            self.base_url,
            urlencoding::encode(street),
            urlencoding::encode(city),
            urlencoding::encode(postcode),
        );

        let response = self.client
            .get(&url)
            .send()
            .await
            .context("Failed to send geocoding request")?;

        if !response.status().is_success() {
            anyhow::bail!("Nominatim returned status {}", response.status());
        }

        let results: Vec<NominatimResult> = response
            .json()
            .await
            .context("Failed to parse geocoding response")?;

        let Some(result) = results.into_iter().next() else {
            return Ok(None);
        };

        let lat: f64 = result.lat.parse().context("Invalid latitude")?;
        let lng: f64 = result.lon.parse().context("Invalid longitude")?;

        Ok(Some(SearchHit {
            coordinates: Coordinates { lat, lng },
            display_name: result.display_name,
        }))
    }
}
