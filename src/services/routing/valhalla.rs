//! Valhalla routing engine client
//!
//! Valhalla API documentation:
//! https://valhalla.github.io/valhalla/api/matrix/api-reference/

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MatrixBlock, MatrixProvider};
use crate::types::Coordinates;

/// Valhalla client configuration
#[derive(Debug, Clone)]
pub struct ValhallaConfig {
    /// Base URL of Valhalla server (e.g., "http://localhost:8002")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ValhallaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ValhallaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// Valhalla matrix client
pub struct ValhallaClient {
    client: Client,
    config: ValhallaConfig,
}

impl ValhallaClient {
    pub fn new(config: ValhallaConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Build the sources_to_targets request
    fn build_matrix_request(
        &self,
        sources: &[Coordinates],
        targets: &[Coordinates],
    ) -> MatrixRequest {
        MatrixRequest {
            sources: sources.iter().map(valhalla_location).collect(),
            targets: targets.iter().map(valhalla_location).collect(),
            costing: "auto".to_string(),
            units: "kilometers".to_string(),
        }
    }
}

fn valhalla_location(c: &Coordinates) -> ValhallaLocation {
    ValhallaLocation {
        lat: c.lat,
        lon: c.lng,
        // 500m snap radius: geocoded coordinates are often a building
        // centroid rather than a point on the road network
        radius: Some(500),
    }
}

#[async_trait]
impl MatrixProvider for ValhallaClient {
    async fn travel_between(
        &self,
        sources: &[Coordinates],
        targets: &[Coordinates],
    ) -> Result<MatrixBlock> {
        if sources.is_empty() || targets.is_empty() {
            return Ok(MatrixBlock { durations: vec![], distances: vec![] });
        }

        let request = self.build_matrix_request(sources, targets);
        let url = format!("{}/sources_to_targets", self.config.base_url);

        debug!(
            "Requesting travel matrix from Valhalla: {} sources × {} targets",
            sources.len(),
            targets.len()
        );

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Valhalla")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Valhalla returned error {}: {}", status, body);
        }

        let matrix_response: MatrixResponse = response
            .json()
            .await
            .context("Failed to parse Valhalla response")?;

        if matrix_response.sources_to_targets.len() != sources.len() {
            anyhow::bail!(
                "Valhalla returned {} rows for {} sources",
                matrix_response.sources_to_targets.len(),
                sources.len()
            );
        }

        let mut durations = Vec::with_capacity(sources.len());
        let mut distances = Vec::with_capacity(sources.len());

        for row in &matrix_response.sources_to_targets {
            if row.len() != targets.len() {
                anyhow::bail!(
                    "Valhalla returned {} columns for {} targets",
                    row.len(),
                    targets.len()
                );
            }
            // Missing cells stay None: the pair is unroutable and the
            // sequencer must route around it
            durations.push(row.iter().map(|cell| cell.time.map(|t| t as u64)).collect());
            distances.push(
                row.iter()
                    .map(|cell| cell.distance.map(|d| (d * 1000.0) as u64))
                    .collect(),
            );
        }

        Ok(MatrixBlock { durations, distances })
    }

    fn name(&self) -> &str {
        "Valhalla"
    }
}

// Valhalla API types

#[derive(Debug, Serialize)]
struct MatrixRequest {
    sources: Vec<ValhallaLocation>,
    targets: Vec<ValhallaLocation>,
    costing: String,
    units: String,
}

#[derive(Debug, Serialize, Clone)]
struct ValhallaLocation {
    lat: f64,
    lon: f64,
    /// Radius in meters for snapping to roads
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    sources_to_targets: Vec<Vec<MatrixCell>>,
}

#[derive(Debug, Deserialize)]
struct MatrixCell {
    /// Distance in kilometers (when units="kilometers")
    distance: Option<f64>,
    /// Time in seconds
    time: Option<f64>,
}
