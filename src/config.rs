//! Configuration management

use anyhow::{Context, Result};

use crate::defaults::{DEFAULT_GEOCODE_CONCURRENCY, DEFAULT_MATRIX_MAX_LOCATIONS};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// PostgreSQL connection string (appointment store)
    pub database_url: String,

    /// Nominatim API URL (for geocoding)
    pub nominatim_url: String,

    /// Valhalla routing engine URL (optional, falls back to mock if unavailable)
    pub valhalla_url: Option<String>,

    /// Maximum geocoding requests in flight per optimization request
    pub geocode_concurrency: usize,

    /// Hard cap on matrix size; larger requests are rejected with a clear error
    pub matrix_max_locations: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let nominatim_url = std::env::var("NOMINATIM_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string());

        let valhalla_url = std::env::var("VALHALLA_URL").ok();

        let geocode_concurrency = std::env::var("GEOCODE_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_GEOCODE_CONCURRENCY);
        if geocode_concurrency == 0 {
            anyhow::bail!("GEOCODE_CONCURRENCY must be at least 1");
        }

        let matrix_max_locations = std::env::var("MATRIX_MAX_LOCATIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MATRIX_MAX_LOCATIONS);

        Ok(Self {
            nats_url,
            database_url,
            nominatim_url,
            valhalla_url,
            geocode_concurrency,
            matrix_max_locations,
        })
    }
}
