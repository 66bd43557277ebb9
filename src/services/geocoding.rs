//! Geocoding abstraction layer with safety features
//!
//! This module provides a safe geocoding architecture that:
//! - Never risks getting blocked by external services
//! - Uses MockGeocoder for tests (deterministic, no network)
//! - Uses RateLimitedGeocoder for production (strict rate limiting)
//!
//! Configuration via GEOCODER_BACKEND env variable:
//! - "mock" → MockGeocoder (tests, development)
//! - "nominatim" → RateLimitedNominatimGeocoder (production)

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Coordinates;

/// Geocoder trait - abstraction for all geocoding implementations
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Geocode an address to coordinates.
    /// Returns None if the address cannot be located.
    async fn geocode(&self, street: &str, city: &str, postcode: &str) -> Result<Option<GeocodedAddress>>;

    /// Get the name of this geocoder implementation
    fn name(&self) -> &'static str;
}

/// Result of a geocoding lookup
#[derive(Debug, Clone)]
pub struct GeocodedAddress {
    pub coordinates: Coordinates,
    /// Display name returned by the geocoder
    pub formatted_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // MockGeocoder Tests
    // ==========================================================================

    #[tokio::test]
    async fn mock_geocoder_returns_coordinates_for_any_address() {
        let geocoder = MockGeocoder::new();

        let result = geocoder.geocode("34 Kirkgate", "Leeds", "LS2 7DJ").await;

        assert!(result.is_ok());
        let result = result.unwrap();
        assert!(result.is_some(), "MockGeocoder should always return coordinates");
    }

    #[tokio::test]
    async fn mock_geocoder_is_deterministic() {
        let geocoder = MockGeocoder::new();

        let first = geocoder.geocode("34 Kirkgate", "Leeds", "LS2 7DJ").await.unwrap().unwrap();
        let second = geocoder.geocode("34 Kirkgate", "Leeds", "LS2 7DJ").await.unwrap().unwrap();

        assert_eq!(first.coordinates.lat, second.coordinates.lat);
        assert_eq!(first.coordinates.lng, second.coordinates.lng);
        assert_eq!(first.formatted_address, second.formatted_address);
    }

    #[tokio::test]
    async fn mock_geocoder_separates_different_addresses() {
        let geocoder = MockGeocoder::new();

        let leeds = geocoder.geocode("34 Kirkgate", "Leeds", "LS2 7DJ").await.unwrap().unwrap();
        let york = geocoder.geocode("9 Stonegate", "York", "YO1 8AW").await.unwrap().unwrap();

        assert_ne!(leeds.coordinates.lat, york.coordinates.lat);
        assert_ne!(leeds.coordinates.lng, york.coordinates.lng);
    }

    #[tokio::test]
    async fn mock_geocoder_stays_within_service_area() {
        let geocoder = MockGeocoder::new();

        let addresses = [
            ("1 High Street", "Leeds", "LS1 1AA"),
            ("2 Market Place", "Manchester", "M1 1AE"),
            ("3 Castle Road", "Sheffield", "S1 2GH"),
            ("4 Church Lane", "York", "YO1 7HH"),
        ];

        for (street, city, postcode) in addresses {
            let result = geocoder.geocode(street, city, postcode).await.unwrap().unwrap();

            assert!(result.coordinates.lat >= MockGeocoder::LAT_MIN
                && result.coordinates.lat <= MockGeocoder::LAT_MAX,
                "Latitude {} out of bounds for {}, {}", result.coordinates.lat, street, city);
            assert!(result.coordinates.lng >= MockGeocoder::LNG_MIN
                && result.coordinates.lng <= MockGeocoder::LNG_MAX,
                "Longitude {} out of bounds for {}, {}", result.coordinates.lng, street, city);
        }
    }

    #[tokio::test]
    async fn mock_geocoder_name_is_mock() {
        let geocoder = MockGeocoder::new();
        assert_eq!(geocoder.name(), "mock");
    }

    // ==========================================================================
    // RateLimiter Tests
    // ==========================================================================

    #[tokio::test]
    async fn rate_limiter_enforces_minimum_interval() {
        let limiter = RateLimiter::new(std::time::Duration::from_millis(100));

        let start = std::time::Instant::now();

        // First call should be immediate
        limiter.wait().await;
        let after_first = start.elapsed();
        assert!(after_first < std::time::Duration::from_millis(50), "First call should be immediate");

        // Second call should wait
        limiter.wait().await;
        let after_second = start.elapsed();
        assert!(after_second >= std::time::Duration::from_millis(100),
            "Second call should wait at least 100ms, took {:?}", after_second);
    }

    #[tokio::test]
    async fn rate_limiter_allows_call_after_interval() {
        let limiter = RateLimiter::new(std::time::Duration::from_millis(50));

        limiter.wait().await;

        // Wait longer than interval
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;

        let start = std::time::Instant::now();
        limiter.wait().await;
        let elapsed = start.elapsed();

        assert!(elapsed < std::time::Duration::from_millis(20),
            "Call after interval should be immediate, took {:?}", elapsed);
    }

    // ==========================================================================
    // CircuitBreaker Tests
    // ==========================================================================

    #[test]
    fn circuit_breaker_starts_closed() {
        let breaker = CircuitBreaker::new(3, std::time::Duration::from_secs(60));
        assert!(!breaker.is_open());
    }

    #[test]
    fn circuit_breaker_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, std::time::Duration::from_secs(60));

        breaker.record_failure();
        assert!(!breaker.is_open(), "Should not open after 1 failure");

        breaker.record_failure();
        assert!(!breaker.is_open(), "Should not open after 2 failures");

        breaker.record_failure();
        assert!(breaker.is_open(), "Should open after 3 failures");
    }

    #[test]
    fn circuit_breaker_resets_on_success() {
        let breaker = CircuitBreaker::new(3, std::time::Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();

        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open(), "Should not be open, count was reset");
    }

    #[tokio::test]
    async fn circuit_breaker_allows_retry_after_recovery_time() {
        let breaker = CircuitBreaker::new(3, std::time::Duration::from_millis(50));

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.is_open());

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;

        // Half-open: a retry is allowed once the recovery window has passed
        assert!(!breaker.is_open());
    }

    // ==========================================================================
    // RateLimitedNominatimGeocoder Tests
    // ==========================================================================

    #[test]
    fn rate_limited_nominatim_geocoder_has_correct_name() {
        let geocoder = RateLimitedNominatimGeocoder::new();
        assert_eq!(geocoder.name(), "nominatim");
    }

    #[test]
    fn rate_limited_nominatim_geocoder_can_be_created_with_custom_config() {
        let geocoder = RateLimitedNominatimGeocoder::with_config(
            "https://nominatim.example.org",
            std::time::Duration::from_millis(2000),
            5,
            std::time::Duration::from_secs(600),
        );
        assert_eq!(geocoder.name(), "nominatim");
    }

    #[tokio::test]
    async fn rate_limited_nominatim_geocoder_rejects_when_circuit_breaker_open() {
        let geocoder = RateLimitedNominatimGeocoder::with_config(
            "https://nominatim.openstreetmap.org",
            std::time::Duration::from_millis(100),
            1, // Open after 1 failure
            std::time::Duration::from_secs(300),
        );

        geocoder.circuit_breaker.record_failure();
        assert!(geocoder.circuit_breaker.is_open());

        let result = geocoder.geocode("34 Kirkgate", "Leeds", "LS2 7DJ").await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("circuit breaker"));
    }
}

// ==========================================================================
// MockGeocoder Implementation
// ==========================================================================

/// Mock geocoder for testing - returns deterministic fake coordinates
pub struct MockGeocoder;

impl MockGeocoder {
    // Service-area bounds used for generated coordinates: northern England,
    // kept away from coastline so mock points land on routable roads.
    pub(crate) const LAT_MIN: f64 = 53.0;
    pub(crate) const LAT_MAX: f64 = 54.5;
    pub(crate) const LNG_MIN: f64 = -2.8;
    pub(crate) const LNG_MAX: f64 = -0.8;

    pub fn new() -> Self {
        Self
    }

    /// Derive stable coordinates from the address text.
    fn hash_to_coordinates(street: &str, city: &str, postcode: &str) -> Coordinates {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        street.hash(&mut hasher);
        city.hash(&mut hasher);
        postcode.hash(&mut hasher);
        let hash = hasher.finish();

        let lat_range = Self::LAT_MAX - Self::LAT_MIN;
        let lng_range = Self::LNG_MAX - Self::LNG_MIN;

        // Use different halves of the hash for lat and lng
        let lat_normalized = ((hash >> 32) as f64) / (u32::MAX as f64);
        let lng_normalized = ((hash & 0xFFFF_FFFF) as f64) / (u32::MAX as f64);

        Coordinates {
            lat: Self::LAT_MIN + lat_normalized * lat_range,
            lng: Self::LNG_MIN + lng_normalized * lng_range,
        }
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, street: &str, city: &str, postcode: &str) -> Result<Option<GeocodedAddress>> {
        let coordinates = Self::hash_to_coordinates(street, city, postcode);

        Ok(Some(GeocodedAddress {
            coordinates,
            formatted_address: format_display_address(street, city, postcode),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Display form used when the geocoder provides no display name of its own.
pub(crate) fn format_display_address(street: &str, city: &str, postcode: &str) -> String {
    [street, postcode, city]
        .iter()
        .filter(|part| !part.trim().is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

// ==========================================================================
// RateLimiter Implementation
// ==========================================================================

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Rate limiter that enforces minimum interval between calls
pub struct RateLimiter {
    last_call: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Mutex::new(None),
            min_interval,
        }
    }

    /// Wait until it's safe to make another call
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}

// ==========================================================================
// CircuitBreaker Implementation
// ==========================================================================

/// Circuit breaker to prevent hammering a failing service
pub struct CircuitBreaker {
    state: parking_lot::Mutex<BreakerState>,
    threshold: u32,
    recovery_time: Duration,
}

#[derive(Default)]
struct BreakerState {
    failure_count: u32,
    last_failure: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, recovery_time: Duration) -> Self {
        Self {
            state: parking_lot::Mutex::new(BreakerState::default()),
            threshold,
            recovery_time,
        }
    }

    /// Check if circuit is open (blocking calls)
    pub fn is_open(&self) -> bool {
        let state = self.state.lock();
        if state.failure_count < self.threshold {
            return false;
        }
        match state.last_failure {
            // Recovery window passed: half-open, allow a retry
            Some(last) if last.elapsed() >= self.recovery_time => false,
            _ => true,
        }
    }

    /// Record a failure
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.failure_count += 1;
        state.last_failure = Some(Instant::now());
    }

    /// Record a success (resets failure count)
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.failure_count = 0;
        state.last_failure = None;
    }
}

// ==========================================================================
// RateLimitedNominatimGeocoder Implementation
// ==========================================================================

use crate::services::nominatim::NominatimClient;

/// Default rate limit interval (1.5 seconds - Nominatim allows 1 req/s)
const DEFAULT_RATE_LIMIT_MS: u64 = 1500;

/// Default circuit breaker threshold (3 failures)
const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: u32 = 3;

/// Default circuit breaker recovery time (5 minutes)
const DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS: u64 = 300;

/// Rate-limited Nominatim geocoder with circuit breaker protection
pub struct RateLimitedNominatimGeocoder {
    client: NominatimClient,
    rate_limiter: RateLimiter,
    /// Circuit breaker - pub(crate) for testing
    pub(crate) circuit_breaker: CircuitBreaker,
}

impl RateLimitedNominatimGeocoder {
    /// Create a new rate-limited Nominatim geocoder with default settings
    pub fn new() -> Self {
        Self::with_config(
            "https://nominatim.openstreetmap.org",
            Duration::from_millis(DEFAULT_RATE_LIMIT_MS),
            DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
            Duration::from_secs(DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS),
        )
    }

    /// Create with custom configuration
    pub fn with_config(
        base_url: &str,
        rate_limit_interval: Duration,
        circuit_breaker_threshold: u32,
        circuit_breaker_recovery: Duration,
    ) -> Self {
        Self {
            client: NominatimClient::new(base_url),
            rate_limiter: RateLimiter::new(rate_limit_interval),
            circuit_breaker: CircuitBreaker::new(circuit_breaker_threshold, circuit_breaker_recovery),
        }
    }

    /// Create from environment variables
    pub fn from_env(nominatim_url: &str) -> Self {
        let rate_limit_ms = std::env::var("NOMINATIM_RATE_LIMIT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT_MS);

        let cb_threshold = std::env::var("NOMINATIM_CB_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CIRCUIT_BREAKER_THRESHOLD);

        let cb_recovery_secs = std::env::var("NOMINATIM_CB_RECOVERY_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS);

        Self::with_config(
            nominatim_url,
            Duration::from_millis(rate_limit_ms),
            cb_threshold,
            Duration::from_secs(cb_recovery_secs),
        )
    }
}

impl Default for RateLimitedNominatimGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for RateLimitedNominatimGeocoder {
    async fn geocode(&self, street: &str, city: &str, postcode: &str) -> Result<Option<GeocodedAddress>> {
        if self.circuit_breaker.is_open() {
            tracing::warn!("Circuit breaker is open, rejecting geocoding request");
            return Err(anyhow::anyhow!("Geocoding service temporarily unavailable (circuit breaker open)"));
        }

        self.rate_limiter.wait().await;

        match self.client.search(street, city, postcode).await {
            Ok(Some(hit)) => {
                self.circuit_breaker.record_success();
                Ok(Some(GeocodedAddress {
                    coordinates: hit.coordinates,
                    formatted_address: hit.display_name,
                }))
            }
            Ok(None) => {
                // No result found is not a provider failure
                self.circuit_breaker.record_success();
                Ok(None)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                tracing::error!("Geocoding failed: {}", e);
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

// ==========================================================================
// Factory function
// ==========================================================================

/// Create geocoder based on GEOCODER_BACKEND environment variable
///
/// # Environment Variables
///
/// - `GEOCODER_BACKEND`: "mock" or "nominatim" (default: "mock")
/// - `NOMINATIM_RATE_LIMIT_MS`: Minimum interval between requests (default: 1500)
/// - `NOMINATIM_CB_THRESHOLD`: Circuit breaker failure threshold (default: 3)
/// - `NOMINATIM_CB_RECOVERY_SECS`: Circuit breaker recovery time (default: 300)
pub fn create_geocoder(nominatim_url: &str) -> Box<dyn Geocoder> {
    let backend = std::env::var("GEOCODER_BACKEND").unwrap_or_else(|_| "mock".to_string());

    match backend.as_str() {
        "mock" => {
            tracing::info!("Using MockGeocoder");
            Box::new(MockGeocoder::new())
        }
        "nominatim" => {
            tracing::info!("Using RateLimitedNominatimGeocoder");
            Box::new(RateLimitedNominatimGeocoder::from_env(nominatim_url))
        }
        _ => {
            tracing::warn!("Unknown GEOCODER_BACKEND '{}', using mock", backend);
            Box::new(MockGeocoder::new())
        }
    }
}
