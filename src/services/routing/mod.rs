//! Travel matrix providers
//!
//! Uses Valhalla for production, mock (haversine estimate) for tests and
//! development. Matrices are asymmetric: duration(i, j) need not equal
//! duration(j, i), and callers must not assume it does.

mod valhalla;

pub use valhalla::{ValhallaClient, ValhallaConfig};

use anyhow::Result;
use async_trait::async_trait;

use crate::services::geo;
use crate::types::Coordinates;

/// Pairwise travel durations and distances between locations.
///
/// `None` cells mark pairs the provider could not route between; route
/// construction treats them as untraversable edges.
#[derive(Debug, Clone)]
pub struct TravelMatrix {
    /// Duration in seconds [i][j] from location i to location j
    pub durations: Vec<Vec<Option<u64>>>,
    /// Distance in meters [i][j] from location i to location j
    pub distances: Vec<Vec<Option<u64>>>,
    /// Number of locations
    pub size: usize,
}

impl TravelMatrix {
    /// Create empty matrices
    pub fn empty() -> Self {
        Self {
            durations: vec![],
            distances: vec![],
            size: 0,
        }
    }

    /// Create an n×n matrix with every cell unroutable.
    pub fn unfilled(size: usize) -> Self {
        Self {
            durations: vec![vec![None; size]; size],
            distances: vec![vec![None; size]; size],
            size,
        }
    }

    /// Get duration from location i to location j in seconds
    pub fn duration(&self, from: usize, to: usize) -> Option<u64> {
        self.durations[from][to]
    }

    /// Get distance from location i to location j in meters
    pub fn distance(&self, from: usize, to: usize) -> Option<u64> {
        self.distances[from][to]
    }
}

/// Matrix provider trait for abstraction (Valhalla, mock, etc.)
///
/// Providers answer rectangular sources×targets queries; that is what lets
/// large requests be split into sub-matrix calls and merged back together.
#[async_trait]
pub trait MatrixProvider: Send + Sync {
    /// Travel durations/distances from every source to every target.
    /// Row i of the result corresponds to sources[i].
    async fn travel_between(
        &self,
        sources: &[Coordinates],
        targets: &[Coordinates],
    ) -> Result<MatrixBlock>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// One rectangular block of a travel matrix, rows = sources, cols = targets.
#[derive(Debug, Clone)]
pub struct MatrixBlock {
    pub durations: Vec<Vec<Option<u64>>>,
    pub distances: Vec<Vec<Option<u64>>>,
}

/// Build the full n×n matrix over `points`, splitting into sub-matrix calls
/// when n exceeds `chunk` (providers cap matrix dimensions per request).
pub async fn build_full_matrix(
    provider: &dyn MatrixProvider,
    points: &[Coordinates],
    chunk: usize,
) -> Result<TravelMatrix> {
    let n = points.len();
    if n == 0 {
        return Ok(TravelMatrix::empty());
    }

    let chunk = chunk.max(1);
    let mut matrix = TravelMatrix::unfilled(n);

    for (source_block, sources) in points.chunks(chunk).enumerate() {
        for (target_block, targets) in points.chunks(chunk).enumerate() {
            let block = provider.travel_between(sources, targets).await?;

            let row_offset = source_block * chunk;
            let col_offset = target_block * chunk;
            for (i, (durations, distances)) in
                block.durations.iter().zip(&block.distances).enumerate()
            {
                for (j, (duration, distance)) in durations.iter().zip(distances).enumerate() {
                    matrix.durations[row_offset + i][col_offset + j] = *duration;
                    matrix.distances[row_offset + i][col_offset + j] = *distance;
                }
            }
        }
    }

    Ok(matrix)
}

/// Mock matrix provider for tests and development.
/// Uses Haversine distance × road coefficient for estimation.
pub struct MockMatrixProvider {
    road_coefficient: f64,
    average_speed_kmh: f64,
}

impl Default for MockMatrixProvider {
    fn default() -> Self {
        Self {
            road_coefficient: geo::ROAD_COEFFICIENT,
            average_speed_kmh: geo::AVERAGE_SPEED_KMH,
        }
    }
}

impl MockMatrixProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(road_coefficient: f64, average_speed_kmh: f64) -> Self {
        Self {
            road_coefficient,
            average_speed_kmh,
        }
    }
}

#[async_trait]
impl MatrixProvider for MockMatrixProvider {
    async fn travel_between(
        &self,
        sources: &[Coordinates],
        targets: &[Coordinates],
    ) -> Result<MatrixBlock> {
        let mut durations = Vec::with_capacity(sources.len());
        let mut distances = Vec::with_capacity(sources.len());

        for source in sources {
            let mut duration_row = Vec::with_capacity(targets.len());
            let mut distance_row = Vec::with_capacity(targets.len());
            for target in targets {
                let straight_km = geo::haversine_distance(source, target);
                let road_km = straight_km * self.road_coefficient;
                duration_row.push(Some((road_km / self.average_speed_kmh * 3600.0) as u64));
                distance_row.push(Some((road_km * 1000.0) as u64));
            }
            durations.push(duration_row);
            distances.push(distance_row);
        }

        Ok(MatrixBlock { durations, distances })
    }

    fn name(&self) -> &str {
        "MockMatrix"
    }
}

/// Create matrix provider with automatic Valhalla detection and fallback.
///
/// Tries to connect to Valhalla if a URL is provided. Falls back to the mock
/// provider if Valhalla is unavailable or the URL is not configured.
pub async fn create_matrix_provider_with_fallback(
    valhalla_url: Option<String>,
) -> Box<dyn MatrixProvider> {
    use tracing::{info, warn};

    if let Some(url) = valhalla_url {
        let config = ValhallaConfig::new(&url);
        let client = ValhallaClient::new(config);

        match check_valhalla_health(&url).await {
            Ok(()) => {
                info!("Valhalla matrix provider available at {}", url);
                return Box::new(client);
            }
            Err(e) => {
                warn!("Valhalla not available at {}: {}. Falling back to mock matrices.", url, e);
            }
        }
    }

    info!("Using mock matrix provider (Valhalla not configured or unavailable)");
    Box::new(MockMatrixProvider::new())
}

/// Check if Valhalla is healthy by making a simple status request
async fn check_valhalla_health(base_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()?;

    let url = format!("{}/status", base_url);
    let response = client.get(&url).send().await?;

    if response.status().is_success() {
        Ok(())
    } else {
        anyhow::bail!("Valhalla returned status {}", response.status())
    }
}
