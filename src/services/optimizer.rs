//! Route optimization orchestration
//!
//! One `optimize` call is fully request-scoped: validate the stop list,
//! geocode with bounded concurrency, build the travel matrix (chunked and
//! retried), hand the duration matrix to the sequencer, and assemble the
//! ordered result. Nothing is persisted between calls.

use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::defaults::{MATRIX_CHUNK_SIZE, MATRIX_RETRY_ATTEMPTS, MATRIX_RETRY_BASE_DELAY_MS};
use crate::services::geocoding::Geocoder;
use crate::services::routing::{build_full_matrix, MatrixProvider, TravelMatrix};
use crate::services::sequencer;
use crate::types::{
    Coordinates, OrderedStop, RoutePoint, RouteResult, RouteWarning, Stop,
};

/// Errors an optimization request can surface to the caller.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("no usable stop in request: every stop is missing both street address and postcode")]
    InvalidInput,

    #[error("no stop could be geocoded")]
    GeocodingFailed,

    #[error("matrix provider failed: {0}")]
    MatrixProvider(#[source] anyhow::Error),

    #[error("no feasible route covers all resolved stops")]
    NoFeasibleRoute,

    #[error("request was cancelled")]
    Cancelled,
}

impl OptimizeError {
    /// Stable wire code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            OptimizeError::InvalidInput => "INVALID_INPUT",
            OptimizeError::GeocodingFailed => "GEOCODING_FAILED",
            OptimizeError::MatrixProvider(_) => "MATRIX_PROVIDER_ERROR",
            OptimizeError::NoFeasibleRoute => "NO_FEASIBLE_ROUTE",
            OptimizeError::Cancelled => "REQUEST_CANCELLED",
        }
    }
}

/// A stop with resolved coordinates, ready for matrix building.
struct ResolvedStop {
    input_index: usize,
    label: Option<String>,
    coordinates: Coordinates,
    formatted_address: String,
}

/// Stateless per-request route optimizer.
pub struct RouteOptimizer {
    geocoder: Arc<dyn Geocoder>,
    matrix_provider: Arc<dyn MatrixProvider>,
    geocode_concurrency: usize,
    matrix_max_locations: usize,
}

impl RouteOptimizer {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        matrix_provider: Arc<dyn MatrixProvider>,
        geocode_concurrency: usize,
        matrix_max_locations: usize,
    ) -> Self {
        Self {
            geocoder,
            matrix_provider,
            geocode_concurrency: geocode_concurrency.max(1),
            matrix_max_locations,
        }
    }

    /// Optimize the visiting order of `stops`.
    ///
    /// The first resolvable stop is the anchor: it stays first in the output
    /// and the sequencer orders everything after it. Stops that cannot be
    /// geocoded are dropped and reported in `warnings`.
    pub async fn optimize(
        &self,
        stops: &[Stop],
        cancel: &CancellationToken,
    ) -> Result<RouteResult, OptimizeError> {
        if stops.is_empty() {
            return Ok(RouteResult::empty());
        }
        if !stops.iter().any(Stop::has_usable_address) {
            return Err(OptimizeError::InvalidInput);
        }

        let mut warnings: Vec<RouteWarning> = stops
            .iter()
            .enumerate()
            .filter(|(_, stop)| !stop.has_usable_address())
            .map(|(index, _)| RouteWarning {
                stop_index: Some(index as i32),
                warning_type: "EMPTY_ADDRESS".to_string(),
                message: "stop has neither street address nor postcode".to_string(),
            })
            .collect();

        let resolved = self.geocode_stops(stops, &mut warnings, cancel).await?;
        if resolved.is_empty() {
            return Err(OptimizeError::GeocodingFailed);
        }
        warnings.sort_by_key(|w| w.stop_index);

        if resolved.len() > self.matrix_max_locations {
            return Err(OptimizeError::MatrixProvider(anyhow::anyhow!(
                "{} stops exceeds the matrix limit of {}",
                resolved.len(),
                self.matrix_max_locations
            )));
        }

        let points: Vec<Coordinates> = resolved.iter().map(|r| r.coordinates).collect();
        let matrix = self.fetch_matrix_with_retry(&points, cancel).await?;

        if cancel.is_cancelled() {
            return Err(OptimizeError::Cancelled);
        }

        // Index 0 of the resolved list (the first resolvable input stop) is
        // the staff member's starting location by convention
        let order = sequencer::sequence(&matrix.durations, 0)
            .map_err(|_| OptimizeError::NoFeasibleRoute)?;

        assemble_result(&resolved, &matrix, &order, warnings)
    }

    /// Geocode every usable stop with bounded concurrency, preserving input
    /// order. Per-stop failures become warnings, not errors.
    async fn geocode_stops(
        &self,
        stops: &[Stop],
        warnings: &mut Vec<RouteWarning>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResolvedStop>, OptimizeError> {
        let lookups: Vec<_> = stops
            .iter()
            .enumerate()
            .filter(|(_, stop)| stop.has_usable_address())
            .map(|(index, stop)| {
                let geocoder = Arc::clone(&self.geocoder);
                async move {
                    let outcome = geocoder
                        .geocode(&stop.address_line1, &stop.city, &stop.postcode)
                        .await;
                    (index, outcome)
                }
            })
            .collect();

        let mut resolved = Vec::with_capacity(lookups.len());
        let mut lookup_stream = stream::iter(lookups).buffered(self.geocode_concurrency);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(OptimizeError::Cancelled),
                next = lookup_stream.next() => {
                    let Some((index, outcome)) = next else { break };
                    match outcome {
                        Ok(Some(geocoded)) => {
                            resolved.push(ResolvedStop {
                                input_index: index,
                                label: stops[index].label.clone(),
                                coordinates: geocoded.coordinates,
                                formatted_address: geocoded.formatted_address,
                            });
                        }
                        Ok(None) => {
                            warnings.push(RouteWarning {
                                stop_index: Some(index as i32),
                                warning_type: "STOP_UNRESOLVABLE".to_string(),
                                message: "address could not be located".to_string(),
                            });
                        }
                        Err(e) => {
                            warn!("Geocoding stop {} failed: {}", index, e);
                            warnings.push(RouteWarning {
                                stop_index: Some(index as i32),
                                warning_type: "STOP_UNRESOLVABLE".to_string(),
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        Ok(resolved)
    }

    /// Build the full travel matrix, retrying transient provider failures
    /// with exponential backoff.
    async fn fetch_matrix_with_retry(
        &self,
        points: &[Coordinates],
        cancel: &CancellationToken,
    ) -> Result<TravelMatrix, OptimizeError> {
        let mut attempt: u32 = 0;
        loop {
            let fetch = build_full_matrix(self.matrix_provider.as_ref(), points, MATRIX_CHUNK_SIZE);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(OptimizeError::Cancelled),
                outcome = fetch => outcome,
            };

            match outcome {
                Ok(matrix) => return Ok(matrix),
                Err(e) if attempt < MATRIX_RETRY_ATTEMPTS => {
                    let delay = Duration::from_millis(MATRIX_RETRY_BASE_DELAY_MS << attempt);
                    warn!(
                        "Matrix provider attempt {} failed: {}. Retrying in {:?}",
                        attempt + 1, e, delay
                    );
                    attempt += 1;
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(OptimizeError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(OptimizeError::MatrixProvider(e)),
            }
        }
    }
}

/// Map the sequencer's permutation back onto the resolved stops and read the
/// chosen legs out of the matrix.
fn assemble_result(
    resolved: &[ResolvedStop],
    matrix: &TravelMatrix,
    order: &[usize],
    warnings: Vec<RouteWarning>,
) -> Result<RouteResult, OptimizeError> {
    debug!("Assembling route over {} stops", order.len());

    let mut ordered_stops = Vec::with_capacity(order.len());
    let mut order_indices = Vec::with_capacity(order.len());
    let mut points = Vec::with_capacity(order.len());
    let mut leg_durations = Vec::with_capacity(order.len().saturating_sub(1));
    let mut total_distance = if order.len() > 1 { Some(0u64) } else { None };

    for (position, &stop_pos) in order.iter().enumerate() {
        let stop = &resolved[stop_pos];

        let travel_next = match order.get(position + 1) {
            Some(&next) => Some(
                matrix
                    .duration(stop_pos, next)
                    .ok_or(OptimizeError::NoFeasibleRoute)?,
            ),
            None => None,
        };
        if let Some(duration) = travel_next {
            leg_durations.push(duration);
        }
        if let Some(&next) = order.get(position + 1) {
            total_distance = match (total_distance, matrix.distance(stop_pos, next)) {
                (Some(total), Some(leg)) => Some(total + leg),
                _ => None,
            };
        }

        ordered_stops.push(OrderedStop {
            index: stop.input_index,
            order_position: position + 1,
            coordinates: stop.coordinates,
            formatted_address: stop.formatted_address.clone(),
            label: stop.label.clone(),
            travel_time_to_next_seconds: travel_next,
        });
        order_indices.push(stop.input_index);
        points.push(RoutePoint {
            lat: stop.coordinates.lat,
            lng: stop.coordinates.lng,
            label: stop.label.clone(),
        });
    }

    let total_duration_seconds = leg_durations.iter().sum();

    Ok(RouteResult {
        ordered_stops,
        order_indices,
        leg_durations_seconds: leg_durations,
        total_duration_seconds,
        total_distance_meters: total_distance,
        points,
        warnings,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
