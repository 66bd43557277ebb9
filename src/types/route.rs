//! Route optimization types
//!
//! A `Stop` is identified by its position in the caller-supplied list; that
//! index is stable across the request and distinct from the computed visiting
//! order.

use serde::{Deserialize, Serialize};

/// Coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// One location to visit on a staff member's daily route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub address_line1: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postcode: String,
    /// Display label, e.g. an appointment reference
    #[serde(default)]
    pub label: Option<String>,
}

impl Stop {
    /// A stop needs at least a street address or a postcode to be geocodable.
    pub fn has_usable_address(&self) -> bool {
        !self.address_line1.trim().is_empty() || !self.postcode.trim().is_empty()
    }
}

/// A stop annotated with its place in the computed visiting sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedStop {
    /// Back-reference to the input stop (position in the request list)
    pub index: usize,
    /// 1-based rank in the computed visiting sequence
    pub order_position: usize,
    pub coordinates: Coordinates,
    pub formatted_address: String,
    pub label: Option<String>,
    /// Travel time to the next stop; `None` for the terminal stop
    pub travel_time_to_next_seconds: Option<u64>,
}

/// Display-only point for map rendering, duplicated from `ordered_stops`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePoint {
    pub lat: f64,
    pub lng: f64,
    pub label: Option<String>,
}

/// Warning about route issues
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteWarning {
    pub stop_index: Option<i32>,
    pub warning_type: String,
    pub message: String,
}

/// Full output of one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    /// Every resolved input stop exactly once, in visiting order
    pub ordered_stops: Vec<OrderedStop>,
    /// The permutation expressed as original input indices
    pub order_indices: Vec<usize>,
    /// `leg_durations_seconds[i]` = travel from `ordered_stops[i]` to `[i+1]`
    pub leg_durations_seconds: Vec<u64>,
    pub total_duration_seconds: u64,
    /// Total travel distance; `None` when the provider reported no distances
    pub total_distance_meters: Option<u64>,
    /// Map-rendering convenience, derivable from `ordered_stops`
    pub points: Vec<RoutePoint>,
    /// Dropped stops and other non-fatal issues
    pub warnings: Vec<RouteWarning>,
}

impl RouteResult {
    /// Result for a request with nothing to sequence.
    pub fn empty() -> Self {
        Self {
            ordered_stops: vec![],
            order_indices: vec![],
            leg_durations_seconds: vec![],
            total_duration_seconds: 0,
            total_distance_meters: None,
            points: vec![],
            warnings: vec![],
        }
    }
}

/// Payload of `fieldroute.route.optimize`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRouteRequest {
    pub stops: Vec<Stop>,
}

/// Payload of `fieldroute.route.staff_day`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffDayRequest {
    pub staff_id: uuid::Uuid,
    pub date: chrono::NaiveDate,
}

/// Response payload of `fieldroute.route.staff_day`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffDayResponse {
    pub stops: Vec<Stop>,
}

/// Payload of `fieldroute.route.cancel`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRouteRequest {
    pub request_id: uuid::Uuid,
}
