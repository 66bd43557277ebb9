//! Business logic services

pub mod cancellation;
pub mod geo;
pub mod geocoding;
pub mod nominatim;
pub mod optimizer;
pub mod routing;
pub mod sequencer;
pub mod staff_day;
