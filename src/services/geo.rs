//! Geographic calculations

use crate::types::Coordinates;

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Road distance coefficient (straight line to road)
pub const ROAD_COEFFICIENT: f64 = 1.3;

/// Average speed in km/h for travel time estimation
pub const AVERAGE_SPEED_KMH: f64 = 40.0;

/// Calculate Haversine distance between two points in kilometers
pub fn haversine_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leeds() -> Coordinates {
        Coordinates { lat: 53.8008, lng: -1.5491 }
    }

    fn manchester() -> Coordinates {
        Coordinates { lat: 53.4808, lng: -2.2426 }
    }

    #[test]
    fn test_haversine_leeds_manchester() {
        // Leeds to Manchester is roughly 58 km straight line
        let distance = haversine_distance(&leeds(), &manchester());
        assert!((distance - 58.0).abs() < 5.0, "got {} km", distance);
    }

    #[test]
    fn test_haversine_same_point() {
        let point = Coordinates { lat: 53.8, lng: -1.5 };
        let distance = haversine_distance(&point, &point);
        assert!(distance.abs() < 0.001);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let ab = haversine_distance(&leeds(), &manchester());
        let ba = haversine_distance(&manchester(), &leeds());
        assert!((ab - ba).abs() < 1e-9);
    }
}
