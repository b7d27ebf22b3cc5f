//! Geographic primitives: coordinates, named locations, haversine distance.

use crate::errors::CoreError;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers, used by the haversine distance.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Validated constructor: both components must be finite and inside
    /// `lat ∈ [-90, 90]`, `lng ∈ [-180, 180]`.
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoreError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(CoreError::invalid_argument(
                "coordinates must be finite numbers",
            ));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoreError::invalid_argument(format!(
                "latitude {} outside [-90, 90]",
                lat
            )));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(CoreError::invalid_argument(format!(
                "longitude {} outside [-180, 180]",
                lng
            )));
        }
        Ok(Self { lat, lng })
    }
}

/// A place as the passenger describes it: free text plus optional coordinates.
///
/// A location without coordinates is still dispatchable, but geospatial
/// filtering is skipped for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub text: String,
    pub coords: Option<Coordinates>,
}

impl Location {
    pub fn new(text: impl Into<String>, coords: Option<Coordinates>) -> Self {
        Self {
            text: text.into(),
            coords,
        }
    }
}

/// Great-circle distance between two coordinates in kilometers.
pub fn distance_km(a: Coordinates, b: Coordinates) -> Result<f64, CoreError> {
    distance_km_with_radius(a, b, EARTH_RADIUS_KM)
}

/// Haversine distance with an explicit sphere radius.
///
/// The radius is configurable through `DispatchConfig::earth_radius_km`;
/// everything else about the formula is fixed.
pub fn distance_km_with_radius(
    a: Coordinates,
    b: Coordinates,
    radius_km: f64,
) -> Result<f64, CoreError> {
    // Re-validate: Coordinates can be built from deserialized input.
    let a = Coordinates::new(a.lat, a.lng)?;
    let b = Coordinates::new(b.lat, b.lng)?;

    let (lat1, lon1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    Ok(radius_km * c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).unwrap()
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let p = coords(41.01, 28.98);
        let d = distance_km(p, p).unwrap();
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = coords(41.01, 28.98);
        let b = coords(41.02, 28.99);
        let ab = distance_km(a, b).unwrap();
        let ba = distance_km(b, a).unwrap();
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_distance_short_hop() {
        // 0.01° of latitude and longitude around Istanbul is roughly 1.4 km.
        let a = coords(41.01, 28.98);
        let b = coords(41.02, 28.99);
        let d = distance_km(a, b).unwrap();
        assert!(d > 1.0 && d < 2.0, "got {}", d);
    }

    #[test]
    fn test_distance_is_finite_and_non_negative() {
        let a = coords(-89.9, -179.9);
        let b = coords(89.9, 179.9);
        let d = distance_km(a, b).unwrap();
        assert!(d.is_finite());
        assert!(d >= 0.0);
    }

    #[test]
    fn test_out_of_range_latitude_rejected() {
        assert!(Coordinates::new(90.5, 0.0).is_err());
        assert!(Coordinates::new(-91.0, 0.0).is_err());
    }

    #[test]
    fn test_out_of_range_longitude_rejected() {
        assert!(Coordinates::new(0.0, 180.5).is_err());
        assert!(Coordinates::new(0.0, -200.0).is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert!(Coordinates::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_distance_revalidates_inputs() {
        let bad = Coordinates {
            lat: 200.0,
            lng: 0.0,
        };
        let ok = coords(0.0, 0.0);
        assert!(distance_km(bad, ok).is_err());
    }
}
