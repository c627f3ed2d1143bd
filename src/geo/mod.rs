//! Great-circle math and coordinate validation

use crate::error::{ConvoyError, Result};

/// Mean earth radius used for every distance in the crate
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers between two lat/lng points (degrees)
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = ((d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2))
    .clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

pub fn validate_coordinates(lat: f64, lng: f64) -> Result<()> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(ConvoyError::invalid(format!(
            "latitude {lat} outside [-90, 90]"
        )));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(ConvoyError::invalid(format!(
            "longitude {lng} outside [-180, 180]"
        )));
    }
    Ok(())
}

pub fn validate_speed(speed_kmh: f64) -> Result<()> {
    if !speed_kmh.is_finite() || speed_kmh < 0.0 {
        return Err(ConvoyError::invalid(format!(
            "speed {speed_kmh} km/h must be a non-negative number"
        )));
    }
    Ok(())
}

/// Positive, finite radius (geofence or query distance)
pub fn validate_radius(radius_km: f64) -> Result<()> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(ConvoyError::invalid(format!(
            "radius {radius_km} km must be greater than zero"
        )));
    }
    Ok(())
}
