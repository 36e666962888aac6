//! Utility functions for distance and midpoint estimation between coordinates
//!
//! Points follow the `geo` convention: `x` is the longitude and `y` the latitude,
//! both in degrees.

use geo::Point;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Approximate distance between two points in kilometers
///
/// Uses the pythagorean formula over the radian differences (parallel meridians).
/// This is a flat-Earth approximation, not geodesically accurate. The clustering
/// threshold is defined in terms of it.
///
/// # Arguments
/// * `a` - First point (x = longitude, y = latitude, in degrees)
/// * `b` - Second point
///
/// # Returns
/// The estimated distance in kilometers, always non-negative
#[inline(always)]
pub fn flat_distance_km(a: Point<f64>, b: Point<f64>) -> f64 {
    let d_lat = a.y().to_radians() - b.y().to_radians();
    let d_lon = a.x().to_radians() - b.x().to_radians();
    EARTH_RADIUS_KM * (d_lat * d_lat + d_lon * d_lon).sqrt()
}

/// Midpoint of two points, averaging latitude and longitude independently
///
/// The mean is taken in radian space and converted back to degrees. No spherical
/// interpolation is done.
#[inline(always)]
pub fn midpoint(a: Point<f64>, b: Point<f64>) -> Point<f64> {
    let lat = ((a.y().to_radians() + b.y().to_radians()) / 2.0).to_degrees();
    let lon = ((a.x().to_radians() + b.x().to_radians()) / 2.0).to_degrees();
    Point::new(lon, lat)
}

/// Build a point from latitude and longitude in degrees
#[inline(always)]
pub fn lat_lon(lat: f64, lon: f64) -> Point<f64> {
    Point::new(lon, lat)
}
