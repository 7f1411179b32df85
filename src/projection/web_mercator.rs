//! Spherical web-Mercator (EPSG:3857) point projection.

use std::f64::consts::PI;

use crate::geometry::Point;

/// Sphere radius used by web Mercator, in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the width of the projected world, in meters.
pub const MAX_EXTENT: f64 = PI * EARTH_RADIUS;

/// Latitude at which the projected world becomes square.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Longitude/latitude in degrees to web-Mercator meters.
///
/// Latitudes beyond [`MAX_LATITUDE`] are clamped so poles stay finite.
pub fn lnglat_to_mercator(p: Point) -> Point {
    let lat = p.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    Point::new(
        EARTH_RADIUS * p.x.to_radians(),
        EARTH_RADIUS * (PI / 4.0 + lat / 2.0).tan().ln(),
    )
}

/// Web-Mercator meters to longitude/latitude in degrees.
pub fn mercator_to_lnglat(p: Point) -> Point {
    Point::new(
        (p.x / EARTH_RADIUS).to_degrees(),
        (2.0 * (p.y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees(),
    )
}
