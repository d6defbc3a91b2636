//! Geographic primitives: tile coordinates, lat/lng bounds, and the
//! projector seam between pixel space and geographic space.

use std::f64::consts::PI;

use crate::TILE_SIZE;

/// Latitude limit of the web-mercator projection; tiles never extend
/// beyond this.
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Identifies one map tile at a zoom level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    /// Largest valid x or y index at a zoom level.
    pub fn max_index(z: u8) -> u32 {
        (1u32 << z) - 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A position in world-pixel space at some zoom level, where the world
/// is `TILE_SIZE * 2^z` pixels square and y grows southward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned geographic bounds in degrees.
///
/// Containment is half-open: the south and west edges belong to the
/// bounds, the north and east edges do not. A point on a shared edge of
/// two adjacent cells therefore belongs to exactly one of them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        self.contains_with_edges(lat, lng, false, false)
    }

    /// Containment with the north/east edges optionally closed, for
    /// cells on the outermost edge of the map where no adjacent tile
    /// exists to claim the boundary.
    pub fn contains_with_edges(
        &self,
        lat: f64,
        lng: f64,
        closed_north: bool,
        closed_east: bool,
    ) -> bool {
        let lat_in = lat >= self.south && (lat < self.north || (closed_north && lat == self.north));
        let lng_in = lng >= self.west && (lng < self.east || (closed_east && lng == self.east));
        lat_in && lng_in
    }
}

/// Pixel-to-geographic unprojection, supplied by the hosting map view.
/// The engine only consumes it; `WebMercator` is the standard
/// implementation.
pub trait Projector: Send + Sync {
    fn unproject(&self, point: Point, zoom: u8) -> LatLng;
}

/// Spherical web-mercator projection on a `TILE_SIZE * 2^z` pixel
/// world.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebMercator;

fn world_size(zoom: u8) -> f64 {
    TILE_SIZE as f64 * 2f64.powi(zoom as i32)
}

impl WebMercator {
    /// Geographic to world-pixel. Latitude is clamped to the mercator
    /// limit so poles project onto the map edge instead of infinity.
    pub fn project(&self, pos: LatLng, zoom: u8) -> Point {
        let world = world_size(zoom);
        let lat = pos.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = (pos.lng + 180.0) / 360.0 * world;
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * world;
        Point::new(x, y)
    }
}

impl Projector for WebMercator {
    fn unproject(&self, point: Point, zoom: u8) -> LatLng {
        let world = world_size(zoom);
        let lng = point.x / world * 360.0 - 180.0;
        let n = PI * (1.0 - 2.0 * point.y / world);
        let lat = n.sinh().atan().to_degrees();
        LatLng::new(lat, lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn unproject_world_corners_at_zoom_zero() {
        let proj = WebMercator;
        let nw = proj.unproject(Point::new(0.0, 0.0), 0);
        assert!((nw.lat - MAX_LATITUDE).abs() < 1e-4);
        assert!((nw.lng + 180.0).abs() < EPS);

        let se = proj.unproject(Point::new(256.0, 256.0), 0);
        assert!((se.lat + MAX_LATITUDE).abs() < 1e-4);
        assert!((se.lng - 180.0).abs() < EPS);

        let center = proj.unproject(Point::new(128.0, 128.0), 0);
        assert!(center.lat.abs() < EPS);
        assert!(center.lng.abs() < EPS);
    }

    #[test]
    fn project_unproject_round_trip() {
        let proj = WebMercator;
        for &(lat, lng) in &[(35.6586, 139.7454), (-33.8568, 151.2153), (0.0, 0.0)] {
            for zoom in [0u8, 5, 13, 18] {
                let point = proj.project(LatLng::new(lat, lng), zoom);
                let back = proj.unproject(point, zoom);
                assert!((back.lat - lat).abs() < 1e-9, "lat at z{zoom}");
                assert!((back.lng - lng).abs() < 1e-9, "lng at z{zoom}");
            }
        }
    }

    #[test]
    fn bounds_are_half_open() {
        let bounds = GeoBounds {
            south: 10.0,
            west: 20.0,
            north: 11.0,
            east: 21.0,
        };
        assert!(bounds.contains(10.0, 20.0));
        assert!(!bounds.contains(11.0, 20.5));
        assert!(!bounds.contains(10.5, 21.0));
        assert!(bounds.contains_with_edges(11.0, 20.5, true, false));
        assert!(bounds.contains_with_edges(10.5, 21.0, false, true));
    }

    #[test]
    fn max_index_matches_zoom() {
        assert_eq!(TileCoord::max_index(0), 0);
        assert_eq!(TileCoord::max_index(1), 1);
        assert_eq!(TileCoord::max_index(13), 8191);
    }
}
