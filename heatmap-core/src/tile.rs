/*!
# Map Tile Addressing

Web Mercator tile coordinates (`x`, `y`, `zoom`) with the topology used by the
heatmap pyramid: the world wraps horizontally at the antimeridian, while the
polar rows are hard edges.
*/

use crate::error::{HeatmapError, HeatmapResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

pub type ZoomLevel = u8;

/// Deepest zoom whose tile indices still fit in an `i32`
pub const MAX_ZOOM: ZoomLevel = 30;

/// Latitude limit of the square Web Mercator world
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

const EDGE_EPSILON: f64 = 1e-9;

/// Number of tiles along one axis at the given zoom
pub fn tile_count(zoom: ZoomLevel) -> u64 {
    1u64 << zoom.min(MAX_ZOOM)
}

/// Largest valid tile index along one axis at the given zoom
pub fn max_tile_index(zoom: ZoomLevel) -> u32 {
    (tile_count(zoom) - 1) as u32
}

/// A geographic point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLong {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLong {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Geographic bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub min_longitude: f64,
    pub max_latitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn new(min_latitude: f64, min_longitude: f64, max_latitude: f64, max_longitude: f64) -> Self {
        Self {
            min_latitude,
            min_longitude,
            max_latitude,
            max_longitude,
        }
    }

    /// Grow this box so it also covers `other`
    pub fn extend(&mut self, other: &BoundingBox) {
        self.min_latitude = self.min_latitude.min(other.min_latitude);
        self.min_longitude = self.min_longitude.min(other.min_longitude);
        self.max_latitude = self.max_latitude.max(other.max_latitude);
        self.max_longitude = self.max_longitude.max(other.max_longitude);
    }

    pub fn contains(&self, point: LatLong) -> bool {
        point.latitude >= self.min_latitude
            && point.latitude <= self.max_latitude
            && point.longitude >= self.min_longitude
            && point.longitude <= self.max_longitude
    }

    pub fn center(&self) -> LatLong {
        LatLong::new(
            (self.min_latitude + self.max_latitude) / 2.0,
            (self.min_longitude + self.max_longitude) / 2.0,
        )
    }

    /// All tiles at `zoom` that intersect this box, row by row
    pub fn tiles_at(&self, zoom: ZoomLevel) -> Vec<TileCoordinate> {
        let zoom = zoom.min(MAX_ZOOM);
        // Edges lying exactly on a tile boundary must not pull in the neighbor
        let x_min = longitude_to_tile_x(self.min_longitude + EDGE_EPSILON, zoom);
        let x_max = longitude_to_tile_x((self.max_longitude - EDGE_EPSILON).max(self.min_longitude), zoom).max(x_min);
        let y_min = latitude_to_tile_y(self.max_latitude - EDGE_EPSILON, zoom);
        let y_max = latitude_to_tile_y((self.min_latitude + EDGE_EPSILON).min(self.max_latitude), zoom).max(y_min);

        let mut tiles = Vec::new();
        for y in y_min..=y_max {
            for x in x_min..=x_max {
                tiles.push(TileCoordinate { x, y, zoom });
            }
        }
        tiles
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.6}, {:.6}] - [{:.6}, {:.6}]",
            self.min_latitude, self.min_longitude, self.max_latitude, self.max_longitude
        )
    }
}

/// Project a longitude to a tile column, wrapping around the antimeridian
pub fn longitude_to_tile_x(longitude: f64, zoom: ZoomLevel) -> u32 {
    let n = tile_count(zoom) as f64;
    let wrapped = (longitude + 180.0).rem_euclid(360.0);
    let x = (wrapped / 360.0 * n).floor() as i64;
    x.clamp(0, max_tile_index(zoom) as i64) as u32
}

/// Project a latitude to a tile row, clamping beyond the Mercator limit
pub fn latitude_to_tile_y(latitude: f64, zoom: ZoomLevel) -> u32 {
    let n = tile_count(zoom) as f64;
    let lat_rad = latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor() as i64;
    y.clamp(0, max_tile_index(zoom) as i64) as u32
}

/// Longitude of the west edge of a tile column
pub fn tile_x_to_longitude(x: u32, zoom: ZoomLevel) -> f64 {
    x as f64 / tile_count(zoom) as f64 * 360.0 - 180.0
}

/// Latitude of the north edge of a tile row
pub fn tile_y_to_latitude(y: u32, zoom: ZoomLevel) -> f64 {
    let n = tile_count(zoom) as f64;
    (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan().to_degrees()
}

/// A square map region at a zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoordinate {
    pub x: u32,
    pub y: u32,
    pub zoom: ZoomLevel,
}

impl TileCoordinate {
    pub fn new(x: u32, y: u32, zoom: ZoomLevel) -> HeatmapResult<Self> {
        let tile = Self { x, y, zoom };
        if tile.is_valid() {
            Ok(tile)
        } else {
            Err(HeatmapError::InvalidTile { x, y, zoom })
        }
    }

    /// The tile containing `point` at `zoom`
    pub fn from_lat_long(point: LatLong, zoom: ZoomLevel) -> Self {
        let zoom = zoom.min(MAX_ZOOM);
        Self {
            x: longitude_to_tile_x(point.longitude, zoom),
            y: latitude_to_tile_y(point.latitude, zoom),
            zoom,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.zoom <= MAX_ZOOM && (self.x as u64) < tile_count(self.zoom) && (self.y as u64) < tile_count(self.zoom)
    }

    pub fn max_index(&self) -> u32 {
        max_tile_index(self.zoom)
    }

    pub fn parent(&self) -> Option<TileCoordinate> {
        if self.zoom == 0 {
            None
        } else {
            Some(TileCoordinate {
                x: self.x / 2,
                y: self.y / 2,
                zoom: self.zoom - 1,
            })
        }
    }

    pub fn children(&self) -> [TileCoordinate; 4] {
        let zoom = self.zoom + 1;
        let x = self.x * 2;
        let y = self.y * 2;
        [
            TileCoordinate { x, y, zoom },
            TileCoordinate { x: x + 1, y, zoom },
            TileCoordinate { x, y: y + 1, zoom },
            TileCoordinate { x: x + 1, y: y + 1, zoom },
        ]
    }

    /// Ancestor (or self) at a coarser zoom
    pub fn ancestor_at(&self, zoom: ZoomLevel) -> Option<TileCoordinate> {
        if zoom > self.zoom {
            return None;
        }
        let shift = (self.zoom - zoom) as u32;
        Some(TileCoordinate {
            x: self.x.checked_shr(shift).unwrap_or(0),
            y: self.y.checked_shr(shift).unwrap_or(0),
            zoom,
        })
    }

    /// Top-left descendant (or self) at a finer zoom
    pub fn scale_to(&self, zoom: ZoomLevel) -> Option<TileCoordinate> {
        if zoom < self.zoom || zoom > MAX_ZOOM {
            return None;
        }
        let shift = zoom - self.zoom;
        Some(TileCoordinate {
            x: self.x << shift,
            y: self.y << shift,
            zoom,
        })
    }

    pub fn is_ancestor_of(&self, other: &TileCoordinate) -> bool {
        other.zoom > self.zoom && other.ancestor_at(self.zoom) == Some(*self)
    }

    pub fn left(&self) -> TileCoordinate {
        let x = if self.x == 0 { self.max_index() } else { self.x - 1 };
        TileCoordinate { x, ..*self }
    }

    pub fn right(&self) -> TileCoordinate {
        let x = if self.x >= self.max_index() { 0 } else { self.x + 1 };
        TileCoordinate { x, ..*self }
    }

    /// Row above, `None` on the northern edge
    pub fn above(&self) -> Option<TileCoordinate> {
        if self.y == 0 {
            None
        } else {
            Some(TileCoordinate { y: self.y - 1, ..*self })
        }
    }

    /// Row below, `None` on the southern edge
    pub fn below(&self) -> Option<TileCoordinate> {
        if self.y >= self.max_index() {
            None
        } else {
            Some(TileCoordinate { y: self.y + 1, ..*self })
        }
    }

    pub fn above_left(&self) -> Option<TileCoordinate> {
        self.above().map(|t| t.left())
    }

    pub fn above_right(&self) -> Option<TileCoordinate> {
        self.above().map(|t| t.right())
    }

    pub fn below_left(&self) -> Option<TileCoordinate> {
        self.below().map(|t| t.left())
    }

    pub fn below_right(&self) -> Option<TileCoordinate> {
        self.below().map(|t| t.right())
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            tile_y_to_latitude(self.y + 1, self.zoom),
            tile_x_to_longitude(self.x, self.zoom),
            tile_y_to_latitude(self.y, self.zoom),
            tile_x_to_longitude(self.x + 1, self.zoom),
        )
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(TileCoordinate::new(3, 3, 2).is_ok());
        assert!(TileCoordinate::new(4, 0, 2).is_err());
        assert!(TileCoordinate::new(0, 4, 2).is_err());
        assert!(TileCoordinate::new(0, 0, MAX_ZOOM + 1).is_err());
    }

    #[test]
    fn test_parent_and_children() {
        let tile = TileCoordinate::new(5, 6, 3).unwrap();
        assert_eq!(tile.parent(), Some(TileCoordinate { x: 2, y: 3, zoom: 2 }));
        assert_eq!(TileCoordinate { x: 0, y: 0, zoom: 0 }.parent(), None);

        for child in tile.children() {
            assert_eq!(child.parent(), Some(tile));
            assert!(tile.is_ancestor_of(&child));
        }
        assert!(!tile.is_ancestor_of(&tile));
    }

    #[test]
    fn test_horizontal_neighbors_wrap() {
        let west_edge = TileCoordinate::new(0, 1, 2).unwrap();
        assert_eq!(west_edge.left(), TileCoordinate { x: 3, y: 1, zoom: 2 });

        let east_edge = TileCoordinate::new(3, 1, 2).unwrap();
        assert_eq!(east_edge.right(), TileCoordinate { x: 0, y: 1, zoom: 2 });

        let world = TileCoordinate::new(0, 0, 0).unwrap();
        assert_eq!(world.left(), world);
        assert_eq!(world.right(), world);
    }

    #[test]
    fn test_vertical_neighbors_stop_at_poles() {
        let top = TileCoordinate::new(1, 0, 2).unwrap();
        assert_eq!(top.above(), None);
        assert_eq!(top.above_left(), None);
        assert_eq!(top.below(), Some(TileCoordinate { x: 1, y: 1, zoom: 2 }));

        let bottom = TileCoordinate::new(0, 3, 2).unwrap();
        assert_eq!(bottom.below(), None);
        assert_eq!(bottom.below_right(), None);
        assert_eq!(bottom.above_left(), Some(TileCoordinate { x: 3, y: 2, zoom: 2 }));
    }

    #[test]
    fn test_scale_and_ancestor() {
        let tile = TileCoordinate::new(1, 2, 2).unwrap();
        let scaled = tile.scale_to(5).unwrap();
        assert_eq!(scaled, TileCoordinate { x: 8, y: 16, zoom: 5 });
        assert_eq!(scaled.ancestor_at(2), Some(tile));
        assert_eq!(tile.scale_to(1), None);
        assert_eq!(tile.ancestor_at(3), None);
    }

    #[test]
    fn test_projection_of_known_points() {
        let origin = TileCoordinate::from_lat_long(LatLong::new(0.0, 0.0), 1);
        assert_eq!(origin, TileCoordinate { x: 1, y: 1, zoom: 1 });

        let north_west = TileCoordinate::from_lat_long(LatLong::new(85.0, -179.0), 4);
        assert_eq!(north_west.x, 0);
        assert_eq!(north_west.y, 0);
    }

    #[test]
    fn test_projection_clamps_polar_latitudes() {
        let north = TileCoordinate::from_lat_long(LatLong::new(90.0, 10.0), 6);
        assert_eq!(north.y, 0);

        let south = TileCoordinate::from_lat_long(LatLong::new(-90.0, 10.0), 6);
        assert_eq!(south.y, max_tile_index(6));
        assert!(south.is_valid());
    }

    #[test]
    fn test_projection_wraps_longitude() {
        let zoom = 5;
        let east = TileCoordinate::from_lat_long(LatLong::new(10.0, 180.0), zoom);
        let west = TileCoordinate::from_lat_long(LatLong::new(10.0, -180.0), zoom);
        assert_eq!(east, west);

        let beyond = TileCoordinate::from_lat_long(LatLong::new(10.0, 190.0), zoom);
        let inside = TileCoordinate::from_lat_long(LatLong::new(10.0, -170.0), zoom);
        assert_eq!(beyond, inside);
    }

    #[test]
    fn test_bounding_box_round_trip() {
        let tile = TileCoordinate::new(5, 9, 4).unwrap();
        let bbox = tile.bounding_box();
        assert!(bbox.min_latitude < bbox.max_latitude);
        assert!(bbox.min_longitude < bbox.max_longitude);
        assert_eq!(TileCoordinate::from_lat_long(bbox.center(), 4), tile);
        assert_eq!(bbox.tiles_at(4), vec![tile]);
    }

    #[test]
    fn test_bounding_box_extend() {
        let mut bbox = TileCoordinate::new(0, 0, 1).unwrap().bounding_box();
        bbox.extend(&TileCoordinate::new(1, 1, 1).unwrap().bounding_box());
        assert!((bbox.min_longitude + 180.0).abs() < 1e-9);
        assert!((bbox.max_longitude - 180.0).abs() < 1e-9);
        assert!((bbox.max_latitude - MAX_LATITUDE).abs() < 1e-6);
        assert_eq!(bbox.tiles_at(1).len(), 4);
    }
}
