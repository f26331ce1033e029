//! Point bucketing and pyramid construction
//!
//! Points are binned into leaf tiles at `max_map_zoom + level_resolution`
//! using a sparse map, then collapsed level by level into a single-rooted
//! count tree.

use crate::error::{HeatmapError, HeatmapResult};
use crate::pyramid::{PyramidNode, SpatialPyramid};
use crate::tile::{LatLong, TileCoordinate, ZoomLevel, MAX_ZOOM};
use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Zoom range and sub-tile resolution of a heatmap pyramid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapOptions {
    /// Each rendered tile is split into `2^level_resolution` cells per axis
    #[serde(default = "default_level_resolution")]
    pub level_resolution: u8,
    #[serde(default)]
    pub min_map_zoom: ZoomLevel,
    #[serde(default = "default_max_map_zoom")]
    pub max_map_zoom: ZoomLevel,
}

fn default_level_resolution() -> u8 {
    3
}

fn default_max_map_zoom() -> ZoomLevel {
    12
}

impl Default for HeatmapOptions {
    fn default() -> Self {
        Self {
            level_resolution: default_level_resolution(),
            min_map_zoom: 0,
            max_map_zoom: default_max_map_zoom(),
        }
    }
}

impl HeatmapOptions {
    pub fn new(level_resolution: u8, min_map_zoom: ZoomLevel, max_map_zoom: ZoomLevel) -> HeatmapResult<Self> {
        let options = Self {
            level_resolution,
            min_map_zoom,
            max_map_zoom,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> HeatmapResult<()> {
        if self.min_map_zoom > self.max_map_zoom {
            return Err(HeatmapError::InvalidOptions(format!(
                "min_map_zoom ({}) is greater than max_map_zoom ({})",
                self.min_map_zoom, self.max_map_zoom
            )));
        }
        let leaf = self.max_map_zoom as u16 + self.level_resolution as u16;
        if leaf > MAX_ZOOM as u16 {
            return Err(HeatmapError::InvalidOptions(format!(
                "max_map_zoom + level_resolution ({}) exceeds the maximum zoom {}",
                leaf, MAX_ZOOM
            )));
        }
        Ok(())
    }

    /// Zoom at which points are bucketed
    pub fn leaf_zoom(&self) -> ZoomLevel {
        self.max_map_zoom + self.level_resolution
    }

    /// Zoom at which the collapse is allowed to stop
    pub fn root_zoom(&self) -> ZoomLevel {
        self.min_map_zoom + self.level_resolution
    }

    pub fn cells_per_tile(&self) -> u32 {
        1u32 << self.level_resolution
    }
}

/// Accumulates points into leaf buckets until `build` is called
#[derive(Debug, Clone)]
pub struct PyramidBuilder {
    options: HeatmapOptions,
    buckets: HashMap<TileCoordinate, u64>,
    point_count: u64,
    skipped: u64,
}

impl PyramidBuilder {
    pub fn new(options: HeatmapOptions) -> HeatmapResult<Self> {
        options.validate()?;
        Ok(Self {
            options,
            buckets: HashMap::new(),
            point_count: 0,
            skipped: 0,
        })
    }

    pub fn options(&self) -> &HeatmapOptions {
        &self.options
    }

    /// Add one point to the bucket of its leaf tile
    pub fn feed(&mut self, point: LatLong) {
        if !point.is_finite() {
            warn!(
                "Skipping non-finite point ({}, {})",
                point.latitude, point.longitude
            );
            self.skipped += 1;
            return;
        }
        let tile = TileCoordinate::from_lat_long(point, self.options.leaf_zoom());
        *self.buckets.entry(tile).or_insert(0) += 1;
        self.point_count += 1;
    }

    pub fn feed_all<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = LatLong>,
    {
        for point in points {
            self.feed(point);
        }
    }

    /// Points accepted so far
    pub fn point_count(&self) -> u64 {
        self.point_count
    }

    /// Distinct leaf tiles holding at least one point
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Points rejected because a coordinate was NaN or infinite
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.point_count = 0;
        self.skipped = 0;
    }

    /// Collapse the current buckets into a pyramid; `None` when no points were fed
    pub fn build(&self) -> Option<SpatialPyramid> {
        collapse(&self.buckets, self.options)
    }
}

/// Thread-safe builder for feeding from several threads at once
#[derive(Debug)]
pub struct SharedPyramidBuilder {
    inner: Mutex<PyramidBuilder>,
}

impl SharedPyramidBuilder {
    pub fn new(options: HeatmapOptions) -> HeatmapResult<Self> {
        Ok(Self {
            inner: Mutex::new(PyramidBuilder::new(options)?),
        })
    }

    pub fn feed(&self, point: LatLong) {
        self.inner.lock().feed(point);
    }

    /// Feed a batch while holding the lock once
    pub fn feed_all<I>(&self, points: I)
    where
        I: IntoIterator<Item = LatLong>,
    {
        self.inner.lock().feed_all(points);
    }

    pub fn point_count(&self) -> u64 {
        self.inner.lock().point_count()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Snapshot the buckets under the lock, then collapse without holding it
    pub fn build(&self) -> Option<SpatialPyramid> {
        let (buckets, options) = {
            let guard = self.inner.lock();
            (guard.buckets.clone(), guard.options)
        };
        collapse(&buckets, options)
    }

    pub fn into_inner(self) -> PyramidBuilder {
        self.inner.into_inner()
    }
}

fn collapse(buckets: &HashMap<TileCoordinate, u64>, options: HeatmapOptions) -> Option<SpatialPyramid> {
    if buckets.is_empty() {
        return None;
    }

    let mut layer: Vec<PyramidNode> = buckets
        .iter()
        .filter(|(_, &count)| count > 0)
        .map(|(&tile, &count)| PyramidNode::leaf(tile, count))
        .collect();
    let mut zoom = options.leaf_zoom();
    let root_zoom = options.root_zoom();

    while !(layer.len() == 1 && zoom <= root_zoom) && zoom > 0 {
        layer = collapse_layer(layer);
        zoom -= 1;
    }

    let root = layer.pop()?;
    debug!(
        "Built pyramid: {} points, root {} ({} leaf buckets)",
        root.count,
        root.tile,
        buckets.len()
    );
    Some(SpatialPyramid::from_parts(root, options))
}

/// Group one layer by parent tile, producing the next coarser layer
fn collapse_layer(layer: Vec<PyramidNode>) -> Vec<PyramidNode> {
    let mut groups: HashMap<TileCoordinate, Vec<PyramidNode>> = HashMap::new();
    for node in layer {
        let parent = TileCoordinate {
            x: node.tile.x / 2,
            y: node.tile.y / 2,
            zoom: node.tile.zoom - 1,
        };
        groups.entry(parent).or_default().push(node);
    }

    groups
        .into_iter()
        .map(|(tile, mut children)| {
            children.sort_by_key(|child| (child.tile.y, child.tile.x));
            let count = children.iter().map(|child| child.count).sum();
            PyramidNode {
                count,
                tile,
                children,
            }
        })
        .collect()
}
