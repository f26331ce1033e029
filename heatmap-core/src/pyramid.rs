/*!
# Spatial Pyramid

Immutable count tree produced by [`PyramidBuilder`](crate::builder::PyramidBuilder).
Every node owns its children; a node exists only when at least one point fell
inside its tile, so absent tiles mean "no data" rather than zero.

The tree is never mutated after construction and holds no interior
mutability, so a `SpatialPyramid` can be shared across render threads behind
an `Arc` without locking.
*/

use crate::builder::HeatmapOptions;
use crate::error::{HeatmapError, HeatmapResult};
use crate::tile::{tile_count, BoundingBox, TileCoordinate, ZoomLevel};
use serde::{Deserialize, Serialize};

/// One aggregated tile of the pyramid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PyramidNode {
    pub count: u64,
    pub tile: TileCoordinate,
    #[serde(default)]
    pub children: Vec<PyramidNode>,
}

impl PyramidNode {
    pub fn leaf(tile: TileCoordinate, count: u64) -> Self {
        Self {
            count,
            tile,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Visit this node and all of its descendants in pre-order
    pub fn visit<F: FnMut(&PyramidNode)>(&self, f: &mut F) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    fn validate(&self) -> HeatmapResult<()> {
        if !self.tile.is_valid() {
            return Err(HeatmapError::InvalidTile {
                x: self.tile.x,
                y: self.tile.y,
                zoom: self.tile.zoom,
            });
        }
        if self.count == 0 {
            return Err(HeatmapError::InvalidPyramid(format!(
                "node {} has a zero count",
                self.tile
            )));
        }
        if self.is_leaf() {
            return Ok(());
        }
        if self.children.len() > 4 {
            return Err(HeatmapError::InvalidPyramid(format!(
                "node {} has {} children",
                self.tile,
                self.children.len()
            )));
        }

        let mut sum = 0u64;
        for (i, child) in self.children.iter().enumerate() {
            if child.tile.parent() != Some(self.tile) {
                return Err(HeatmapError::InvalidPyramid(format!(
                    "node {} is not a child of {}",
                    child.tile, self.tile
                )));
            }
            if self.children[..i].iter().any(|c| c.tile == child.tile) {
                return Err(HeatmapError::InvalidPyramid(format!(
                    "duplicate child {} under {}",
                    child.tile, self.tile
                )));
            }
            child.validate()?;
            sum = sum.checked_add(child.count).ok_or_else(|| {
                HeatmapError::InvalidPyramid(format!("count overflow under {}", self.tile))
            })?;
        }

        if sum != self.count {
            return Err(HeatmapError::InvalidPyramid(format!(
                "node {} counts {} but its children sum to {}",
                self.tile, self.count, sum
            )));
        }
        Ok(())
    }
}

/// Rectangular buffer of counts, addressed by column and row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountGrid {
    width: u32,
    height: u32,
    cells: Vec<u64>,
}

impl CountGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(self.index(x, y)).copied()
    }

    /// Accumulate `count` into a cell; writes outside the grid are dropped
    pub fn add(&mut self, x: u32, y: u32, count: u64) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let index = self.index(x, y);
        match self.cells.get_mut(index) {
            Some(cell) => {
                *cell = cell.saturating_add(count);
                true
            }
            None => false,
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn cells(&self) -> &[u64] {
        &self.cells
    }

    pub fn total(&self) -> u64 {
        self.cells.iter().copied().fold(0u64, u64::saturating_add)
    }

    pub fn max(&self) -> u64 {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|&c| c == 0)
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }
}

/// Immutable heatmap count tree with a single root
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialPyramid {
    root: PyramidNode,
    options: HeatmapOptions,
}

impl SpatialPyramid {
    pub(crate) fn from_parts(root: PyramidNode, options: HeatmapOptions) -> Self {
        Self { root, options }
    }

    /// Wrap a decoded tree, checking every structural invariant first
    pub fn from_root(root: PyramidNode, options: HeatmapOptions) -> HeatmapResult<Self> {
        options.validate()?;
        let pyramid = Self { root, options };
        pyramid.validate()?;
        Ok(pyramid)
    }

    pub fn root(&self) -> &PyramidNode {
        &self.root
    }

    pub fn options(&self) -> &HeatmapOptions {
        &self.options
    }

    pub fn into_root(self) -> PyramidNode {
        self.root
    }

    pub fn total_count(&self) -> u64 {
        self.root.count
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(&mut |_| count += 1);
        count
    }

    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(&mut |node| {
            if node.is_leaf() {
                count += 1;
            }
        });
        count
    }

    /// Number of zoom levels spanned from the root to the deepest leaf
    pub fn depth(&self) -> usize {
        let mut deepest = self.root.tile.zoom;
        self.root.visit(&mut |node| deepest = deepest.max(node.tile.zoom));
        (deepest - self.root.tile.zoom) as usize + 1
    }

    /// Look up the node for `tile`, if any point fell inside it
    pub fn find(&self, tile: TileCoordinate) -> Option<&PyramidNode> {
        let mut node = &self.root;
        loop {
            if node.tile == tile {
                return Some(node);
            }
            if !node.tile.is_ancestor_of(&tile) {
                return None;
            }
            node = node
                .children
                .iter()
                .find(|child| child.tile == tile || child.tile.is_ancestor_of(&tile))?;
        }
    }

    /// Re-check the count and parent/child invariants of the whole tree
    pub fn validate(&self) -> HeatmapResult<()> {
        self.root.validate()
    }

    /// Add the counts of every tile under `anchor`'s window into `grid`.
    ///
    /// Cell `(cx, cy)` maps to tile `(anchor.x + cx, anchor.y + cy)` at
    /// `anchor.zoom`, wrapping columns around the antimeridian. Counts are
    /// added, so several pyramids can be filled into the same grid.
    pub fn fill_grid(&self, grid: &mut CountGrid, anchor: TileCoordinate) {
        fill_node(&self.root, grid, anchor);
    }

    /// Union of the geographic extents of all nodes at `zoom` (or the
    /// deepest leaves above it)
    pub fn bounding_box(&self, zoom: ZoomLevel) -> BoundingBox {
        let mut bbox: Option<BoundingBox> = None;
        collect_bounding_box(&self.root, zoom, &mut bbox);
        bbox.unwrap_or_else(|| self.root.tile.bounding_box())
    }
}

fn fill_node(node: &PyramidNode, grid: &mut CountGrid, anchor: TileCoordinate) {
    if node.tile.zoom < anchor.zoom {
        if !footprint_intersects(node.tile, anchor, grid.width(), grid.height()) {
            return;
        }
        for child in &node.children {
            fill_node(child, grid, anchor);
        }
        return;
    }

    // At or below the grid resolution: the whole subtree lands in one cell
    if let Some(cell) = node.tile.ancestor_at(anchor.zoom) {
        add_wrapped(grid, anchor, cell, node.count);
    }
}

fn add_wrapped(grid: &mut CountGrid, anchor: TileCoordinate, cell: TileCoordinate, count: u64) {
    let row = cell.y as i64 - anchor.y as i64;
    if row < 0 || row >= grid.height() as i64 {
        return;
    }

    let world = tile_count(anchor.zoom);
    let mut column = (cell.x as u64 + world - anchor.x as u64 % world) % world;
    // A window wider than the world sees the same tile more than once
    while column < grid.width() as u64 {
        grid.add(column as u32, row as u32, count);
        column += world;
    }
}

fn footprint_intersects(tile: TileCoordinate, anchor: TileCoordinate, width: u32, height: u32) -> bool {
    let shift = anchor.zoom - tile.zoom;
    let span = 1u64 << shift;
    let top = (tile.y as u64) << shift;
    let window_top = anchor.y as u64;
    if top + span <= window_top || top >= window_top + height as u64 {
        return false;
    }

    let world = tile_count(anchor.zoom);
    if span >= world || width as u64 >= world {
        return true;
    }
    let left = (tile.x as u64) << shift;
    let start = (left + world - anchor.x as u64 % world) % world;
    start < width as u64 || start + span > world
}

fn collect_bounding_box(node: &PyramidNode, zoom: ZoomLevel, bbox: &mut Option<BoundingBox>) {
    if node.tile.zoom >= zoom || node.is_leaf() {
        let extent = node.tile.bounding_box();
        match bbox {
            Some(existing) => existing.extend(&extent),
            None => *bbox = Some(extent),
        }
        return;
    }
    for child in &node.children {
        collect_bounding_box(child, zoom, bbox);
    }
}
