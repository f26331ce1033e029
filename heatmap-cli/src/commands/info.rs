//! Info command implementation - summarize a pyramid file

use anyhow::Result;
use heatmap_core::{SpatialPyramid, ZoomLevel};
use std::path::PathBuf;

use crate::commands::load_pyramid;

pub fn execute(pyramid: PathBuf, zoom: Option<ZoomLevel>) -> Result<()> {
    let loaded = load_pyramid(&pyramid)?;
    println!("{}", summarize(&loaded, zoom));
    Ok(())
}

pub fn summarize(pyramid: &SpatialPyramid, zoom: Option<ZoomLevel>) -> String {
    let options = pyramid.options();
    let zoom = zoom.unwrap_or(options.leaf_zoom());
    format!(
        "Points:           {}\n\
         Nodes:            {}\n\
         Leaf tiles:       {}\n\
         Root tile:        {}\n\
         Depth:            {}\n\
         Map zoom range:   {}..={} (level resolution {})\n\
         Bounding box @{}: {}",
        pyramid.total_count(),
        pyramid.node_count(),
        pyramid.leaf_count(),
        pyramid.root().tile,
        pyramid.depth(),
        options.min_map_zoom,
        options.max_map_zoom,
        options.level_resolution,
        zoom,
        pyramid.bounding_box(zoom)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use heatmap_core::{HeatmapOptions, LatLong, PyramidBuilder};

    #[test]
    fn test_summary_lists_counts() {
        let mut builder = PyramidBuilder::new(HeatmapOptions::new(1, 0, 3).unwrap()).unwrap();
        builder.feed_all(vec![LatLong::new(1.0, 1.0); 4]);
        let summary = summarize(&builder.build().unwrap(), None);

        assert!(summary.contains("Points:           4"));
        assert!(summary.contains("Leaf tiles:       1"));
        assert!(summary.contains("level resolution 1"));
        assert!(summary.contains("Bounding box @4"));
    }
}
