//! Demo command implementation - build a pyramid from random point clusters

use anyhow::{Context, Result};
use heatmap_core::codec::{encode_binary, encode_json};
use heatmap_core::{LatLong, PyramidBuilder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::CliError;

/// Degrees a demo point may stray from its cluster center
const CLUSTER_SPREAD: f64 = 10.0;

pub fn execute(config: &Config, out: PathBuf, clusters: usize, points: usize, seed: Option<u64>) -> Result<()> {
    let seed = seed.unwrap_or_else(rand::random);
    log::info!(
        "Generating {} clusters of {} points (seed {})",
        clusters,
        points,
        seed
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let locations = generate_clusters(&mut rng, clusters, points);

    let mut builder = PyramidBuilder::new(config.pyramid)?;
    builder.feed_all(locations);
    let pyramid = builder
        .build()
        .ok_or_else(|| CliError::validation("demo needs at least one cluster and one point"))?;

    let json = encode_json(&pyramid)?;
    let binary = encode_binary(&pyramid)?;
    log::info!(
        "Pyramid: {} points, {} nodes, JSON {} bytes, binary {} bytes",
        pyramid.total_count(),
        pyramid.node_count(),
        json.len(),
        binary.len()
    );

    heatmap_core::write_to_file(&pyramid, &out)
        .with_context(|| format!("Failed to write pyramid: {}", out.display()))?;
    log::info!("Pyramid written to: {}", out.display());

    Ok(())
}

/// Points scattered uniformly around random cluster centers
pub fn generate_clusters<R: Rng>(rng: &mut R, clusters: usize, points: usize) -> Vec<LatLong> {
    let mut locations = Vec::with_capacity(clusters * points);
    for _ in 0..clusters {
        let center_lat = rng.gen_range(-80.0..80.0);
        let center_lon = rng.gen_range(-170.0..170.0);
        for _ in 0..points {
            locations.push(LatLong::new(
                center_lat + rng.gen_range(-CLUSTER_SPREAD..CLUSTER_SPREAD),
                center_lon + rng.gen_range(-CLUSTER_SPREAD..CLUSTER_SPREAD),
            ));
        }
    }
    locations
}
