//! Build command implementation - bucket a CSV of points into a pyramid file

use anyhow::{Context, Result};
use heatmap_core::{LatLong, PyramidBuilder};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::CliError;

pub fn execute(config: &Config, input: PathBuf, out: PathBuf, quiet: bool) -> Result<()> {
    log::info!("Building pyramid from: {}", input.display());
    if !input.exists() {
        return Err(CliError::file_not_found(input).into());
    }

    let file = File::open(&input).with_context(|| format!("Failed to open {}", input.display()))?;
    let total_bytes = file.metadata().map(|m| m.len()).unwrap_or(0);

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(total_bytes)
    };
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("=>-"),
    );

    let mut builder = PyramidBuilder::new(config.pyramid)?;
    let file_name = input.display().to_string();
    read_points(BufReader::new(progress.wrap_read(file)), &file_name, |point| builder.feed(point))?;
    progress.finish_and_clear();

    if builder.skipped() > 0 {
        log::warn!("Skipped {} non-finite points", builder.skipped());
    }
    log::info!(
        "Bucketed {} points into {} leaf tiles at zoom {}",
        builder.point_count(),
        builder.bucket_count(),
        config.pyramid.leaf_zoom()
    );

    let pyramid = builder
        .build()
        .ok_or_else(|| CliError::validation(format!("{} contains no points", file_name)))?;
    heatmap_core::write_to_file(&pyramid, &out)
        .with_context(|| format!("Failed to write pyramid: {}", out.display()))?;

    log::info!(
        "Pyramid written to: {} (root {}, depth {})",
        out.display(),
        pyramid.root().tile,
        pyramid.depth()
    );
    Ok(())
}

/// Parse `latitude,longitude` lines. Blank lines and `#` comments are ignored,
/// and an unparseable first data line is treated as a header.
pub fn read_points<R, F>(reader: R, file_name: &str, mut sink: F) -> Result<u64, CliError>
where
    R: BufRead,
    F: FnMut(LatLong),
{
    let mut count = 0u64;
    let mut seen_data = false;
    let mut seen_header = false;

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| CliError::parse(file_name, format!("line {}: {}", index + 1, e)))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_point(line) {
            Some(point) => {
                sink(point);
                count += 1;
                seen_data = true;
            }
            None if !seen_data && !seen_header => {
                seen_header = true;
                log::debug!("Treating first line as header: {}", line);
            }
            None => {
                return Err(CliError::parse(
                    file_name,
                    format!("line {}: expected 'latitude,longitude', got '{}'", index + 1, line),
                ));
            }
        }
    }

    Ok(count)
}

fn parse_point(line: &str) -> Option<LatLong> {
    let mut fields = line.split(',').map(str::trim);
    let latitude = fields.next()?.parse::<f64>().ok()?;
    let longitude = fields.next()?.parse::<f64>().ok()?;
    Some(LatLong::new(latitude, longitude))
}
