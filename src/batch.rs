use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{info, warn};
use rayon::prelude::*;

use crate::compare::compare;
use crate::detection::{LabelMeter, load_image};
use crate::error::LabelError;
use crate::models::{ComparisonResult, Measurement};
use crate::overlay;

/// File extensions picked up from an input directory (lowercase)
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// One "reference -> current" comparison, successful or not
#[derive(Debug)]
pub struct PairOutcome {
    pub label: String,
    pub current: PathBuf,
    pub result: Result<ComparisonResult, LabelError>,
}

#[derive(Debug)]
pub struct BatchReport {
    pub reference: PathBuf,
    pub reference_measurement: Measurement,
    /// In input order
    pub pairs: Vec<PairOutcome>,
}

impl BatchReport {
    pub fn failures(&self) -> usize {
        self.pairs.iter().filter(|p| p.result.is_err()).count()
    }

    /// Number of images taking part, reference included
    pub fn image_count(&self) -> usize {
        self.pairs.len() + 1
    }
}

/// Image files of `dir` with a known extension, sorted by path.
/// The first entry is the batch reference.
pub fn discover_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let known = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if known {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Row label of a comparison, e.g. `a.jpg  ->  b.jpg`
pub fn pair_label(reference: &Path, current: &Path) -> String {
    format!("{}  ->  {}", file_name(reference), file_name(current))
}

/// Overlay file for `image` inside `dir`: `analyse_<file name>`
pub fn overlay_path(dir: &Path, image: &Path) -> PathBuf {
    dir.join(format!("analyse_{}", file_name(image)))
}

fn measure_file(meter: &LabelMeter, path: &Path, overlay_dir: Option<&Path>) -> Result<Measurement, LabelError> {
    let img = load_image(path)?;
    let measurement = meter.measure(&img)?;
    if let Some(dir) = overlay_dir {
        if let Err(e) = overlay::save_overlay(&img, &measurement, &overlay_path(dir, path)) {
            warn!("Overlay for {} not written: {:#}", path.display(), e);
        }
    }
    Ok(measurement)
}

/// Compare every image against the first one.
///
/// The reference must measure successfully, otherwise the whole batch fails.
/// Any other image that fails is reported in its own outcome and the rest
/// of the batch carries on. Pairs are processed on the current rayon pool.
pub fn run_batch(meter: &LabelMeter, files: &[PathBuf], overlay_dir: Option<&Path>) -> Result<BatchReport> {
    let Some((reference, rest)) = files.split_first() else {
        bail!("No input images");
    };
    if rest.is_empty() {
        bail!("Need at least two images, found only {}", reference.display());
    }

    let reference_measurement = measure_file(meter, reference, overlay_dir)
        .with_context(|| format!("Reference image {} could not be measured", reference.display()))?;
    info!(
        "Reference {}: {:.4} px/cm",
        reference.display(),
        reference_measurement.pixels_per_cm
    );

    let pairs: Vec<PairOutcome> = rest
        .par_iter()
        .map(|current| {
            let label = pair_label(reference, current);
            let result = measure_file(meter, current, overlay_dir)
                .map(|m| compare(&reference_measurement, &m));
            match &result {
                Ok(r) => info!(
                    "{}: offset {:.4} mm, rotation {:+.4} deg",
                    label, r.offset_center_mm, r.rotation_delta_deg
                ),
                Err(e) => warn!("{}: {}", label, e),
            }
            PairOutcome {
                label,
                current: current.clone(),
                result,
            }
        })
        .collect();

    Ok(BatchReport {
        reference: reference.clone(),
        reference_measurement,
        pairs,
    })
}
