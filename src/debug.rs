use std::path::{Path, PathBuf};

use anyhow::Result;
use image::DynamicImage;
use log::debug;

use crate::detection::Inspection;
use crate::overlay;

/// Dumps intermediate images of each measured file, one directory per stage
/// (`01_mask/`, `02_roi/`, `03_overlay/`), one file per input.
#[derive(Clone, Debug)]
pub struct DebugConfig {
    output_dir: PathBuf,
}

impl DebugConfig {
    /// The directory must be empty or non-existent
    pub fn new(output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn stage_path(&self, index: usize, stage: &str, name: &str) -> Result<PathBuf> {
        let step_dir = self.output_dir.join(format!("{:02}_{}", index, stage));
        std::fs::create_dir_all(&step_dir)?;
        Ok(step_dir.join(format!("{}.png", name)))
    }

    /// Save the mask, the ROI crop and the overlay of one inspected image
    pub fn save_inspection(&self, name: &str, img: &DynamicImage, inspection: &Inspection) -> Result<()> {
        let mask_path = self.stage_path(1, "mask", name)?;
        inspection
            .mask
            .image()
            .save(&mask_path)
            .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;

        let roi_path = self.stage_path(2, "roi", name)?;
        inspection
            .roi
            .save(&roi_path)
            .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;

        let overlay_path = self.stage_path(3, "overlay", name)?;
        overlay::render_overlay(img, &inspection.measurement)
            .save(&overlay_path)
            .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;

        debug!("Debug: saved stages of {} to {}", name, self.output_dir.display());
        Ok(())
    }
}
