pub mod preprocessing;
pub mod contours;
pub mod fit;
pub mod edge;

use std::path::Path;

use image::imageops::crop_imm;
use image::{DynamicImage, GrayImage};
use log::{debug, info};

use crate::error::{LabelError, LabelResult};
use crate::models::{BoundingBox, Measurement, MIN_EDGE_LENGTH_PX, Point2};
pub use contours::{LabelContour, LabelMask};

/// Physical length of the label's top edge; the in-image ruler.
///
/// Validated once and immutable afterwards. Several calibrations (and
/// meters built on them) may coexist in one process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    top_edge_length_cm: f64,
}

impl Calibration {
    pub fn new(top_edge_length_cm: f64) -> LabelResult<Self> {
        if !top_edge_length_cm.is_finite() || top_edge_length_cm <= 0.0 {
            return Err(LabelError::InvalidCalibration(format!(
                "top edge length must be a positive number of centimeters, got {}",
                top_edge_length_cm
            )));
        }
        Ok(Self { top_edge_length_cm })
    }

    pub fn top_edge_length_cm(&self) -> f64 {
        self.top_edge_length_cm
    }

    pub fn pixels_per_cm(&self, edge_length_px: f64) -> f64 {
        edge_length_px / self.top_edge_length_cm
    }
}

/// Label segmentation parameters
#[derive(Debug, Clone, Copy)]
pub struct SegmentOptions {
    /// Gaussian sigma before thresholding (1.1 matches a 5x5 kernel)
    pub blur_sigma: f32,
    /// Radius of the square closing/opening element (1 = 3x3)
    pub morph_radius: u8,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            morph_radius: 1,
        }
    }
}

/// Region of interest around the label's upper boundary
#[derive(Debug, Clone, Copy)]
pub struct RoiOptions {
    /// Rows kept above the bounding box, in case the true edge sits just outside it
    pub margin_top: u32,
    /// Share of the bounding box height kept below its top
    pub bottom_fraction: f64,
    /// Extra rows added to `bottom_fraction`
    pub bottom_extra: u32,
}

impl Default for RoiOptions {
    fn default() -> Self {
        Self {
            margin_top: 6,
            bottom_fraction: 0.4,
            bottom_extra: 20,
        }
    }
}

/// Top-edge estimator parameters
#[derive(Debug, Clone, Copy)]
pub struct EdgeOptions {
    pub band_fraction: f64,
    pub min_band_height: u32,
    /// Gaussian sigma of the band blur (0.8 matches a 3x3 kernel)
    pub band_blur_sigma: f32,
    pub confidence_percentile: f64,
    /// Columns weaker than this share of the percentile are rejected
    pub confidence_ratio: f64,
    pub min_columns: usize,
    pub min_column_fraction: f64,
    pub irls_iterations: usize,
    /// Residual (px) beyond which IRLS down-weights a point
    pub huber_delta: f64,
    pub canny_low: f32,
    pub canny_high: f32,
    pub hough_vote_threshold: u32,
    pub hough_suppression_radius: u32,
    /// Minimum segment extent as a share of the band width
    pub min_segment_fraction: f64,
    pub max_segment_gap: u32,
}

impl Default for EdgeOptions {
    fn default() -> Self {
        Self {
            band_fraction: 0.30,
            min_band_height: 10,
            band_blur_sigma: 0.8,
            confidence_percentile: 95.0,
            confidence_ratio: 0.30,
            min_columns: 20,
            min_column_fraction: 0.30,
            irls_iterations: 10,
            huber_delta: 1.0,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_vote_threshold: 50,
            hough_suppression_radius: 2,
            min_segment_fraction: 0.5,
            max_segment_gap: 10,
        }
    }
}

/// Measurement plus the intermediate products it was derived from
#[derive(Debug, Clone)]
pub struct Inspection {
    pub measurement: Measurement,
    pub mask: LabelMask,
    pub contour: LabelContour,
    /// Grayscale crop the edge was fitted in
    pub roi: GrayImage,
    /// Placement of `roi` in the image
    pub roi_box: BoundingBox,
}

/// Load an image file for measuring
pub fn load_image(path: &Path) -> LabelResult<DynamicImage> {
    image::open(path).map_err(|source| LabelError::FileAccess {
        path: path.to_path_buf(),
        source,
    })
}

/// Region analyzed for the top edge: the bounding box columns, a few rows
/// above its top and enough rows below to survive a label cut off at the
/// bottom of the frame. Clipped to the image.
pub fn top_band_roi(
    bbox: &BoundingBox,
    image_width: u32,
    image_height: u32,
    options: &RoiOptions,
) -> Option<BoundingBox> {
    if image_width == 0 || image_height == 0 {
        return None;
    }
    let below = ((options.bottom_fraction * bbox.height as f64) as u32 + options.bottom_extra)
        .min(bbox.height);
    let y0 = bbox.y.saturating_sub(options.margin_top).min(image_height - 1);
    let y1 = (bbox.y + below).min(image_height - 1);
    let x0 = bbox.x.min(image_width - 1);
    let x1 = bbox.right().min(image_width - 1);
    if y1 < y0 || x1 < x0 {
        return None;
    }
    Some(BoundingBox {
        x: x0,
        y: y0,
        width: x1 - x0 + 1,
        height: y1 - y0 + 1,
    })
}

/// Builds calibrated top-edge measurements from images
#[derive(Debug, Clone)]
pub struct LabelMeter {
    calibration: Calibration,
    pub segment: SegmentOptions,
    pub roi: RoiOptions,
    pub edge: EdgeOptions,
}

impl LabelMeter {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            calibration,
            segment: SegmentOptions::default(),
            roi: RoiOptions::default(),
            edge: EdgeOptions::default(),
        }
    }

    pub fn with_segment_options(mut self, segment: SegmentOptions) -> Self {
        self.segment = segment;
        self
    }

    pub fn with_roi_options(mut self, roi: RoiOptions) -> Self {
        self.roi = roi;
        self
    }

    pub fn with_edge_options(mut self, edge: EdgeOptions) -> Self {
        self.edge = edge;
        self
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Measure the label's top edge in an image
    pub fn measure(&self, img: &DynamicImage) -> LabelResult<Measurement> {
        Ok(self.inspect(img)?.measurement)
    }

    /// Load and measure an image file
    pub fn measure_path(&self, path: &Path) -> LabelResult<Measurement> {
        let img = load_image(path)?;
        self.measure(&img)
    }

    /// Measure and keep the intermediate mask and ROI
    pub fn inspect(&self, img: &DynamicImage) -> LabelResult<Inspection> {
        let (mask, contour) = contours::segment(img, &self.segment)?;
        let bbox = contour.bounding_box();
        debug!(
            "Label bounding box ({}, {}) {}x{}",
            bbox.x, bbox.y, bbox.width, bbox.height
        );

        let gray = preprocessing::to_grayscale(img);
        let roi_box = top_band_roi(&bbox, gray.width(), gray.height(), &self.roi)
            .ok_or_else(|| LabelError::EdgeFit("empty region of interest".to_string()))?;
        let roi = crop_imm(&gray, roi_box.x, roi_box.y, roi_box.width, roi_box.height).to_image();

        let fit = edge::fit_top_edge(&roi, &self.edge)?;
        let line = fit
            .line
            .translated(Point2::new(roi_box.x as f64, roi_box.y as f64));

        let pixel_length = line.length();
        if pixel_length <= MIN_EDGE_LENGTH_PX {
            return Err(LabelError::EdgeFit(format!(
                "degenerate top edge of {:.2} px",
                pixel_length
            )));
        }
        let pixels_per_cm = self.calibration.pixels_per_cm(pixel_length);

        info!(
            "Top edge via {}: angle {:+.3} deg, length {:.2} px, {:.4} px/cm",
            fit.method,
            line.angle_deg(),
            pixel_length,
            pixels_per_cm
        );

        Ok(Inspection {
            measurement: Measurement {
                edge: line,
                pixel_length,
                pixels_per_cm,
                center: line.center(),
                bbox,
                method: fit.method,
            },
            mask,
            contour,
            roi,
            roi_box,
        })
    }
}
