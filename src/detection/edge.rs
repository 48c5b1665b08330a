use image::GrayImage;
use image::imageops::crop_imm;
use imageproc::gradients::vertical_sobel;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use log::{debug, warn};

use super::EdgeOptions;
use super::fit::fit_line_irls;
use super::preprocessing;
use crate::error::{LabelError, LabelResult};
use crate::models::{EdgeFit, EdgeLine, FitMethod, Point2};

/// imageproc reports Hough line angles in whole degrees
const HOUGH_HALF_BIN_DEG: f64 = 0.5;

/// Strongest dark-to-light transition in one column of the band
#[derive(Debug, Clone, Copy)]
struct ColumnPeak {
    row: u32,
    strength: f64,
}

/// Straight piece of edge pixels found along a Hough line
#[derive(Debug, Clone, Copy)]
struct Segment {
    start: Point2,
    end: Point2,
    support: usize,
}

impl Segment {
    fn horizontal_extent(&self) -> f64 {
        (self.end.x - self.start.x).abs()
    }
}

/// Height of the analyzed top band for a region of `roi_height` rows
pub fn band_height(roi_height: u32, options: &EdgeOptions) -> u32 {
    let fraction = (options.band_fraction * roi_height as f64) as u32;
    fraction.max(options.min_band_height).min(roi_height)
}

/// Fit the label's top edge inside `roi`. Endpoints are in ROI coordinates
/// at the left and right ROI borders.
pub fn fit_top_edge(roi: &GrayImage, options: &EdgeOptions) -> LabelResult<EdgeFit> {
    let (width, height) = roi.dimensions();
    if width == 0 || height == 0 {
        return Err(LabelError::EdgeFit("empty region of interest".to_string()));
    }

    let band_h = band_height(height, options);
    let band = crop_imm(roi, 0, 0, width, band_h).to_image();
    let band_blur = preprocessing::apply_blur(&band, options.band_blur_sigma);
    debug!("Top band {}x{} of ROI {}x{}", width, band_h, width, height);

    if let Some(fit) = fit_by_gradient(&band_blur, options)? {
        return Ok(fit);
    }

    warn!("Too few gradient columns, falling back to Hough segment detection");
    fit_by_hough(&band_blur, options)
}

fn column_peaks(band: &GrayImage) -> Vec<ColumnPeak> {
    let dy = vertical_sobel(band);
    let (width, height) = dy.dimensions();
    (0..width)
        .map(|x| {
            let mut peak = ColumnPeak { row: 0, strength: 0.0 };
            for y in 0..height {
                let v = (dy.get_pixel(x, y)[0] as f64).max(0.0);
                if v > peak.strength {
                    peak = ColumnPeak { row: y, strength: v };
                }
            }
            peak
        })
        .collect()
}

/// Linear-interpolated percentile (`pct` in 0..=100) of unsorted values
pub(crate) fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Primary estimator. `Ok(None)` means too few confident columns.
fn fit_by_gradient(band: &GrayImage, options: &EdgeOptions) -> LabelResult<Option<EdgeFit>> {
    let width = band.width();
    let peaks = column_peaks(band);
    let strengths: Vec<f64> = peaks.iter().map(|p| p.strength).collect();

    let threshold = if strengths.iter().any(|&s| s > 0.0) {
        options.confidence_ratio * percentile(&strengths, options.confidence_percentile)
    } else {
        0.0
    };

    let points: Vec<Point2> = peaks
        .iter()
        .enumerate()
        .filter(|(_, p)| p.strength > threshold)
        .map(|(x, p)| Point2::new(x as f64, p.row as f64))
        .collect();

    let required = (options.min_columns as f64).max(options.min_column_fraction * width as f64);
    debug!(
        "Gradient threshold {:.1}, accepted {}/{} columns (need {:.0})",
        threshold,
        points.len(),
        width,
        required
    );
    if (points.len() as f64) < required {
        return Ok(None);
    }

    let line = fit_line_irls(&points, options.irls_iterations, options.huber_delta)
        .ok_or_else(|| LabelError::EdgeFit("robust line fit did not converge".to_string()))?;

    let x_left = 0.0;
    let x_right = (width - 1) as f64;
    let edge = EdgeLine::new(
        Point2::new(x_left, line.y_at(x_left)),
        Point2::new(x_right, line.y_at(x_right)),
    )?;
    Ok(Some(EdgeFit {
        line: edge,
        method: FitMethod::Gradient {
            columns: points.len(),
        },
    }))
}

/// Fallback estimator: Canny edges, Hough lines, longest near-horizontal segment
fn fit_by_hough(band: &GrayImage, options: &EdgeOptions) -> LabelResult<EdgeFit> {
    let width = band.width();
    let edges = preprocessing::detect_edges(band, options.canny_low, options.canny_high);
    let edge_pixels: Vec<(u32, u32)> = edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(x, y, _)| (x, y))
        .collect();

    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: options.hough_vote_threshold,
            suppression_radius: options.hough_suppression_radius,
        },
    );
    let min_length = options.min_segment_fraction * width as f64;
    // A true edge may sit half a bin away from the quantized line angle
    let tolerance = 1.0 + width as f64 * HOUGH_HALF_BIN_DEG.to_radians().tan();
    debug!(
        "Hough: {} edge pixels, {} lines, min segment {:.1} px",
        edge_pixels.len(),
        lines.len(),
        min_length
    );

    let best = lines
        .iter()
        .filter(|line| (45..=135).contains(&line.angle_in_degrees))
        .filter_map(|line| extract_segment(&edge_pixels, line, tolerance, min_length, options))
        .max_by(|a, b| a.horizontal_extent().total_cmp(&b.horizontal_extent()))
        .ok_or_else(|| LabelError::EdgeFit("no line segment found in top band".to_string()))?;

    let slope = (best.end.y - best.start.y) / (best.end.x - best.start.x + 1e-6);
    let y_at = |x: f64| best.start.y + (x - best.start.x) * slope;
    let x_left = 0.0;
    let x_right = (width - 1) as f64;
    let edge = EdgeLine::new(
        Point2::new(x_left, y_at(x_left)),
        Point2::new(x_right, y_at(x_right)),
    )?;
    Ok(EdgeFit {
        line: edge,
        method: FitMethod::Hough {
            support: best.support,
        },
    })
}

/// Longest gap-bounded run of edge pixels near `line`, refitted through
/// the run's own pixels so the result is not bound to the whole-degree
/// angle of the Hough line.
fn extract_segment(
    edge_pixels: &[(u32, u32)],
    line: &PolarLine,
    tolerance: f64,
    min_length: f64,
    options: &EdgeOptions,
) -> Option<Segment> {
    let theta = (line.angle_in_degrees as f64).to_radians();
    let (sin, cos) = theta.sin_cos();
    let r = line.r as f64;

    let mut near: Vec<(u32, u32)> = edge_pixels
        .iter()
        .copied()
        .filter(|&(x, y)| (x as f64 * cos + y as f64 * sin - r).abs() <= tolerance)
        .collect();
    near.sort_unstable();

    let run = near
        .chunk_by(|a, b| b.0 - a.0 <= options.max_segment_gap)
        .max_by_key(|run| run[run.len() - 1].0 - run[0].0)?;
    let (x0, x1) = (run[0].0 as f64, run[run.len() - 1].0 as f64);
    let extent = x1 - x0;
    if extent <= 0.0 || extent < min_length {
        return None;
    }

    let points: Vec<Point2> = run
        .iter()
        .map(|&(x, y)| Point2::new(x as f64, y as f64))
        .collect();
    let fitted = fit_line_irls(&points, options.irls_iterations, options.huber_delta)?;
    Some(Segment {
        start: Point2::new(x0, fitted.y_at(x0)),
        end: Point2::new(x1, fitted.y_at(x1)),
        support: run.len(),
    })
}
