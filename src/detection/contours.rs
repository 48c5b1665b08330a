use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_polygon_mut;
use imageproc::morphology::{close, open};
use imageproc::point::Point;
use log::debug;

use super::SegmentOptions;
use super::preprocessing;
use crate::error::{LabelError, LabelResult};
use crate::models::BoundingBox;

/// Binary image of the label blob (255 = label), same size as its source
#[derive(Debug, Clone)]
pub struct LabelMask {
    image: GrayImage,
}

impl LabelMask {
    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }

    pub fn area(&self) -> u64 {
        preprocessing::count_foreground(&self.image)
    }
}

/// Outer boundary of the largest foreground component. Never empty.
#[derive(Debug, Clone)]
pub struct LabelContour {
    points: Vec<Point<i32>>,
}

impl LabelContour {
    fn new(points: Vec<Point<i32>>) -> Option<Self> {
        if points.is_empty() {
            None
        } else {
            Some(Self { points })
        }
    }

    pub fn points(&self) -> &[Point<i32>] {
        &self.points
    }

    /// Enclosed area (shoelace formula over the boundary polygon)
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    /// Inclusive pixel bounds of the boundary points
    pub fn bounding_box(&self) -> BoundingBox {
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let min_x = min_x.max(0);
        let min_y = min_y.max(0);
        BoundingBox {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1).max(0) as u32,
            height: (max_y - min_y + 1).max(0) as u32,
        }
    }
}

fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    twice_area.abs() as f64 / 2.0
}

/// Isolate the label: blur, Otsu, polarity fix, close/open, largest
/// external contour, filled back into a mask.
pub fn segment(img: &DynamicImage, options: &SegmentOptions) -> LabelResult<(LabelMask, LabelContour)> {
    let gray = preprocessing::to_grayscale(img);
    let blurred = preprocessing::apply_blur(&gray, options.blur_sigma);

    let (mut mask, level) = preprocessing::binarize_otsu(&blurred);
    let total = mask.width() as u64 * mask.height() as u64;
    let foreground = preprocessing::count_foreground(&mask);
    debug!("Otsu level {}, foreground {}/{} px", level, foreground, total);

    // The label is assumed to cover a minority of the frame
    if foreground * 2 > total {
        debug!("Foreground exceeds half the frame, inverting mask");
        mask = preprocessing::invert_mask(&mask);
    }

    if options.morph_radius > 0 {
        mask = close(&mask, Norm::LInf, options.morph_radius);
        mask = open(&mask, Norm::LInf, options.morph_radius);
    }

    let external: Vec<_> = find_contours::<i32>(&mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .collect();
    debug!("Found {} external contours", external.len());

    let contour = external
        .into_iter()
        .filter_map(|c| LabelContour::new(c.points))
        .map(|c| {
            let area = c.area();
            (c, area)
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
        .ok_or_else(|| LabelError::Segmentation("no foreground contour found".to_string()))?;

    debug!(
        "Largest contour: {} points, area {:.1} px",
        contour.points().len(),
        contour.area()
    );

    let filled = fill_contour(mask.width(), mask.height(), contour.points());
    Ok((LabelMask { image: filled }, contour))
}

/// Rasterize a single closed contour into a filled mask
fn fill_contour(width: u32, height: u32, points: &[Point<i32>]) -> GrayImage {
    let mut filled = GrayImage::new(width, height);
    let mut polygon = points.to_vec();
    polygon.dedup();
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    if polygon.len() >= 3 {
        draw_polygon_mut(&mut filled, &polygon, Luma([255u8]));
    }
    for p in points {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
            filled.put_pixel(p.x as u32, p.y as u32, Luma([255u8]));
        }
    }
    filled
}
