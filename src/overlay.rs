use std::path::Path;

use anyhow::Result;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::compare::up_normal;
use crate::models::{Measurement, Point2};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const EDGE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const CENTER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const REFERENCE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const GAUGE_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const CENTER_RADIUS: i32 = 4;
const GAUGE_LENGTH: f64 = 60.0;
const STROKE: u32 = 2;

/// Annotated copy of `img` for manual inspection: label bounding box,
/// fitted top edge, its center and an angle gauge. The gauge is a vertical
/// reference ray next to the edge normal; the wedge between them is the
/// edge angle. Reads the measurement only.
pub fn render_overlay(img: &DynamicImage, measurement: &Measurement) -> RgbImage {
    let mut canvas = img.to_rgb8();

    let bbox = measurement.bbox;
    for t in 0..STROKE {
        let width = (bbox.width + 1).saturating_sub(2 * t).max(1);
        let height = (bbox.height + 1).saturating_sub(2 * t).max(1);
        let rect = Rect::at((bbox.x + t) as i32, (bbox.y + t) as i32).of_size(width, height);
        draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
    }

    let left = measurement.edge.left();
    let right = measurement.edge.right();
    for t in 0..STROKE {
        let dy = t as f32;
        draw_line_segment_mut(
            &mut canvas,
            (left.x as f32, left.y as f32 + dy),
            (right.x as f32, right.y as f32 + dy),
            EDGE_COLOR,
        );
    }

    let center = measurement.center;
    let ray = |dir: Point2| {
        let tip = center.add(dir.scale(GAUGE_LENGTH));
        ((center.x as f32, center.y as f32), (tip.x as f32, tip.y as f32))
    };
    let (from, to) = ray(Point2::new(0.0, -1.0));
    draw_line_segment_mut(&mut canvas, from, to, REFERENCE_COLOR);
    let (from, to) = ray(up_normal(measurement));
    draw_line_segment_mut(&mut canvas, from, to, GAUGE_COLOR);

    draw_filled_circle_mut(
        &mut canvas,
        (center.x.round() as i32, center.y.round() as i32),
        CENTER_RADIUS,
        CENTER_COLOR,
    );

    canvas
}

/// Render and write an overlay, creating the parent directory if needed
pub fn save_overlay(img: &DynamicImage, measurement: &Measurement, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    render_overlay(img, measurement)
        .save(path)
        .map_err(|e| anyhow::anyhow!("Failed to save overlay {}: {}", path.display(), e))
}
