use log::debug;

use crate::models::{ComparisonResult, Measurement, Point2};

/// "Up" in image coordinates (y grows downwards)
const UP: Point2 = Point2::new(0.0, -1.0);

/// Map an angle difference into (-180, 180]
pub fn normalize_angle_deg(mut angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    angle %= 360.0;
    while angle > 180.0 {
        angle -= 360.0;
    }
    while angle <= -180.0 {
        angle += 360.0;
    }
    angle
}

/// Unit normal of the reference edge, oriented so it never points down.
/// Positive projections onto it mean "moved towards the up side of the edge",
/// whichever way the edge itself is parametrized.
pub fn up_normal(reference: &Measurement) -> Point2 {
    let u = reference.edge.direction();
    let candidate = Point2::new(-u.y, u.x);
    if candidate.dot(UP) >= 0.0 {
        candidate
    } else {
        candidate.scale(-1.0)
    }
}

/// Offsets and rotation of `current` relative to `reference`.
///
/// The millimeter scale comes from the reference image alone: camera
/// distance and zoom are assumed identical for every capture. A change in
/// imaging geometry is not detected here and silently skews the mm values.
pub fn compare(reference: &Measurement, current: &Measurement) -> ComparisonResult {
    let cm_per_pixel = 1.0 / reference.pixels_per_cm;
    let mm_per_pixel = 10.0 * cm_per_pixel;
    let n = up_normal(reference);

    let offset_center_px = current.center.sub(reference.center).dot(n);
    let left_offset_px = current.edge.left().sub(reference.edge.left()).dot(n);
    let right_offset_px = current.edge.right().sub(reference.edge.right()).dot(n);
    let rotation_delta_deg = normalize_angle_deg(current.angle_deg() - reference.angle_deg());

    debug!(
        "Normal ({:.4}, {:.4}), center offset {:.3} px, rotation {:+.3} deg",
        n.x, n.y, offset_center_px, rotation_delta_deg
    );

    ComparisonResult {
        offset_center_px,
        offset_center_mm: offset_center_px * mm_per_pixel,
        rotation_delta_deg,
        left_offset_px,
        left_offset_mm: left_offset_px * mm_per_pixel,
        right_offset_px,
        right_offset_mm: right_offset_px * mm_per_pixel,
        current_left_abs: current.edge.left(),
        current_right_abs: current.edge.right(),
        cm_per_pixel,
        mm_per_pixel,
    }
}
