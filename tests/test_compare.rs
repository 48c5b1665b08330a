mod common;

use common::*;
use labelshift::{Point2, compare, normalize_angle_deg};

const PPCM: f64 = 50.0;

#[test]
fn identical_images_compare_to_zero() -> anyhow::Result<()> {
    let img = render_standard(&standard_label(1.0));
    let meter = test_meter();
    let a = meter.measure(&img)?;
    let b = meter.measure(&img)?;

    let r = compare(&a, &b);
    assert!(r.offset_center_px.abs() < 1e-9);
    assert!(r.left_offset_px.abs() < 1e-9);
    assert!(r.right_offset_px.abs() < 1e-9);
    assert!(r.rotation_delta_deg.abs() < 1e-9);
    assert_eq!(r.current_left_abs, b.edge.left());
    assert_eq!(r.current_right_abs, b.edge.right());
    Ok(())
}

#[test]
fn upward_shift_is_a_positive_offset() -> anyhow::Result<()> {
    let meter = test_meter();
    let base = standard_label(1.0);
    let (sin, cos) = base.angle_deg.to_radians().sin_cos();
    let d = 6.0;
    // Up-pointing normal of the top edge
    let moved = base.shifted(d * sin, -d * cos);

    let a = meter.measure(&render_standard(&base))?;
    let b = meter.measure(&render_standard(&moved))?;
    let r = compare(&a, &b);

    assert!((r.offset_center_px - d).abs() < 1.0, "offset {:.3} px", r.offset_center_px);
    assert!((r.left_offset_px - d).abs() < 1.0, "left {:.3} px", r.left_offset_px);
    assert!((r.right_offset_px - d).abs() < 1.0, "right {:.3} px", r.right_offset_px);
    assert!(r.rotation_delta_deg.abs() < 0.1, "rotation {:.4}", r.rotation_delta_deg);

    let back = compare(&b, &a);
    assert!((back.offset_center_px + d).abs() < 1.0, "reverse offset {:.3}", back.offset_center_px);
    Ok(())
}

#[test]
fn rotation_delta_is_recovered() -> anyhow::Result<()> {
    let meter = test_meter();
    let base = standard_label(0.0);
    let a = meter.measure(&render_standard(&base))?;
    let b = meter.measure(&render_standard(&base.rotated(1.5)))?;

    let r = compare(&a, &b);
    assert!((r.rotation_delta_deg - 1.5).abs() < 0.1, "rotation {:.4}", r.rotation_delta_deg);
    // Rotation about the center: the corners move in opposite directions
    assert!(r.left_offset_px * r.right_offset_px < 0.0);
    Ok(())
}

#[test]
fn millimeters_follow_reference_scale() {
    let a = measurement_from(Point2::new(100.0, 200.0), Point2::new(600.0, 200.0), PPCM);
    // The current image claims another scale; only the reference counts
    let b = measurement_from(Point2::new(100.0, 190.0), Point2::new(600.0, 190.0), 10.0);

    let r = compare(&a, &b);
    assert!((r.mm_per_pixel - 0.2).abs() < 1e-12);
    assert!((r.cm_per_pixel - 0.02).abs() < 1e-12);
    assert!((r.offset_center_px - 10.0).abs() < 1e-9);
    assert!((r.offset_center_mm - r.offset_center_px * r.mm_per_pixel).abs() < 1e-12);
    assert!((r.left_offset_mm - r.left_offset_px * r.mm_per_pixel).abs() < 1e-12);
    assert!((r.right_offset_mm - r.right_offset_px * r.mm_per_pixel).abs() < 1e-12);
    assert!((r.offset_center_mm - 2.0).abs() < 1e-9);
}

#[test]
fn downward_move_is_negative() {
    let a = measurement_from(Point2::new(0.0, 100.0), Point2::new(400.0, 100.0), PPCM);
    let b = measurement_from(Point2::new(0.0, 104.0), Point2::new(400.0, 104.0), PPCM);
    let r = compare(&a, &b);
    assert!((r.offset_center_px + 4.0).abs() < 1e-9);
    assert!((r.left_offset_px + 4.0).abs() < 1e-9);
    assert!((r.right_offset_px + 4.0).abs() < 1e-9);
}

#[test]
fn offset_sign_ignores_edge_parametrization() {
    let current = measurement_from(Point2::new(0.0, 95.0), Point2::new(400.0, 95.0), PPCM);
    let forward = measurement_from(Point2::new(0.0, 100.0), Point2::new(400.0, 100.0), PPCM);
    let reversed = measurement_from(Point2::new(400.0, 100.0), Point2::new(0.0, 100.0), PPCM);

    assert!((compare(&forward, &current).offset_center_px - 5.0).abs() < 1e-9);
    assert!((compare(&reversed, &current).offset_center_px - 5.0).abs() < 1e-9);
}

#[test]
fn along_edge_motion_is_not_an_offset() {
    let a = measurement_from(Point2::new(0.0, 100.0), Point2::new(400.0, 100.0), PPCM);
    let b = measurement_from(Point2::new(30.0, 100.0), Point2::new(430.0, 100.0), PPCM);
    let r = compare(&a, &b);
    assert!(r.offset_center_px.abs() < 1e-9);
    assert!(r.rotation_delta_deg.abs() < 1e-9);
}

#[test]
fn rotation_delta_wraps_around() {
    let edge_at = |deg: f64| {
        let (sin, cos) = deg.to_radians().sin_cos();
        let center = Point2::new(400.0, 300.0);
        let half = Point2::new(cos, sin).scale(200.0);
        measurement_from(center.sub(half), center.add(half), PPCM)
    };

    let r = compare(&edge_at(-100.0), &edge_at(90.0));
    assert!((r.rotation_delta_deg + 170.0).abs() < 1e-6, "got {}", r.rotation_delta_deg);

    let r = compare(&edge_at(-10.0), &edge_at(170.0));
    assert!((r.rotation_delta_deg - 180.0).abs() < 1e-6, "got {}", r.rotation_delta_deg);

    let r = compare(&edge_at(170.0), &edge_at(-170.0));
    assert!((r.rotation_delta_deg - 20.0).abs() < 1e-6, "got {}", r.rotation_delta_deg);

    for delta in [-540.0, -181.0, -180.0, 0.0, 179.5, 180.0, 360.0, 725.0] {
        let n = normalize_angle_deg(delta);
        assert!(n > -180.0 && n <= 180.0, "{} -> {}", delta, n);
    }
}
