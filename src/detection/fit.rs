//! Robust straight-line fitting.
//!
//! The line minimizes perpendicular (total least squares) distance: its
//! direction is the principal axis of the weighted point cloud. Huber weights
//! are re-estimated from the residuals of the previous pass (IRLS), so a
//! minority of outliers only pulls the line with bounded force.

use crate::models::Point2;

const EPS: f64 = 1e-12;

/// Infinite line through `point` along the unit vector `direction`.
/// `direction.x` is never negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedLine {
    pub point: Point2,
    pub direction: Point2,
}

impl FittedLine {
    /// Unit normal (direction rotated by +90°)
    pub fn normal(&self) -> Point2 {
        Point2::new(-self.direction.y, self.direction.x)
    }

    /// Signed perpendicular distance of `p` from the line
    pub fn residual(&self, p: Point2) -> f64 {
        p.sub(self.point).dot(self.normal())
    }

    /// y coordinate of the line at `x`; a vertical line returns its anchor y
    pub fn y_at(&self, x: f64) -> f64 {
        if self.direction.x.abs() < 1e-6 {
            return self.point.y;
        }
        self.point.y + (x - self.point.x) / self.direction.x * self.direction.y
    }
}

fn huber_weight(residual: f64, delta: f64) -> f64 {
    let abs = residual.abs();
    if abs <= delta { 1.0 } else { delta / abs }
}

fn principal_axis(points: &[Point2], weights: &[f64]) -> Option<FittedLine> {
    let mut sum_w = 0.0;
    let mut mu = Point2::new(0.0, 0.0);
    for (p, &w) in points.iter().zip(weights) {
        sum_w += w;
        mu = mu.add(p.scale(w));
    }
    if sum_w <= EPS {
        return None;
    }
    mu = mu.scale(1.0 / sum_w);

    let mut cov_xx = 0.0;
    let mut cov_xy = 0.0;
    let mut cov_yy = 0.0;
    for (p, &w) in points.iter().zip(weights) {
        let d = p.sub(mu);
        cov_xx += w * d.x * d.x;
        cov_xy += w * d.x * d.y;
        cov_yy += w * d.y * d.y;
    }
    cov_xx /= sum_w;
    cov_xy /= sum_w;
    cov_yy /= sum_w;

    let trace = cov_xx + cov_yy;
    let spread = (cov_xx - cov_yy) * (cov_xx - cov_yy) + 4.0 * cov_xy * cov_xy;
    let lambda = 0.5 * (trace + spread.max(0.0).sqrt());
    let mut dir = Point2::new(cov_xy, lambda - cov_xx);
    let norm = dir.norm();
    dir = if norm <= EPS {
        Point2::new(1.0, 0.0)
    } else {
        dir.scale(1.0 / norm)
    };
    if dir.x < 0.0 || (dir.x == 0.0 && dir.y < 0.0) {
        dir = dir.scale(-1.0);
    }
    Some(FittedLine {
        point: mu,
        direction: dir,
    })
}

/// Fit a line through `points` with Huber-weighted IRLS.
/// Returns `None` for fewer than two points.
pub fn fit_line_irls(points: &[Point2], iterations: usize, huber_delta: f64) -> Option<FittedLine> {
    if points.len() < 2 {
        return None;
    }
    let mut weights = vec![1.0; points.len()];
    let mut line = principal_axis(points, &weights)?;
    for _ in 0..iterations {
        for (w, p) in weights.iter_mut().zip(points) {
            *w = huber_weight(line.residual(*p), huber_delta);
        }
        let next = principal_axis(points, &weights)?;
        let turn = next.direction.sub(line.direction).norm();
        let shift = line.residual(next.point).abs();
        line = next;
        if turn < 1e-9 && shift < 1e-6 {
            break;
        }
    }
    Some(line)
}
