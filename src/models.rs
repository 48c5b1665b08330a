use serde::Serialize;

use crate::error::{LabelError, LabelResult};

/// Endpoints closer than this are treated as a degenerate edge
pub const MIN_EDGE_LENGTH_PX: f64 = 1.0;

/// Point in image-pixel coordinates (x right, y down)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(self, other: Point2) -> Point2 {
        Point2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Point2) -> Point2 {
        Point2::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, factor: f64) -> Point2 {
        Point2::new(self.x * factor, self.y * factor)
    }

    pub fn dot(self, other: Point2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Point2) -> f64 {
        self.sub(other).norm()
    }

    pub fn midpoint(self, other: Point2) -> Point2 {
        self.add(other).scale(0.5)
    }
}

/// Axis-aligned rectangle in the analyzed image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Fitted top edge of a label.
///
/// `left` and `right` are the endpoints in pixel coordinates, `angle_deg` is
/// the angle from the positive x-axis to the vector `left -> right`, in
/// (-180, 180]. Construction fails for endpoints that (nearly) coincide.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeLine {
    left: Point2,
    right: Point2,
    angle_deg: f64,
}

impl EdgeLine {
    pub fn new(left: Point2, right: Point2) -> LabelResult<Self> {
        let length = left.distance(right);
        if !length.is_finite() || length <= MIN_EDGE_LENGTH_PX {
            return Err(LabelError::EdgeFit(format!(
                "degenerate edge, endpoints {:.2} px apart",
                length
            )));
        }
        let dir = right.sub(left);
        Ok(Self {
            left,
            right,
            angle_deg: dir.y.atan2(dir.x).to_degrees(),
        })
    }

    pub fn left(&self) -> Point2 {
        self.left
    }

    pub fn right(&self) -> Point2 {
        self.right
    }

    pub fn angle_deg(&self) -> f64 {
        self.angle_deg
    }

    pub fn length(&self) -> f64 {
        self.left.distance(self.right)
    }

    pub fn center(&self) -> Point2 {
        self.left.midpoint(self.right)
    }

    /// Unit vector pointing from `left` to `right`
    pub fn direction(&self) -> Point2 {
        let dir = self.right.sub(self.left);
        dir.scale(1.0 / dir.norm())
    }

    /// Same line shifted by `offset`, e.g. from ROI-local into image coordinates
    pub fn translated(&self, offset: Point2) -> Self {
        Self {
            left: self.left.add(offset),
            right: self.right.add(offset),
            angle_deg: self.angle_deg,
        }
    }
}

/// Which estimator produced an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FitMethod {
    /// Per-column vertical gradient maxima, robust line fit
    Gradient { columns: usize },
    /// Canny edges and Hough line segment; `support` counts the edge pixels on it
    Hough { support: usize },
}

impl FitMethod {
    pub fn is_fallback(&self) -> bool {
        matches!(self, FitMethod::Hough { .. })
    }
}

impl std::fmt::Display for FitMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitMethod::Gradient { columns } => write!(f, "gradient ({} columns)", columns),
            FitMethod::Hough { support } => write!(f, "hough ({} edge pixels)", support),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeFit {
    pub line: EdgeLine,
    pub method: FitMethod,
}

/// Calibrated top-edge measurement of one image
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measurement {
    pub edge: EdgeLine,
    pub pixel_length: f64,
    pub pixels_per_cm: f64,
    pub center: Point2,
    pub bbox: BoundingBox,
    pub method: FitMethod,
}

impl Measurement {
    pub fn angle_deg(&self) -> f64 {
        self.edge.angle_deg()
    }
}

/// Offsets of a current measurement relative to a reference measurement.
/// Positive offsets point to the "up" side of the reference edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub offset_center_px: f64,
    pub offset_center_mm: f64,
    pub rotation_delta_deg: f64,
    pub left_offset_px: f64,
    pub left_offset_mm: f64,
    pub right_offset_px: f64,
    pub right_offset_mm: f64,
    pub current_left_abs: Point2,
    pub current_right_abs: Point2,
    pub cm_per_pixel: f64,
    pub mm_per_pixel: f64,
}
