use image::{DynamicImage, GrayImage, Luma};
use labelshift::{BoundingBox, Calibration, EdgeLine, FitMethod, LabelMeter, Measurement, Point2};

pub const LABEL_GRAY: f64 = 210.0;
pub const BACKGROUND_GRAY: f64 = 40.0;
pub const TOP_EDGE_CM: f64 = 9.7;

/// A bright rectangular label on a dark background
#[derive(Debug, Clone, Copy)]
pub struct LabelSpec {
    pub center: (f64, f64),
    pub length: f64,
    pub height: f64,
    /// Angle of the top edge (left -> right) from the x-axis, y pointing down
    pub angle_deg: f64,
}

impl LabelSpec {
    pub fn new(center: (f64, f64), length: f64, height: f64, angle_deg: f64) -> Self {
        Self {
            center,
            length,
            height,
            angle_deg,
        }
    }

    pub fn shifted(&self, dx: f64, dy: f64) -> Self {
        Self {
            center: (self.center.0 + dx, self.center.1 + dy),
            ..*self
        }
    }

    pub fn rotated(&self, delta_deg: f64) -> Self {
        Self {
            angle_deg: self.angle_deg + delta_deg,
            ..*self
        }
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        let (sin, cos) = self.angle_deg.to_radians().sin_cos();
        let dx = x - self.center.0;
        let dy = y - self.center.1;
        let local_x = cos * dx + sin * dy;
        let local_y = -sin * dx + cos * dy;
        local_x.abs() <= self.length / 2.0 && local_y.abs() <= self.height / 2.0
    }
}

/// Render the label with 4x4 supersampling so edges are anti-aliased
pub fn render_label(width: u32, height: u32, spec: &LabelSpec) -> DynamicImage {
    render_label_with(width, height, spec, LABEL_GRAY, BACKGROUND_GRAY)
}

pub fn render_label_with(
    width: u32,
    height: u32,
    spec: &LabelSpec,
    label_gray: f64,
    background_gray: f64,
) -> DynamicImage {
    const SAMPLES: u32 = 4;
    let img = GrayImage::from_fn(width, height, |x, y| {
        let mut inside = 0u32;
        for sy in 0..SAMPLES {
            for sx in 0..SAMPLES {
                let px = x as f64 + (sx as f64 + 0.5) / SAMPLES as f64;
                let py = y as f64 + (sy as f64 + 0.5) / SAMPLES as f64;
                if spec.contains(px, py) {
                    inside += 1;
                }
            }
        }
        let coverage = inside as f64 / (SAMPLES * SAMPLES) as f64;
        let value = background_gray + (label_gray - background_gray) * coverage;
        Luma([value.round() as u8])
    });
    DynamicImage::ImageLuma8(img)
}

/// 800x600 frame with a 500x150 label centered at (400, 300)
pub fn standard_label(angle_deg: f64) -> LabelSpec {
    LabelSpec::new((400.0, 300.0), 500.0, 150.0, angle_deg)
}

pub fn render_standard(spec: &LabelSpec) -> DynamicImage {
    render_label(800, 600, spec)
}

pub fn blank_image(value: u8) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(320, 240, Luma([value])))
}

pub fn test_meter() -> LabelMeter {
    LabelMeter::new(Calibration::new(TOP_EDGE_CM).expect("valid calibration"))
}

/// Measurement built directly from edge endpoints
pub fn measurement_from(left: Point2, right: Point2, pixels_per_cm: f64) -> Measurement {
    let edge = EdgeLine::new(left, right).expect("non-degenerate edge");
    Measurement {
        edge,
        pixel_length: edge.length(),
        pixels_per_cm,
        center: edge.center(),
        bbox: BoundingBox {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        },
        method: FitMethod::Gradient { columns: 0 },
    }
}

/// Save an image into `dir` and return its path
pub fn save_image(dir: &std::path::Path, name: &str, img: &DynamicImage) -> std::path::PathBuf {
    let path = dir.join(name);
    img.save(&path).expect("Failed to save test image");
    path
}
