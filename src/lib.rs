pub mod error;
pub mod models;
pub mod detection;
pub mod compare;
pub mod batch;
pub mod report;
pub mod overlay;
pub mod debug;
pub mod receiver;

pub use error::{LabelError, LabelResult};
pub use models::{BoundingBox, ComparisonResult, EdgeFit, EdgeLine, FitMethod, Measurement, Point2};
pub use detection::{
    Calibration, EdgeOptions, Inspection, LabelContour, LabelMask, LabelMeter, RoiOptions,
    SegmentOptions, load_image,
};
pub use compare::{compare, normalize_angle_deg};
pub use batch::{BatchReport, PairOutcome, discover_images, run_batch};
pub use report::ReportFormat;
