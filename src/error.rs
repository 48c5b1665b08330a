use std::path::PathBuf;

use thiserror::Error;

pub type LabelResult<T> = Result<T, LabelError>;

/// Failures of a single image measurement. Each one is fatal for that
/// image (and the pair it belongs to) but never for other images.
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("label segmentation failed: {0}")]
    Segmentation(String),
    #[error("top edge fit failed: {0}")]
    EdgeFit(String),
    #[error("cannot load image {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),
}

impl LabelError {
    /// Short kind name used in reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            LabelError::Segmentation(_) => "segmentation",
            LabelError::EdgeFit(_) => "edge_fit",
            LabelError::FileAccess { .. } => "file_access",
            LabelError::InvalidCalibration(_) => "calibration",
        }
    }
}
