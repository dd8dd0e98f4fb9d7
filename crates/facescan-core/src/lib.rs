//! facescan-core — face descriptors and the ONNX encoder behind them.
//!
//! SCRFD finds faces, ArcFace turns the best one into a descriptor, and a
//! [`Comparator`] decides whether two descriptors show the same person.

pub mod alignment;
pub mod detector;
pub mod encoder;
pub mod recognizer;
pub mod types;

pub use encoder::{EncodeError, FaceEncoder, OnnxFaceEncoder};
pub use types::{BoundingBox, Comparator, CosineComparator, EuclideanComparator, FaceDescriptor};

use std::path::PathBuf;

/// Default model directory: `$XDG_DATA_HOME/facescan/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facescan/models")
}
