//! Image file → face descriptor.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::FaceDescriptor;
use std::path::Path;
use thiserror::Error;

pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("no face detected")]
    NoFace,
    #[error("cannot read image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Turns an image file into the descriptor of the face it shows.
///
/// Implementations fail with [`EncodeError::NoFace`] when the image holds no
/// detectable face. When several faces are present the most confident one wins.
pub trait FaceEncoder {
    fn encode(&mut self, path: &Path) -> Result<FaceDescriptor, EncodeError>;
}

/// SCRFD + ArcFace encoder running on ONNX Runtime.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, EncodeError> {
        let detector = FaceDetector::load(&model_dir.join(DETECTOR_MODEL_FILE))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(RECOGNIZER_MODEL_FILE))?;
        Ok(Self {
            detector,
            recognizer,
        })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(&mut self, path: &Path) -> Result<FaceDescriptor, EncodeError> {
        let image = image::open(path)
            .map_err(|source| EncodeError::Image {
                path: path.display().to_string(),
                source,
            })?
            .to_rgb8();

        let faces = self.detector.detect(&image)?;
        let face = faces.first().ok_or(EncodeError::NoFace)?;
        tracing::debug!(
            path = %path.display(),
            faces = faces.len(),
            confidence = face.confidence,
            "encoding best face"
        );

        Ok(self.recognizer.extract(&image, face)?)
    }
}
