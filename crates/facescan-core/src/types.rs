use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-Union with another box, 0.0 when the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);

        let intersection = (right - left).max(0.0) * (bottom - top).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Fixed-length numeric summary of one detected face.
///
/// Produced once per image by a [`FaceEncoder`](crate::FaceEncoder) and only
/// ever compared against another descriptor from the same model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDescriptor {
    pub values: Vec<f32>,
    /// Model version that produced this descriptor (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl FaceDescriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &FaceDescriptor) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Euclidean distance between two descriptors.
    pub fn euclidean_distance(&self, other: &FaceDescriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// "Same person" decision between a reference descriptor and a candidate.
pub trait Comparator {
    fn is_match(&self, reference: &FaceDescriptor, candidate: &FaceDescriptor) -> bool;
}

/// Matches when cosine similarity reaches `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct CosineComparator {
    pub threshold: f32,
}

impl Default for CosineComparator {
    fn default() -> Self {
        Self { threshold: 0.40 }
    }
}

impl Comparator for CosineComparator {
    fn is_match(&self, reference: &FaceDescriptor, candidate: &FaceDescriptor) -> bool {
        reference.similarity(candidate) >= self.threshold
    }
}

/// Matches when the Euclidean distance is within `tolerance`.
#[derive(Debug, Clone, Copy)]
pub struct EuclideanComparator {
    pub tolerance: f32,
}

impl Default for EuclideanComparator {
    fn default() -> Self {
        Self { tolerance: 0.6 }
    }
}

impl Comparator for EuclideanComparator {
    fn is_match(&self, reference: &FaceDescriptor, candidate: &FaceDescriptor) -> bool {
        reference.euclidean_distance(candidate) <= self.tolerance
    }
}

impl<C: Comparator + ?Sized> Comparator for Box<C> {
    fn is_match(&self, reference: &FaceDescriptor, candidate: &FaceDescriptor) -> bool {
        (**self).is_match(reference, candidate)
    }
}
