use crate::math::Mat2s;
use nalgebra::Vector2;
use serde::Serialize;

/// A fitted touch contact: sub-pixel centre and precision matrix (inverse
/// covariance) in image coordinates.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Contact {
    pub mean: Vector2<f64>,
    pub prec: Mat2s<f64>,
}

/// Accumulated per-label statistics driving component scoring.
#[derive(Clone, Copy, Debug, Default)]
pub struct ComponentStats {
    /// Pixel count.
    pub size: u32,
    /// Sum of preprocessed intensity.
    pub volume: f32,
    /// Sum of `1 - coherence²` over the component.
    pub incoherence: f32,
    /// Coarse local maxima falling inside the component.
    pub maximas: u32,
}
