//! Parameter types configuring the detection pipeline.
//!
//! Defaults reproduce the tuning the pipeline ships with; the knobs that
//! matter most in practice are the objective weights and the inclusion
//! threshold separating finger contacts from palm and ridge artefacts.

use serde::Deserialize;

/// Detector-wide parameters controlling the per-frame pipeline.
#[derive(Clone, Debug, Deserialize)]
pub struct DetectorOptions {
    /// Gaussian blur σ used for preprocessing and for smoothing the
    /// structure-tensor and Hessian fields (5×5 taps each).
    pub blur_sigma: f32,
    /// Weight of the preprocessed image in the labelling objective.
    pub heatmap_weight: f32,
    /// Weight of the ridge measure subtracted from the objective.
    pub ridge_weight: f32,
    /// Minimum value for coarse and fine local maxima.
    pub maxima_threshold: f32,
    /// Component score above which a component seeds the included set.
    pub inclusion_threshold: f32,
    /// Cost model of the weighted distance transform.
    pub distance: DistanceOptions,
    /// Soft-filter σ converting distances into blending weights.
    pub filter_sigma: f32,
    /// Gaussian fitting controls.
    pub fit: FitOptions,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            heatmap_weight: 1.1,
            ridge_weight: 0.9,
            maxima_threshold: 0.05,
            inclusion_threshold: 0.6,
            distance: DistanceOptions::default(),
            filter_sigma: 1.0,
            fit: FitOptions::default(),
        }
    }
}

/// Edge-cost coefficients for the weighted distance transform.
///
/// The cost of entering a pixel is
/// `ridge_cost · rdg + gradient_cost · grad + step_cost · ‖step‖`, where
/// `grad` is the positive part of the structure-tensor eigenvalue sum.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct DistanceOptions {
    pub ridge_cost: f32,
    pub gradient_cost: f32,
    pub step_cost: f32,
    /// Distances above this are not propagated further.
    pub limit: f32,
}

impl Default for DistanceOptions {
    fn default() -> Self {
        Self {
            ridge_cost: 9.0,
            gradient_cost: 1.0,
            step_cost: 0.1,
            limit: 6.0,
        }
    }
}

/// Gaussian-fitting controls.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct FitOptions {
    /// Sampling window around each fine maximum (odd sides).
    pub window: (usize, usize),
    /// EM iterations per frame.
    pub iterations: u32,
    /// Parameter slots allocated up front; the vector grows on demand but
    /// never shrinks.
    pub initial_slots: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            window: (11, 11),
            iterations: 3,
            initial_slots: 32,
        }
    }
}
