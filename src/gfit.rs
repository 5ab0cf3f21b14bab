//! Iterative 2-D Gaussian-mixture fitting on log intensity.
//!
//! Each candidate contact owns one parameter slot with an 11×11 sampling
//! window. Fitting alternates an E-step (per-slot responsibility maps,
//! normalised by the summed mixture) with an M-step that solves a 6×6
//! weighted least-squares system for the coefficients of
//! `log g(x, y) ≈ a·x² + 2b·xy + c·y² + d·x + e·y + f` and re-extracts
//! `(scale, mean, precision)` from them. All coordinates are scaled into
//! `[-1, 1]²` for conditioning and scaled back afterwards.
//!
//! Degeneracies (singular system, non-positive-definite precision, empty
//! window) invalidate the slot for the remainder of the frame; the fit never
//! fails a frame.

use crate::image::Image;
use crate::math::{Mat2s, Matrix6, Vector6};
use log::warn;
use nalgebra::Vector2;

/// Inclusive sampling window in image coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowBounds {
    pub xmin: usize,
    pub xmax: usize,
    pub ymin: usize,
    pub ymax: usize,
}

/// Parameters of one candidate Gaussian.
///
/// The slot owns its responsibility map; the containing vector is only ever
/// appended to, so the map's buffer survives for the lifetime of the
/// pipeline.
#[derive(Clone, Debug)]
pub struct FitParams {
    /// Whether this slot holds live parameters.
    pub valid: bool,
    /// Amplitude α.
    pub scale: f64,
    /// Centre µ in image coordinates.
    pub mean: Vector2<f64>,
    /// Precision matrix Σ⁻¹.
    pub prec: Mat2s<f64>,
    /// Sampling window, clamped to the frame.
    pub bounds: WindowBounds,
    /// Responsibilities over the window.
    pub weights: Image<f64>,
}

/// Grow `params` to at least `n` slots and mark every slot invalid.
///
/// Existing slots keep their weight buffers; new slots allocate one of
/// `window` size. The vector never shrinks.
pub fn reserve(params: &mut Vec<FitParams>, n: usize, window: (usize, usize)) {
    while params.len() < n {
        params.push(FitParams {
            valid: false,
            scale: 1.0,
            mean: Vector2::zeros(),
            prec: Mat2s::identity(),
            bounds: WindowBounds::default(),
            weights: Image::new(window.0, window.1),
        });
    }
    for p in params.iter_mut() {
        p.valid = false;
    }
}

#[inline]
fn coordinate_scale(shape: (usize, usize)) -> Vector2<f64> {
    Vector2::new(2.0 / shape.0 as f64, 2.0 / shape.1 as f64)
}

fn downscale(p: &mut FitParams, s: Vector2<f64>) {
    p.mean.x = p.mean.x * s.x - 1.0;
    p.mean.y = p.mean.y * s.y - 1.0;
    // Prec transforms as (S Σ Sᵀ)⁻¹ = S⁻ᵀ Σ⁻¹ S⁻¹.
    p.prec.xx /= s.x * s.x;
    p.prec.xy /= s.x * s.y;
    p.prec.yy /= s.y * s.y;
}

fn upscale(p: &mut FitParams, s: Vector2<f64>) {
    p.mean.x = (p.mean.x + 1.0) / s.x;
    p.mean.y = (p.mean.y + 1.0) / s.y;
    p.prec.xx *= s.x * s.x;
    p.prec.xy *= s.x * s.y;
    p.prec.yy *= s.y * s.y;
}

/// Unnormalised Gaussian density.
#[inline]
fn gaussian_like(x: Vector2<f64>, mean: Vector2<f64>, prec: Mat2s<f64>) -> f64 {
    (-prec.xtmx(&(x - mean)) / 2.0).exp()
}

/// E-step: evaluate every valid Gaussian over its window, accumulate the
/// mixture into `total`, then normalise each map by the mixture (entries with
/// zero mixture keep their raw value — there is nothing to divide by).
fn update_weight_maps(params: &mut [FitParams], total: &mut Image<f64>) {
    let s = coordinate_scale(total.shape());

    total.fill(0.0);

    for p in params.iter_mut() {
        if !p.valid {
            continue;
        }
        for iy in p.bounds.ymin..=p.bounds.ymax {
            for ix in p.bounds.xmin..=p.bounds.xmax {
                let x = ix as f64 * s.x - 1.0;
                let y = iy as f64 * s.y - 1.0;
                let v = p.scale * gaussian_like(Vector2::new(x, y), p.mean, p.prec);
                p.weights[(ix - p.bounds.xmin, iy - p.bounds.ymin)] = v;
            }
        }
    }

    for p in params.iter() {
        if !p.valid {
            continue;
        }
        for iy in p.bounds.ymin..=p.bounds.ymax {
            for ix in p.bounds.xmin..=p.bounds.xmax {
                total[(ix, iy)] += p.weights[(ix - p.bounds.xmin, iy - p.bounds.ymin)];
            }
        }
    }

    for p in params.iter_mut() {
        if !p.valid {
            continue;
        }
        for iy in p.bounds.ymin..=p.bounds.ymax {
            for ix in p.bounds.xmin..=p.bounds.xmax {
                if total[(ix, iy)] > 0.0 {
                    p.weights[(ix - p.bounds.xmin, iy - p.bounds.ymin)] /= total[(ix, iy)];
                }
            }
        }
    }
}

/// M-step system assembly over one window.
///
/// Rows and columns run over the monomials `(x², xy, y², x, y, 1)`; samples
/// are weighted by `(w·I)²` and the observation is `log(w·I + ε)`. The `b`
/// column is doubled afterwards: the model carries `2b·xy`, and folding the
/// factor into the column (instead of symmetrically into row and column plus
/// the right-hand side) is a pure row scaling of the normal equations, which
/// leaves the solution unchanged.
fn assemble_system(
    m: &mut Matrix6<f64>,
    rhs: &mut Vector6<f64>,
    bounds: WindowBounds,
    data: &Image<f32>,
    weights: &Image<f64>,
) {
    let eps = f64::EPSILON;
    let s = coordinate_scale(data.shape());

    m.fill(0.0);
    rhs.fill(0.0);

    for iy in bounds.ymin..=bounds.ymax {
        for ix in bounds.xmin..=bounds.xmax {
            let x = ix as f64 * s.x - 1.0;
            let y = iy as f64 * s.y - 1.0;

            let d = weights[(ix - bounds.xmin, iy - bounds.ymin)] * data[(ix, iy)] as f64;
            let dd = d * d;
            let v = (d + eps).ln() * dd;

            let mon = [x * x, x * y, y * y, x, y, 1.0];
            for r in 0..6 {
                rhs[r] += v * mon[r];
                for c in 0..6 {
                    m[(r, c)] += dd * mon[r] * mon[c];
                }
            }
        }
    }

    for r in 0..6 {
        m[(r, 1)] *= 2.0;
    }
}

/// Recover `(scale, mean, prec)` from the fitted coefficients. Returns false
/// when the precision matrix is not usable (determinant at or below `eps`, or
/// a non-positive leading entry).
fn extract_params(chi: &Vector6<f64>, p: &mut FitParams, eps: f64) -> bool {
    p.prec = Mat2s::new(-2.0 * chi[0], -2.0 * chi[1], -2.0 * chi[2]);

    let det = p.prec.det();
    if det <= eps || p.prec.xx <= 0.0 {
        return false;
    }

    // µ = Σ b with b = (d, e); Σ = prec⁻¹ expanded through the determinant.
    p.mean.x = (p.prec.yy * chi[3] - p.prec.xy * chi[4]) / det;
    p.mean.y = (p.prec.xx * chi[4] - p.prec.xy * chi[3]) / det;

    p.scale = (chi[5] + p.prec.xtmx(&p.mean) / 2.0).exp();

    true
}

/// Run `iterations` EM rounds over all valid slots.
///
/// `data` is the filtered frame the Gaussians are fitted to; `total` is a
/// frame-sized scratch image holding the summed mixture.
pub fn fit(
    params: &mut [FitParams],
    data: &Image<f32>,
    total: &mut Image<f64>,
    iterations: u32,
) {
    assert_eq!(data.shape(), total.shape(), "fit scratch shape mismatch");

    let eps = f64::EPSILON;
    let s = coordinate_scale(data.shape());

    for p in params.iter_mut() {
        if p.valid {
            downscale(p, s);
        }
    }

    for _ in 0..iterations {
        update_weight_maps(params, total);

        for p in params.iter_mut() {
            if !p.valid {
                continue;
            }

            let mut sys = Matrix6::zeros();
            let mut rhs = Vector6::zeros();
            assemble_system(&mut sys, &mut rhs, p.bounds, data, &p.weights);

            let lu = sys.lu();
            if lu.determinant().abs() <= eps {
                warn!("gaussian fit: singular normal-equations system");
                p.valid = false;
                continue;
            }
            let chi = match lu.solve(&rhs) {
                Some(chi) => chi,
                None => {
                    warn!("gaussian fit: singular normal-equations system");
                    p.valid = false;
                    continue;
                }
            };

            p.valid = extract_params(&chi, p, eps);
            if !p.valid {
                warn!("gaussian fit: parameter extraction failed");
            }
        }
    }

    for p in params.iter_mut() {
        if p.valid {
            upscale(p, s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_around(x: usize, y: usize, shape: (usize, usize)) -> WindowBounds {
        WindowBounds {
            xmin: x.saturating_sub(5),
            xmax: (x + 5).min(shape.0 - 1),
            ymin: y.saturating_sub(5),
            ymax: (y + 5).min(shape.1 - 1),
        }
    }

    fn seeded_slot(x: usize, y: usize, shape: (usize, usize)) -> FitParams {
        FitParams {
            valid: true,
            scale: 1.0,
            mean: Vector2::new(x as f64, y as f64),
            prec: Mat2s::identity(),
            bounds: window_around(x, y, shape),
            weights: Image::new(11, 11),
        }
    }

    #[test]
    fn reserve_grows_without_dropping_slots() {
        let mut params = Vec::new();
        reserve(&mut params, 4, (11, 11));
        assert_eq!(params.len(), 4);
        params[1].valid = true;
        reserve(&mut params, 2, (11, 11));
        assert_eq!(params.len(), 4, "reserve never shrinks");
        assert!(!params[1].valid, "reserve invalidates every slot");
        reserve(&mut params, 6, (11, 11));
        assert_eq!(params.len(), 6);
        assert_eq!(params[5].weights.shape(), (11, 11));
    }

    #[test]
    fn coordinate_scaling_round_trips() {
        let s = coordinate_scale((72, 48));
        let mut p = seeded_slot(30, 20, (72, 48));
        p.prec = Mat2s::new(0.3, 0.05, 0.4);
        let before = p.clone();

        downscale(&mut p, s);
        upscale(&mut p, s);

        assert!((p.mean - before.mean).norm() < 1e-12);
        assert!((p.prec.xx - before.prec.xx).abs() < 1e-12);
        assert!((p.prec.xy - before.prec.xy).abs() < 1e-12);
        assert!((p.prec.yy - before.prec.yy).abs() < 1e-12);
    }

    #[test]
    fn single_gaussian_is_recovered_exactly() {
        // log of a sampled Gaussian is exactly quadratic, so the weighted
        // least squares must reproduce the generating parameters.
        let (w, h) = (24, 24);
        let mean = Vector2::new(11.3f64, 12.2);
        let prec = Mat2s::new(0.25f64, 0.03, 0.2);
        let amp = 0.8f64;

        let mut data = Image::new(w, h);
        for i in 0..data.len() {
            let (x, y) = data.coords(i);
            let d = Vector2::new(x as f64, y as f64) - mean;
            data[i] = (amp * (-prec.xtmx(&d) / 2.0).exp()) as f32;
        }

        let mut params = vec![seeded_slot(11, 12, (w, h))];
        let mut total = Image::new(w, h);
        fit(&mut params, &data, &mut total, 3);

        let p = &params[0];
        assert!(p.valid);
        assert!((p.mean.x - mean.x).abs() < 0.05, "mean.x = {}", p.mean.x);
        assert!((p.mean.y - mean.y).abs() < 0.05, "mean.y = {}", p.mean.y);
        assert!((p.prec.xx - prec.xx).abs() < 0.02);
        assert!((p.prec.xy - prec.xy).abs() < 0.02);
        assert!((p.prec.yy - prec.yy).abs() < 0.02);
        assert!((p.scale - amp).abs() < 0.05);
    }

    #[test]
    fn empty_window_invalidates_the_slot() {
        let (w, h) = (16, 16);
        let data = Image::new(w, h);
        let mut params = vec![seeded_slot(8, 8, (w, h))];
        let mut total = Image::new(w, h);
        fit(&mut params, &data, &mut total, 3);
        assert!(!params[0].valid);
    }

    #[test]
    fn valid_slots_have_positive_definite_precision() {
        let (w, h) = (20, 20);
        let mut data = Image::new(w, h);
        for i in 0..data.len() {
            let (x, y) = data.coords(i);
            let dx = x as f64 - 9.4;
            let dy = y as f64 - 10.1;
            data[i] = (0.6 * (-(dx * dx + dy * dy) / 6.0).exp()) as f32;
        }

        let mut params = vec![seeded_slot(9, 10, (w, h))];
        let mut total = Image::new(w, h);
        fit(&mut params, &data, &mut total, 3);

        let p = &params[0];
        assert!(p.valid);
        assert!(p.prec.det() > f64::EPSILON);
        assert!(p.prec.xx > 0.0);
    }
}
