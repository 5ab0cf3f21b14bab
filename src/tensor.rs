//! Structure-tensor and Hessian field computation.
//!
//! Both run a single fused pass over the image: the 3×3 derivative kernels
//! are applied per pixel and the symmetric result matrix is written directly,
//! avoiding intermediate gradient images. The caller blurs the resulting
//! `Mat2s` field afterwards (the convolution is linear, so blurring the field
//! component-wise is exact).

use crate::filters::kernels::{SOBEL3_X, SOBEL3_XX, SOBEL3_XY, SOBEL3_Y, SOBEL3_YY};
use crate::image::Image;
use crate::math::Mat2s;

/// Gradient outer product `(gx², gx·gy, gy²)` per pixel.
///
/// Gradients use the Sobel kernels with the extend border, matching the
/// preprocessing blur.
pub fn structure_tensor(out: &mut Image<Mat2s<f32>>, input: &Image<f32>) {
    assert_eq!(out.shape(), input.shape(), "structure tensor shape mismatch");

    let (w, h) = input.shape();
    if w == 0 || h == 0 {
        return;
    }

    for y in 0..h {
        let ys = [y.saturating_sub(1), y, (y + 1).min(h - 1)];
        for x in 0..w {
            let xs = [x.saturating_sub(1), x, (x + 1).min(w - 1)];

            let mut gx = 0.0f32;
            let mut gy = 0.0f32;
            for (j, &yy) in ys.iter().enumerate() {
                for (i, &xx) in xs.iter().enumerate() {
                    let sample = input[(xx, yy)];
                    gx += sample * SOBEL3_X.get(i, j);
                    gy += sample * SOBEL3_Y.get(i, j);
                }
            }

            out[(x, y)] = Mat2s::new(gx * gx, gx * gy, gy * gy);
        }
    }
}

/// Second-order partials `(Hxx, Hxy, Hyy)` per pixel.
///
/// Out-of-range reads contribute nothing (zero border), as required for the
/// ridge measure: the frame boundary must not fake curvature.
pub fn hessian(out: &mut Image<Mat2s<f32>>, input: &Image<f32>) {
    assert_eq!(out.shape(), input.shape(), "hessian shape mismatch");

    let (w, h) = input.shape();
    for y in 0..h {
        for x in 0..w {
            let mut m = Mat2s::default();
            for j in 0..3usize {
                let yy = y as isize + j as isize - 1;
                if yy < 0 || yy >= h as isize {
                    continue;
                }
                for i in 0..3usize {
                    let xx = x as isize + i as isize - 1;
                    if xx < 0 || xx >= w as isize {
                        continue;
                    }
                    let sample = input[(xx as usize, yy as usize)];
                    m.xx += sample * SOBEL3_XX.get(i, j);
                    m.xy += sample * SOBEL3_XY.get(i, j);
                    m.yy += sample * SOBEL3_YY.get(i, j);
                }
            }
            out[(x, y)] = m;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_tensor_of_constant_image_vanishes() {
        let input = Image::filled(6, 5, 0.8f32);
        let mut out = Image::new(6, 5);
        structure_tensor(&mut out, &input);
        for m in out.as_slice() {
            assert_eq!(*m, Mat2s::default());
        }
    }

    #[test]
    fn structure_tensor_eigenvalues_are_non_negative() {
        let mut input = Image::new(8, 8);
        for i in 0..input.len() {
            let (x, y) = input.coords(i);
            input[i] = ((x * 7 + y * 13) % 11) as f32 / 11.0;
        }
        let mut out = Image::new(8, 8);
        structure_tensor(&mut out, &input);
        for m in out.as_slice() {
            let (ew1, ew2) = m.eigenvalues();
            assert!(ew1 >= 0.0);
            assert!(ew2 >= -1e-6);
        }
    }

    #[test]
    fn vertical_edge_yields_x_dominant_tensor() {
        let mut input = Image::new(8, 8);
        for i in 0..input.len() {
            let (x, _) = input.coords(i);
            input[i] = if x < 4 { 0.0 } else { 1.0 };
        }
        let mut out = Image::new(8, 8);
        structure_tensor(&mut out, &input);
        let m = out[(4, 4)];
        assert!(m.xx > 0.0);
        assert!(m.xx > m.yy);
    }

    #[test]
    fn hessian_interior_of_constant_image_vanishes() {
        let input = Image::filled(7, 7, 1.0f32);
        let mut out = Image::new(7, 7);
        hessian(&mut out, &input);
        // Interior taps all land in-range and cancel; the zero border makes
        // frame pixels see a step instead.
        assert_eq!(out[(3, 3)], Mat2s::default());
        assert!(out[(0, 0)].xx != 0.0);
    }

    #[test]
    fn hessian_of_quadratic_ramp_matches_curvature() {
        // f(x, y) = x^2 has fxx = 2, fyy = fxy = 0; the Sobel second
        // derivative carries a smoothing weight of 4 along the other axis.
        let mut input = Image::new(9, 9);
        for i in 0..input.len() {
            let (x, _) = input.coords(i);
            input[i] = (x as f32) * (x as f32);
        }
        let mut out = Image::new(9, 9);
        hessian(&mut out, &input);
        let m = out[(4, 4)];
        assert!((m.xx - 8.0).abs() < 1e-4);
        assert!(m.xy.abs() < 1e-4);
        assert!(m.yy.abs() < 1e-4);
    }
}
