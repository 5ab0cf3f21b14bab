//! Fixed-size convolution kernels.
//!
//! Kernels are odd-sided and centred; `get(i, j)` addresses column `i`, row
//! `j`. Derivative kernels follow the Sobel family used by the detector for
//! gradients (`SOBEL3_X`/`SOBEL3_Y`) and second-order partials
//! (`SOBEL3_XX`/`SOBEL3_YY`/`SOBEL3_XY`).

/// Centred 2-D kernel of weights with compile-time shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kernel<const NX: usize, const NY: usize> {
    weights: [[f32; NX]; NY],
}

impl<const NX: usize, const NY: usize> Kernel<NX, NY> {
    pub const fn new(weights: [[f32; NX]; NY]) -> Self {
        Self { weights }
    }

    /// Weight at column `i`, row `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.weights[j][i]
    }

    /// Sum of all weights.
    pub fn sum(&self) -> f32 {
        self.weights.iter().flatten().sum()
    }

    /// Isotropic Gaussian kernel normalised to unit sum.
    ///
    /// `k[i, j] = exp(-0.5 (r / sigma)^2) / Z` with `r` the distance from the
    /// kernel centre and `Z` the sum over all taps.
    pub fn gaussian(sigma: f32) -> Self {
        assert!(NX % 2 == 1 && NY % 2 == 1, "gaussian kernel must be odd-sided");

        let dx = (NX / 2) as isize;
        let dy = (NY / 2) as isize;

        let mut weights = [[0.0f32; NX]; NY];
        let mut sum = 0.0f32;
        for (j, row) in weights.iter_mut().enumerate() {
            for (i, w) in row.iter_mut().enumerate() {
                let rx = (i as isize - dx) as f32;
                let ry = (j as isize - dy) as f32;
                let r = (rx * rx + ry * ry).sqrt() / sigma;
                let v = (-0.5 * r * r).exp();
                *w = v;
                sum += v;
            }
        }
        for row in &mut weights {
            for w in row {
                *w /= sum;
            }
        }
        Self { weights }
    }
}

/// First derivative along x.
pub const SOBEL3_X: Kernel<3, 3> = Kernel::new([
    [1.0, 0.0, -1.0],
    [2.0, 0.0, -2.0],
    [1.0, 0.0, -1.0],
]);

/// First derivative along y.
pub const SOBEL3_Y: Kernel<3, 3> = Kernel::new([
    [1.0, 2.0, 1.0],
    [0.0, 0.0, 0.0],
    [-1.0, -2.0, -1.0],
]);

/// Second derivative along x.
pub const SOBEL3_XX: Kernel<3, 3> = Kernel::new([
    [1.0, -2.0, 1.0],
    [2.0, -4.0, 2.0],
    [1.0, -2.0, 1.0],
]);

/// Second derivative along y.
pub const SOBEL3_YY: Kernel<3, 3> = Kernel::new([
    [1.0, 2.0, 1.0],
    [-2.0, -4.0, -2.0],
    [1.0, 2.0, 1.0],
]);

/// Mixed second derivative.
pub const SOBEL3_XY: Kernel<3, 3> = Kernel::new([
    [1.0, 0.0, -1.0],
    [0.0, 0.0, 0.0],
    [-1.0, 0.0, 1.0],
]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaussian_kernel_sums_to_one() {
        let k = Kernel::<5, 5>::gaussian(1.0);
        assert!((k.sum() - 1.0).abs() < 1e-6);
        let k = Kernel::<3, 3>::gaussian(0.75);
        assert!((k.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn gaussian_kernel_is_symmetric_and_peaked() {
        let k = Kernel::<5, 5>::gaussian(1.0);
        assert_eq!(k.get(0, 0), k.get(4, 4));
        assert_eq!(k.get(1, 2), k.get(3, 2));
        assert_eq!(k.get(2, 1), k.get(2, 3));
        for j in 0..5 {
            for i in 0..5 {
                assert!(k.get(i, j) <= k.get(2, 2));
            }
        }
    }

    #[test]
    fn derivative_kernels_sum_to_zero() {
        assert_eq!(SOBEL3_X.sum(), 0.0);
        assert_eq!(SOBEL3_Y.sum(), 0.0);
        assert_eq!(SOBEL3_XX.sum(), 0.0);
        assert_eq!(SOBEL3_YY.sum(), 0.0);
        assert_eq!(SOBEL3_XY.sum(), 0.0);
    }
}
