//! Small fixed-size math types used in the pipeline's hot loops.
//!
//! The only custom type is [`Mat2s`], a symmetric 2×2 matrix stored as its
//! three distinct entries with closed-form eigen decomposition. Everything
//! else (2-D points, the 6×6 normal-equations system of the Gaussian fit)
//! comes from `nalgebra`.

use nalgebra::{RealField, Vector2};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Sub};

pub use nalgebra::{Matrix6, Vector6};

/// Symmetric 2×2 matrix stored as `(xx, xy, yy)`.
///
/// Used for structure-tensor and Hessian fields (one entry per pixel) and for
/// the precision matrices of fitted Gaussians. All operations are closed-form
/// and allocation-free.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mat2s<T> {
    pub xx: T,
    pub xy: T,
    pub yy: T,
}

impl<T: RealField + Copy> Mat2s<T> {
    #[inline]
    pub fn new(xx: T, xy: T, yy: T) -> Self {
        Self { xx, xy, yy }
    }

    /// Identity matrix.
    #[inline]
    pub fn identity() -> Self {
        Self::new(nalgebra::one(), nalgebra::zero(), nalgebra::one())
    }

    #[inline]
    pub fn det(&self) -> T {
        self.xx * self.yy - self.xy * self.xy
    }

    #[inline]
    pub fn trace(&self) -> T {
        self.xx + self.yy
    }

    /// Inverse, or `None` when the determinant vanishes.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.det();
        if det == nalgebra::zero() {
            return None;
        }
        Some(Self::new(self.yy / det, -self.xy / det, self.xx / det))
    }

    /// Eigenvalues in descending order.
    ///
    /// For a symmetric matrix the discriminant `((xx − yy)/2)² + xy²` is
    /// non-negative, so both values are always real.
    #[inline]
    pub fn eigenvalues(&self) -> (T, T) {
        let half: T = nalgebra::convert(0.5);
        let mean = (self.xx + self.yy) * half;
        let d = (self.xx - self.yy) * half;
        let s = (d * d + self.xy * self.xy).sqrt();
        (mean + s, mean - s)
    }

    /// Eigenvalue/eigenvector pairs, eigenvalue-descending, unit vectors.
    ///
    /// Solves `(M − λI) v = 0` per eigenvalue; when `xy ≈ 0` the matrix is
    /// already diagonal and the axes are returned directly, ordered by the
    /// diagonal entries.
    pub fn eigenvectors(&self) -> [(T, Vector2<T>); 2] {
        let (ew1, ew2) = self.eigenvalues();
        let eps: T = nalgebra::convert(1e-12);

        if self.xy.abs() <= eps {
            let ex = Vector2::new(nalgebra::one(), nalgebra::zero());
            let ey = Vector2::new(nalgebra::zero(), nalgebra::one());
            return if self.xx >= self.yy {
                [(ew1, ex), (ew2, ey)]
            } else {
                [(ew1, ey), (ew2, ex)]
            };
        }

        [(ew1, self.eigenvector_for(ew1)), (ew2, self.eigenvector_for(ew2))]
    }

    fn eigenvector_for(&self, ew: T) -> Vector2<T> {
        // Null vector of (M - ew*I): orthogonal to whichever row is better
        // conditioned.
        let a = Vector2::new(self.xy, ew - self.xx);
        let b = Vector2::new(ew - self.yy, self.xy);
        let v = if a.norm_squared() >= b.norm_squared() {
            a
        } else {
            b
        };
        let n = v.norm();
        if n == nalgebra::zero() {
            Vector2::new(nalgebra::one(), nalgebra::zero())
        } else {
            v / n
        }
    }

    /// Quadratic form `vᵀ M v`.
    #[inline]
    pub fn xtmx(&self, v: &Vector2<T>) -> T {
        let two: T = nalgebra::convert(2.0);
        self.xx * v.x * v.x + two * self.xy * v.x * v.y + self.yy * v.y * v.y
    }
}

impl<T: RealField + Copy> Add for Mat2s<T> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.xx + rhs.xx, self.xy + rhs.xy, self.yy + rhs.yy)
    }
}

impl<T: RealField + Copy> AddAssign for Mat2s<T> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.xx += rhs.xx;
        self.xy += rhs.xy;
        self.yy += rhs.yy;
    }
}

impl<T: RealField + Copy> Sub for Mat2s<T> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.xx - rhs.xx, self.xy - rhs.xy, self.yy - rhs.yy)
    }
}

impl<T: RealField + Copy> Mul<T> for Mat2s<T> {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: T) -> Self {
        Self::new(self.xx * rhs, self.xy * rhs, self.yy * rhs)
    }
}
