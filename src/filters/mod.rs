//! Convolution kernels and border-aware convolution.
//!
//! Components
//! - `kernels`: fixed-size centred kernels, Gaussian synthesis, Sobel family.
//! - `conv`: generic convolution with `Extend`/`Zero` border policies and
//!   specialised hot paths for 3×3 and 5×5 extend kernels.
pub mod conv;
pub mod kernels;

pub use conv::{conv, Border, Extend, Zero};
pub use kernels::{Kernel, SOBEL3_X, SOBEL3_XX, SOBEL3_XY, SOBEL3_Y, SOBEL3_YY};
