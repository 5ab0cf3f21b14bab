//! Strict local maxima over the 8-neighbourhood.

use crate::image::Image;

/// Append the linear index of every strict local maximum to `out`.
///
/// A pixel qualifies when its value is at least `threshold` and strictly
/// greater than each of its existing 8-neighbours; neighbours outside the
/// image do not participate, so boundary pixels simply have fewer values to
/// beat.
pub fn find_local_maximas(img: &Image<f32>, threshold: f32, out: &mut Vec<usize>) {
    let (w, h) = img.shape();

    for y in 0..h {
        for x in 0..w {
            let v = img[(x, y)];
            if v < threshold {
                continue;
            }

            let x0 = x.saturating_sub(1);
            let x1 = (x + 1).min(w.saturating_sub(1));
            let y0 = y.saturating_sub(1);
            let y1 = (y + 1).min(h.saturating_sub(1));

            let mut is_max = true;
            'scan: for ny in y0..=y1 {
                for nx in x0..=x1 {
                    if (nx, ny) == (x, y) {
                        continue;
                    }
                    if img[(nx, ny)] >= v {
                        is_max = false;
                        break 'scan;
                    }
                }
            }

            if is_max {
                out.push(y * w + x);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_peak_is_found() {
        let mut img = Image::new(5, 5);
        img[(2, 2)] = 1.0;
        img[(1, 2)] = 0.5;
        let mut out = Vec::new();
        find_local_maximas(&img, 0.1, &mut out);
        assert_eq!(out, vec![2 * 5 + 2]);
    }

    #[test]
    fn threshold_suppresses_small_peaks() {
        let mut img = Image::new(5, 5);
        img[(2, 2)] = 0.04;
        let mut out = Vec::new();
        find_local_maximas(&img, 0.05, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn plateaus_are_not_maxima() {
        let mut img = Image::new(5, 5);
        img[(2, 2)] = 1.0;
        img[(3, 2)] = 1.0;
        let mut out = Vec::new();
        find_local_maximas(&img, 0.1, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn boundary_peak_only_beats_existing_neighbours() {
        let mut img = Image::new(4, 4);
        img[(0, 0)] = 1.0;
        img[(1, 0)] = 0.2;
        img[(0, 1)] = 0.2;
        img[(1, 1)] = 0.2;
        let mut out = Vec::new();
        find_local_maximas(&img, 0.1, &mut out);
        assert_eq!(out, vec![0]);
    }

    #[test]
    fn results_are_appended_in_scan_order() {
        let mut img = Image::new(7, 3);
        img[(1, 1)] = 1.0;
        img[(5, 1)] = 2.0;
        let mut out = vec![42];
        find_local_maximas(&img, 0.5, &mut out);
        assert_eq!(out, vec![42, 7 + 1, 7 + 5]);
    }
}
