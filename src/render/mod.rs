//! Frame rendering: colormapped heatmap with fitted-contact overlay.
//!
//! The filtered frame is colormapped (viridis over `[0, 0.3]`), upscaled
//! nearest-neighbour to the output size, and every valid contact is drawn in
//! red: a cross spanning its cell plus the two covariance eigen-axes scaled
//! by `1.5·√λ`. The y axis is flipped so the sensor origin ends up at the
//! bottom of the picture.

pub mod cmap;

use crate::image::Image;
use crate::types::Contact;
use image::{Rgb, RgbImage};
use std::path::Path;

/// Output raster size.
pub const RENDER_WIDTH: u32 = 900;
pub const RENDER_HEIGHT: u32 = 600;

const OVERLAY: Rgb<u8> = Rgb([255, 0, 0]);

/// Render one frame and its contacts to a PNG file.
pub fn render_frame(frame: &Image<f32>, contacts: &[Contact], path: &Path) -> Result<(), String> {
    let (w, h) = frame.shape();
    if w == 0 || h == 0 {
        return Err("cannot render an empty frame".to_string());
    }

    let mut out = RgbImage::new(RENDER_WIDTH, RENDER_HEIGHT);
    for py in 0..RENDER_HEIGHT {
        // Flip: picture row 0 shows the top, i.e. the last sensor row.
        let sy = h - 1 - (py as usize * h / RENDER_HEIGHT as usize);
        for px in 0..RENDER_WIDTH {
            let sx = px as usize * w / RENDER_WIDTH as usize;
            let rgb = cmap::map_value(frame[(sx, sy)], (0.0, 0.3));
            out.put_pixel(px, py, Rgb(rgb));
        }
    }

    let sx = RENDER_WIDTH as f64 / w as f64;
    let sy = RENDER_HEIGHT as f64 / h as f64;
    let flip = |y: f64| RENDER_HEIGHT as f64 - y;

    for c in contacts {
        let Some(cov) = c.prec.inverse() else {
            continue;
        };

        let (mx, my) = (c.mean.x, c.mean.y);

        // cross spanning the centre cell
        draw_line(
            &mut out,
            ((mx + 0.1) * sx, flip((my + 0.5) * sy)),
            ((mx + 0.9) * sx, flip((my + 0.5) * sy)),
        );
        draw_line(
            &mut out,
            ((mx + 0.5) * sx, flip((my + 0.1) * sy)),
            ((mx + 0.5) * sx, flip((my + 0.9) * sy)),
        );

        // covariance eigen-axes
        for (ew, v) in cov.eigenvectors() {
            let s = 1.5 * ew.max(0.0).sqrt();
            draw_line(
                &mut out,
                ((mx + 0.5) * sx, flip((my + 0.5) * sy)),
                ((mx + 0.5 + v.x * s) * sx, flip((my + 0.5 + v.y * s) * sy)),
            );
        }
    }

    out.save(path)
        .map_err(|e| format!("Failed to save {}: {e}", path.display()))
}

/// Plain DDA line draw, clipped to the image.
fn draw_line(img: &mut RgbImage, from: (f64, f64), to: (f64, f64)) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0);

    for k in 0..=steps as usize {
        let t = k as f64 / steps;
        let x = from.0 + dx * t;
        let y = from.1 + dy * t;
        if x < 0.0 || y < 0.0 {
            continue;
        }
        let (px, py) = (x as u32, y as u32);
        if px < img.width() && py < img.height() {
            img.put_pixel(px, py, OVERLAY);
        }
    }
}
