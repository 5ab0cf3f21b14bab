use contact_detector::image::Image;

/// Frame with isotropic Gaussian spots, each `exp(-‖p − c‖² / falloff)`.
pub fn spots_frame(w: usize, h: usize, spots: &[(f32, f32)], falloff: f32) -> Image<f32> {
    let mut img = Image::new(w, h);
    for i in 0..img.len() {
        let (x, y) = img.coords(i);
        let mut v = 0.0f32;
        for &(cx, cy) in spots {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            v += (-(dx * dx + dy * dy) / falloff).exp();
        }
        img[i] = v;
    }
    img
}

/// Frame with a bright vertical stripe spanning columns `x0..=x1`.
pub fn stripe_frame(w: usize, h: usize, x0: usize, x1: usize) -> Image<f32> {
    let mut img = Image::new(w, h);
    for i in 0..img.len() {
        let (x, _) = img.coords(i);
        if (x0..=x1).contains(&x) {
            img[i] = 1.0;
        }
    }
    img
}
