//! Per-frame detection pipeline.
//!
//! [`TouchDetector`] owns every buffer the pipeline touches and runs the
//! stages in strict order: preprocessing, structure tensor and its
//! eigenvalues, Hessian and ridge measure, labelling objective, coarse
//! maxima, connected components, component scoring, the two weighted
//! distance transforms, the soft filter, fine maxima, and Gaussian fitting.
//! Each stage is timed into the perf registry.
//!
//! Typical usage:
//! ```no_run
//! use contact_detector::{DetectorOptions, TouchDetector};
//! use contact_detector::image::Image;
//!
//! # fn example(frame: Image<f32>) {
//! let mut detector = TouchDetector::new(72, 48, DetectorOptions::default());
//! detector.process(&frame);
//! for contact in detector.contacts() {
//!     println!("contact at ({:.2}, {:.2})", contact.mean.x, contact.mean.y);
//! }
//! # }
//! ```

use super::options::DetectorOptions;
use super::workspace::Workspace;
use crate::diagnostics::{PerfRegistry, PerfToken};
use crate::distance::weighted_distance_transform;
use crate::filters::{conv, Extend};
use crate::gfit::{self, WindowBounds};
use crate::image::Image;
use crate::label::label;
use crate::maxima::find_local_maximas;
use crate::tensor::{hessian, structure_tensor};
use crate::types::{ComponentStats, Contact};
use log::debug;
use nalgebra::Vector2;
use std::time::Instant;

struct StageTokens {
    total: PerfToken,
    preprocess: PerfToken,
    structure_tensor: PerfToken,
    st_eigenvalues: PerfToken,
    hessian: PerfToken,
    ridge: PerfToken,
    objective: PerfToken,
    objective_maximas: PerfToken,
    labels: PerfToken,
    component_score: PerfToken,
    distance_transform: PerfToken,
    filter: PerfToken,
    filter_maximas: PerfToken,
    gaussian_fitting: PerfToken,
}

impl StageTokens {
    fn register(perf: &mut PerfRegistry) -> Self {
        Self {
            total: perf.create_entry("total"),
            preprocess: perf.create_entry("preprocessing"),
            structure_tensor: perf.create_entry("structure-tensor"),
            st_eigenvalues: perf.create_entry("structure-tensor.eigenvalues"),
            hessian: perf.create_entry("hessian"),
            ridge: perf.create_entry("ridge"),
            objective: perf.create_entry("objective"),
            objective_maximas: perf.create_entry("objective.maximas"),
            labels: perf.create_entry("labels"),
            component_score: perf.create_entry("component-score"),
            distance_transform: perf.create_entry("distance-transform"),
            filter: perf.create_entry("filter"),
            filter_maximas: perf.create_entry("filter.maximas"),
            gaussian_fitting: perf.create_entry("gaussian-fitting"),
        }
    }
}

/// Touch-contact detector with frame-persistent working memory.
pub struct TouchDetector {
    options: DetectorOptions,
    ws: Workspace,
    perf: PerfRegistry,
    tokens: StageTokens,
    num_labels: u16,
}

impl TouchDetector {
    /// Create a detector for frames of the given shape. All working memory is
    /// allocated here; `process` never allocates.
    pub fn new(width: usize, height: usize, options: DetectorOptions) -> Self {
        let mut perf = PerfRegistry::new();
        let tokens = StageTokens::register(&mut perf);
        let ws = Workspace::new(width, height, &options);
        Self {
            options,
            ws,
            perf,
            tokens,
            num_labels: 0,
        }
    }

    /// Run the pipeline on one frame. Results stay valid until the next call.
    pub fn process(&mut self, heatmap: &Image<f32>) {
        assert_eq!(
            heatmap.shape(),
            self.ws.pp.shape(),
            "heatmap shape mismatch"
        );

        let opts = &self.options;
        let ws = &mut self.ws;
        let frame_start = Instant::now();

        // preprocessing: blur, then strip the DC level
        let t = Instant::now();
        conv::<Extend, _, 5, 5>(&mut ws.pp, heatmap, &ws.kern_pp);
        let dc = average(&ws.pp);
        sub0(&mut ws.pp, dc);
        self.perf.add(self.tokens.preprocess, t.elapsed());

        // structure tensor
        let t = Instant::now();
        structure_tensor(&mut ws.tensor_a, &ws.pp);
        conv::<Extend, _, 5, 5>(&mut ws.tensor_b, &ws.tensor_a, &ws.kern_st);
        self.perf.add(self.tokens.structure_tensor, t.elapsed());

        // structure-tensor eigenvalues
        let t = Instant::now();
        for (dst, m) in ws.stev.as_mut_slice().iter_mut().zip(ws.tensor_b.as_slice()) {
            let (ew1, ew2) = m.eigenvalues();
            *dst = Vector2::new(ew1, ew2);
        }
        self.perf.add(self.tokens.st_eigenvalues, t.elapsed());

        // hessian
        let t = Instant::now();
        hessian(&mut ws.tensor_a, &ws.pp);
        conv::<Extend, _, 5, 5>(&mut ws.tensor_b, &ws.tensor_a, &ws.kern_hs);
        self.perf.add(self.tokens.hessian, t.elapsed());

        // ridge measure: positive curvature mass
        let t = Instant::now();
        for (dst, m) in ws.rdg.as_mut_slice().iter_mut().zip(ws.tensor_b.as_slice()) {
            let (ew1, ew2) = m.eigenvalues();
            *dst = ew1.max(0.0) + ew2.max(0.0);
        }
        self.perf.add(self.tokens.ridge, t.elapsed());

        // objective for labelling
        let t = Instant::now();
        for i in 0..ws.obj.len() {
            ws.obj[i] = opts.heatmap_weight * ws.pp[i] - opts.ridge_weight * ws.rdg[i];
        }
        self.perf.add(self.tokens.objective, t.elapsed());

        // coarse local maxima
        let t = Instant::now();
        ws.maximas.clear();
        find_local_maximas(&ws.pp, opts.maxima_threshold, &mut ws.maximas);
        self.perf.add(self.tokens.objective_maximas, t.elapsed());

        // connected components
        let t = Instant::now();
        self.num_labels = label::<4>(&mut ws.lbl, &ws.obj, 0.0);
        self.perf.add(self.tokens.labels, t.elapsed());

        // component score
        let t = Instant::now();
        ws.stats.clear();
        ws.stats
            .resize(self.num_labels as usize, ComponentStats::default());
        for i in 0..ws.lbl.len() {
            let l = ws.lbl[i];
            if l == 0 {
                continue;
            }
            let ev = ws.stev[i];
            let sum = ev.x + ev.y;
            let coherence = if sum != 0.0 { (ev.x - ev.y) / sum } else { 1.0 };

            let stats = &mut ws.stats[l as usize - 1];
            stats.size += 1;
            stats.volume += ws.pp[i];
            stats.incoherence += 1.0 - coherence * coherence;
        }
        for &m in &ws.maximas {
            let l = ws.lbl[m];
            if l > 0 {
                ws.stats[l as usize - 1].maximas += 1;
            }
        }
        ws.scores.clear();
        for stats in &ws.stats {
            let v = 100.0 * (stats.incoherence / (stats.size as f32 * stats.size as f32))
                * if stats.maximas > 0 {
                    1.0 / stats.maximas as f32
                } else {
                    0.0
                };
            ws.scores.push(v / (1.0 + v));
        }
        self.perf.add(self.tokens.component_score, t.elapsed());

        // weighted distance transforms, one per seed class
        let t = Instant::now();
        {
            let th_inc = opts.inclusion_threshold;
            let d = opts.distance;
            let (stev, rdg, pp, lbl, scores) =
                (&ws.stev, &ws.rdg, &ws.pp, &ws.lbl, &ws.scores);

            let cost = |i: usize, step: (i32, i32)| -> f32 {
                let ev = stev[i];
                let grad = ev.x.max(0.0) + ev.y.max(0.0);
                let dist = ((step.0 * step.0 + step.1 * step.1) as f32).sqrt();
                d.ridge_cost * rdg[i] + d.gradient_cost * grad + d.step_cost * dist
            };
            let mask = |i: usize| pp[i] > 0.0 && lbl[i] == 0;
            let included = |i: usize| lbl[i] > 0 && scores[lbl[i] as usize - 1] > th_inc;
            let excluded = |i: usize| lbl[i] > 0 && scores[lbl[i] as usize - 1] <= th_inc;

            weighted_distance_transform(
                &mut ws.dist_inc,
                included,
                &mask,
                &cost,
                &mut ws.queue,
                d.limit,
            );
            weighted_distance_transform(
                &mut ws.dist_exc,
                excluded,
                &mask,
                &cost,
                &mut ws.queue,
                d.limit,
            );
        }
        self.perf.add(self.tokens.distance_transform, t.elapsed());

        // soft filter: blend by proximity to included vs. excluded seeds
        let t = Instant::now();
        let sigma = opts.filter_sigma;
        for i in 0..ws.flt.len() {
            let v_inc = ws.dist_inc[i] / sigma;
            let w_inc = (-v_inc * v_inc).exp();
            let v_exc = ws.dist_exc[i] / sigma;
            let w_exc = (-v_exc * v_exc).exp();

            let w_total = w_inc + w_exc;
            let w = if w_total > 0.0 { w_inc / w_total } else { 0.0 };
            ws.flt[i] = ws.pp[i] * w;
        }
        self.perf.add(self.tokens.filter, t.elapsed());

        // fine local maxima
        let t = Instant::now();
        ws.maximas.clear();
        find_local_maximas(&ws.flt, opts.maxima_threshold, &mut ws.maximas);
        self.perf.add(self.tokens.filter_maximas, t.elapsed());

        // gaussian fitting, one slot per fine maximum
        let t = Instant::now();
        gfit::reserve(&mut ws.params, ws.maximas.len(), opts.fit.window);

        let (w, h) = ws.pp.shape();
        let (wx, wy) = opts.fit.window;
        for (slot, &m) in ws.params.iter_mut().zip(&ws.maximas) {
            let (x, y) = (m % w, m / w);
            slot.valid = true;
            slot.scale = 1.0;
            slot.mean = Vector2::new(x as f64, y as f64);
            slot.prec = crate::math::Mat2s::identity();
            slot.bounds = WindowBounds {
                xmin: x.saturating_sub((wx - 1) / 2),
                xmax: (x + (wx - 1) / 2).min(w - 1),
                ymin: y.saturating_sub((wy - 1) / 2),
                ymax: (y + (wy - 1) / 2).min(h - 1),
            };
        }
        gfit::fit(&mut ws.params, &ws.flt, &mut ws.fit_total, opts.fit.iterations);
        self.perf.add(self.tokens.gaussian_fitting, t.elapsed());

        self.perf.add(self.tokens.total, frame_start.elapsed());

        debug!(
            "frame done: labels={} fine_maxima={} contacts={}",
            self.num_labels,
            self.ws.maximas.len(),
            self.contacts().count()
        );
    }

    /// Soft-filtered frame, the image contacts are fitted to.
    pub fn filtered(&self) -> &Image<f32> {
        &self.ws.flt
    }

    /// Preprocessed frame (blurred, DC-subtracted).
    pub fn preprocessed(&self) -> &Image<f32> {
        &self.ws.pp
    }

    /// Ridge measure of the last frame.
    pub fn ridge(&self) -> &Image<f32> {
        &self.ws.rdg
    }

    /// Labelling objective of the last frame.
    pub fn objective(&self) -> &Image<f32> {
        &self.ws.obj
    }

    /// Component labels of the last frame (0 = background).
    pub fn labels(&self) -> &Image<u16> {
        &self.ws.lbl
    }

    pub fn num_labels(&self) -> u16 {
        self.num_labels
    }

    /// Scores per label, each in `[0, 1)`.
    pub fn component_scores(&self) -> &[f32] {
        &self.ws.scores
    }

    /// Valid fitted contacts of the last frame.
    pub fn contacts(&self) -> impl Iterator<Item = Contact> + '_ {
        self.ws
            .params
            .iter()
            .filter(|p| p.valid)
            .map(|p| Contact {
                mean: p.mean,
                prec: p.prec,
            })
    }

    /// Aggregated per-stage timings over all processed frames.
    pub fn perf(&self) -> &PerfRegistry {
        &self.perf
    }

    pub fn options(&self) -> &DetectorOptions {
        &self.options
    }
}

/// Mean intensity of a frame.
fn average(img: &Image<f32>) -> f32 {
    if img.is_empty() {
        return 0.0;
    }
    img.as_slice().iter().sum::<f32>() / img.len() as f32
}

/// Subtract `value` from every pixel, saturating at zero.
fn sub0(img: &mut Image<f32>, value: f32) {
    for v in img.as_mut_slice() {
        *v = (*v - value).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_and_sub0() {
        let mut img = Image::new(2, 2);
        img[0] = 1.0;
        img[1] = 0.5;
        assert!((average(&img) - 0.375).abs() < 1e-6);

        sub0(&mut img, 0.6);
        assert!((img[0] - 0.4).abs() < 1e-6);
        assert_eq!(img[1], 0.0);
        assert_eq!(img[2], 0.0);
    }

    #[test]
    fn component_scores_stay_in_unit_range() {
        let mut detector = TouchDetector::new(16, 16, DetectorOptions::default());
        let mut frame = Image::new(16, 16);
        for i in 0..frame.len() {
            let (x, y) = frame.coords(i);
            let dx = x as f32 - 7.4;
            let dy = y as f32 - 7.6;
            frame[i] = (-(dx * dx + dy * dy) / 8.0).exp();
        }
        detector.process(&frame);
        for &s in detector.component_scores() {
            assert!((0.0..1.0).contains(&s));
        }
    }
}
