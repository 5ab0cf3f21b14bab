//! Pre-allocated scratch buffers shared across frames.
//!
//! Every stage of the pipeline writes into one of these buffers; nothing here
//! is allocated per frame. The Gaussian-fit parameter vector grows on demand
//! but never shrinks or drops a slot, because each slot owns the weight image
//! its window samples into.

use super::options::DetectorOptions;
use crate::distance::QueueItem;
use crate::filters::Kernel;
use crate::gfit::{self, FitParams};
use crate::image::Image;
use crate::math::Mat2s;
use crate::types::ComponentStats;
use nalgebra::Vector2;
use std::collections::BinaryHeap;

pub struct Workspace {
    /// Preprocessed frame: blurred, DC-subtracted.
    pub pp: Image<f32>,
    /// Symmetric-matrix field, raw (structure tensor, then Hessian).
    pub tensor_a: Image<Mat2s<f32>>,
    /// Symmetric-matrix field, blurred.
    pub tensor_b: Image<Mat2s<f32>>,
    /// Structure-tensor eigenvalue pairs.
    pub stev: Image<Vector2<f32>>,
    /// Ridge measure.
    pub rdg: Image<f32>,
    /// Labelling objective.
    pub obj: Image<f32>,
    /// Connected-component labels.
    pub lbl: Image<u16>,
    /// Distance to the included components.
    pub dist_inc: Image<f32>,
    /// Distance to the excluded components.
    pub dist_exc: Image<f32>,
    /// Soft-filtered frame handed to fitting and plotting.
    pub flt: Image<f32>,
    /// Mixture total used by the fit's E-step.
    pub fit_total: Image<f64>,

    pub kern_pp: Kernel<5, 5>,
    pub kern_st: Kernel<5, 5>,
    pub kern_hs: Kernel<5, 5>,

    pub maximas: Vec<usize>,
    pub stats: Vec<ComponentStats>,
    pub scores: Vec<f32>,
    pub queue: BinaryHeap<QueueItem>,
    pub params: Vec<FitParams>,
}

impl Workspace {
    pub fn new(w: usize, h: usize, options: &DetectorOptions) -> Self {
        let mut params = Vec::new();
        gfit::reserve(&mut params, options.fit.initial_slots, options.fit.window);

        Self {
            pp: Image::new(w, h),
            tensor_a: Image::new(w, h),
            tensor_b: Image::new(w, h),
            stev: Image::filled(w, h, Vector2::zeros()),
            rdg: Image::new(w, h),
            obj: Image::new(w, h),
            lbl: Image::new(w, h),
            dist_inc: Image::new(w, h),
            dist_exc: Image::new(w, h),
            flt: Image::new(w, h),
            fit_total: Image::new(w, h),
            kern_pp: Kernel::gaussian(options.blur_sigma),
            kern_st: Kernel::gaussian(options.blur_sigma),
            kern_hs: Kernel::gaussian(options.blur_sigma),
            maximas: Vec::with_capacity(options.fit.initial_slots),
            stats: Vec::new(),
            scores: Vec::new(),
            queue: BinaryHeap::with_capacity(1024),
            params,
        }
    }
}
