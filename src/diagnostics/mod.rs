//! Diagnostics shared by the detector and the CLI: stage timing.
pub mod perf;

pub use perf::{PerfRegistry, PerfSummary, PerfToken};
