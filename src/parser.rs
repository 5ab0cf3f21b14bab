//! Heatmap dump parsing.
//!
//! A dump is a sequence of records, each `type: u32` (little endian),
//! `size: u32`, then `size` payload bytes. Two record types matter here:
//! [`RECORD_HEATMAP_DIM`] latches the active frame dimension and intensity
//! range, [`RECORD_HEATMAP`] carries `width · height` raw sensor bytes.
//! Unknown record types are skipped, so dumps may interleave other vendor
//! records freely.
//!
//! Raw bytes decode to `1 − (v − z_min) / (z_max − z_min)`: the sensor
//! reports low values where a finger rests, frames normalise contacts to
//! bright.

use crate::image::Image;
use log::warn;
use std::fs;
use std::path::Path;

/// Frame geometry and intensity range of subsequent heatmap records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeatmapDim {
    pub width: u32,
    pub height: u32,
    pub z_min: u32,
    pub z_max: u32,
}

/// Dimension-descriptor record: four little-endian `u32`s.
pub const RECORD_HEATMAP_DIM: u32 = 0x01;
/// Heatmap payload record: `width · height` intensity bytes.
pub const RECORD_HEATMAP: u32 = 0x02;

/// Callbacks the record stream is demultiplexed into.
pub trait DumpHandler {
    /// Latch the active heatmap dimension.
    fn on_heatmap_dim(&mut self, dim: HeatmapDim);
    /// Consume one heatmap payload.
    fn on_heatmap(&mut self, data: &[u8]);
}

#[inline]
fn read_u32(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

/// Walk the record stream, dispatching known record types to `handler`.
pub fn parse_dump(data: &[u8], handler: &mut dyn DumpHandler) -> Result<(), String> {
    let mut off = 0usize;
    while off < data.len() {
        if data.len() - off < 8 {
            return Err(format!("truncated record header at byte {off}"));
        }
        let ty = read_u32(&data[off..]);
        let size = read_u32(&data[off + 4..]) as usize;
        off += 8;

        if data.len() - off < size {
            return Err(format!(
                "truncated record payload at byte {off}: need {size} bytes"
            ));
        }
        let payload = &data[off..off + size];
        off += size;

        match ty {
            RECORD_HEATMAP_DIM => {
                if size != 16 {
                    return Err(format!(
                        "dimension record has {size} payload bytes, expected 16"
                    ));
                }
                handler.on_heatmap_dim(HeatmapDim {
                    width: read_u32(payload),
                    height: read_u32(&payload[4..]),
                    z_min: read_u32(&payload[8..]),
                    z_max: read_u32(&payload[12..]),
                });
            }
            RECORD_HEATMAP => handler.on_heatmap(payload),
            _ => {}
        }
    }
    Ok(())
}

/// Collects decoded frames from a record stream.
#[derive(Default)]
pub struct HeatmapCollector {
    dim: Option<HeatmapDim>,
    frames: Vec<Image<f32>>,
}

impl HeatmapCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_frames(self) -> Vec<Image<f32>> {
        self.frames
    }
}

impl DumpHandler for HeatmapCollector {
    fn on_heatmap_dim(&mut self, dim: HeatmapDim) {
        self.dim = Some(dim);
    }

    fn on_heatmap(&mut self, data: &[u8]) {
        let Some(dim) = self.dim else {
            warn!("heatmap payload before any dimension record, skipping");
            return;
        };

        let (w, h) = (dim.width as usize, dim.height as usize);
        if data.len() != w * h {
            warn!(
                "heatmap payload of {} bytes does not match {}x{} frame, skipping",
                data.len(),
                w,
                h
            );
            return;
        }
        let range = dim.z_max as f32 - dim.z_min as f32;
        if range <= 0.0 {
            warn!("degenerate intensity range [{}, {}], skipping", dim.z_min, dim.z_max);
            return;
        }

        let mut img = Image::new(w, h);
        for (dst, &v) in img.as_mut_slice().iter_mut().zip(data) {
            *dst = 1.0 - (v as f32 - dim.z_min as f32) / range;
        }
        self.frames.push(img);
    }
}

/// Read a dump file and decode every heatmap it contains.
pub fn load_heatmaps(path: &Path) -> Result<Vec<Image<f32>>, String> {
    let data =
        fs::read(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let mut collector = HeatmapCollector::new();
    parse_dump(&data, &mut collector)?;
    Ok(collector.into_frames())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ty: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&ty.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn dim_record(w: u32, h: u32, z_min: u32, z_max: u32) -> Vec<u8> {
        let mut payload = Vec::new();
        for v in [w, h, z_min, z_max] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        record(RECORD_HEATMAP_DIM, &payload)
    }

    #[test]
    fn decodes_and_inverts_heatmap_bytes() {
        let mut dump = dim_record(2, 2, 0, 200);
        dump.extend(record(RECORD_HEATMAP, &[0, 100, 200, 50]));

        let mut collector = HeatmapCollector::new();
        parse_dump(&dump, &mut collector).unwrap();
        let frames = collector.into_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].shape(), (2, 2));
        assert!((frames[0][0] - 1.0).abs() < 1e-6);
        assert!((frames[0][1] - 0.5).abs() < 1e-6);
        assert!((frames[0][2] - 0.0).abs() < 1e-6);
        assert!((frames[0][3] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn unknown_records_are_skipped() {
        let mut dump = record(0x99, &[1, 2, 3]);
        dump.extend(dim_record(1, 1, 0, 255));
        dump.extend(record(RECORD_HEATMAP, &[255]));

        let mut collector = HeatmapCollector::new();
        parse_dump(&dump, &mut collector).unwrap();
        assert_eq!(collector.into_frames().len(), 1);
    }

    #[test]
    fn truncated_dump_is_an_error() {
        let dump = record(RECORD_HEATMAP, &[0; 16]);
        let mut collector = HeatmapCollector::new();
        assert!(parse_dump(&dump[..10], &mut collector).is_err());
    }

    #[test]
    fn payload_without_dimension_is_dropped() {
        let dump = record(RECORD_HEATMAP, &[0; 4]);
        let mut collector = HeatmapCollector::new();
        parse_dump(&dump, &mut collector).unwrap();
        assert!(collector.into_frames().is_empty());
    }

    #[test]
    fn mismatched_payload_size_is_dropped() {
        let mut dump = dim_record(3, 3, 0, 255);
        dump.extend(record(RECORD_HEATMAP, &[0; 8]));
        let mut collector = HeatmapCollector::new();
        parse_dump(&dump, &mut collector).unwrap();
        assert!(collector.into_frames().is_empty());
    }
}
