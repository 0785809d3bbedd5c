//! QR decoding of camera frames.
//!
//! This module defines the decoded [`ScanResult`] type, the [`FrameDecoder`]
//! seam the check-in workflow consumes, and [`QrDecoder`], which hands frames
//! to `rqrr`. Camera access lives in [`camera`].

pub mod camera;

use std::fmt::Debug;

use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, trace};

pub use camera::{Camera, CameraProvider, FrameDirectory, FrameDirectoryCamera};

/// A corner of a decoded symbol, in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
}

/// One payload decoded from a frame, plus where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// Decoded text.
    pub text: String,
    /// Corners of the symbol, clockwise from top-left.
    pub polygon: [Point; 4],
}

/// Turns one frame into zero or more decoded payloads.
///
/// Implementations are stateless across calls. A frame that contains nothing
/// decodable yields an empty vector; that is not an error.
pub trait FrameDecoder: Debug + Send {
    /// Decode every readable symbol in `frame`, in a deterministic order.
    fn decode(&self, frame: &DynamicImage) -> Vec<ScanResult>;
}

/// QR decoder backed by `rqrr`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl QrDecoder {
    /// Create a new decoder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FrameDecoder for QrDecoder {
    fn decode(&self, frame: &DynamicImage) -> Vec<ScanResult> {
        let mut prepared = rqrr::PreparedImage::prepare(frame.to_luma8());
        let grids = prepared.detect_grids();
        trace!(candidates = grids.len(), "Detected QR grids");

        let results: Vec<ScanResult> = grids
            .into_iter()
            .filter_map(|grid| match grid.decode() {
                Ok((_meta, text)) => Some(ScanResult {
                    text,
                    polygon: grid.bounds.map(|p| Point { x: p.x, y: p.y }),
                }),
                Err(e) => {
                    trace!(error = %e, "Grid did not decode");
                    None
                }
            })
            .collect();

        if !results.is_empty() {
            debug!(count = results.len(), "Decoded QR payloads");
        }
        results
    }
}
