//! Frame types and the shared last-frame slot.
//!
//! - `Frame`: one captured RGB raster, superseded every display tick.
//! - `FrameStore`: the hand-off buffer between the display loop (the only
//!   writer) and the description controller (a reader that takes snapshots).
//!
//! The original hand-off was a JPEG file on disk overwritten every tick; an
//! in-memory slot keeps the same contract without touching the filesystem.

use anyhow::{Context, Result};
use std::io::Cursor;
use std::sync::{Arc, RwLock};

/// One captured RGB8 raster image.
///
/// `seq` is a monotonically increasing capture sequence number assigned by the
/// source. It lets readers tell a fresh snapshot from a stale one.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub seq: u64,
}

impl Frame {
    /// Create a frame from raw RGB8 pixel data. Called by capture sources.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, seq: u64) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 3) as usize);
        Self {
            pixels,
            width,
            height,
            seq,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Encode the frame as a JPEG still for the description payload.
    pub fn encode_jpeg(&self) -> Result<Vec<u8>> {
        let buffer = image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .context("frame dimensions do not match pixel buffer")?;
        let mut jpeg = Cursor::new(Vec::new());
        buffer
            .write_to(&mut jpeg, image::ImageFormat::Jpeg)
            .context("encode frame as jpeg")?;
        Ok(jpeg.into_inner())
    }
}

/// Shared slot holding the most recently captured frame.
///
/// Single-writer/multi-reader contract: only the display loop calls
/// `publish`; the controller (and status reporting) only call `snapshot`,
/// which clones the latest frame out of the lock. Readers never mutate the
/// stored frame.
#[derive(Clone, Default)]
pub struct FrameStore {
    slot: Arc<RwLock<Option<Frame>>>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored frame. Display-loop side only.
    pub fn publish(&self, frame: Frame) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(frame);
    }

    /// Clone out the latest frame, if any frame has been captured yet.
    pub fn snapshot(&self) -> Option<Frame> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.clone()
    }

    /// Sequence number of the stored frame, for status reporting.
    pub fn latest_seq(&self) -> Option<u64> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().map(|frame| frame.seq)
    }
}
