//! Synthetic frame source for tests and demos.

use anyhow::Result;

use super::FrameSource;
use crate::frame::Frame;

const STUB_WIDTH: u32 = 320;
const STUB_HEIGHT: u32 = 240;

/// Deterministic moving-gradient source backing `stub://` capture URLs.
///
/// The scene shifts every frame so downstream change heuristics have
/// something to chew on, and jumps every 50 frames to simulate an object
/// entering the view.
pub struct SyntheticSource {
    label: String,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(label: String) -> Self {
        Self {
            label,
            frame_count: 0,
            scene_state: 0,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("capture: connected to stub://{} (synthetic)", self.label);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let pixel_count = (STUB_WIDTH * STUB_HEIGHT * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }

        Ok(Frame::new(pixels, STUB_WIDTH, STUB_HEIGHT, self.frame_count))
    }

    fn is_healthy(&self) -> bool {
        true
    }
}
