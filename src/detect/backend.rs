use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::detect::result::DetectionResult;
use crate::frame::Frame;

/// Detector backend trait.
///
/// Implementations must treat the frame as read-only; annotation happens on a
/// copy inside `DetectionResult`. Backends may keep state across calls (e.g.
/// previous-frame hashes), which is why `detect` takes `&mut self`.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult>;

    /// Optional warm-up hook (model loading, first-inference cost).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Detector shared between the display loop and the controller.
///
/// Wrapped in `Mutex` because `detect` takes `&mut self`; the two sides never
/// hold the lock across a blocking call.
pub type SharedDetector = Arc<Mutex<dyn Detector>>;

/// Wrap a backend for shared use.
pub fn share<D: Detector + 'static>(backend: D) -> SharedDetector {
    Arc::new(Mutex::new(backend))
}
