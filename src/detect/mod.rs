//! Object detection.
//!
//! Detection is an external capability behind the `Detector` trait: given a
//! frame, a backend returns the set of recognized object labels plus an
//! annotated copy of the frame for display. The model internals are the
//! backend's business; the rest of the system only sees labels and boxes.

mod backend;
mod backends;
mod result;

pub use backend::{share, Detector, SharedDetector};
pub use backends::StubDetector;
pub use result::{DetectedObject, DetectionResult};
