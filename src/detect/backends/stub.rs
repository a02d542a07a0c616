use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::Detector;
use crate::detect::result::{DetectedObject, DetectionResult};
use crate::frame::Frame;

/// Label vocabulary for the stub. Small on purpose; the point is stable,
/// hash-driven picks, not realism.
const STUB_LABELS: &[&str] = &["person", "cup", "laptop", "chair", "phone"];

/// Stub detector for tests and `stub://` demos.
///
/// Deterministic: the frame's pixel hash picks which labels are "seen" and
/// where their boxes land, so the same frame always yields the same result.
/// A frame identical to the previous one yields no detections at all, which
/// mimics a motion-gated model going quiet on a static scene.
pub struct StubDetector {
    last_hash: Option<[u8; 32]>,
}

impl StubDetector {
    pub fn new() -> Self {
        Self { last_hash: None }
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult> {
        let current_hash: [u8; 32] = Sha256::digest(frame.pixels()).into();
        let unchanged = self.last_hash == Some(current_hash);
        self.last_hash = Some(current_hash);

        if unchanged {
            return Ok(DetectionResult::empty(frame));
        }

        let mut objects = Vec::new();
        for (i, label) in STUB_LABELS.iter().enumerate() {
            // One hash byte per label decides presence; more bytes place the box.
            if current_hash[i] % 3 != 0 {
                continue;
            }
            let bx = current_hash[i + 8] as f32 / 512.0;
            let by = current_hash[i + 16] as f32 / 512.0;
            objects.push(DetectedObject {
                x: bx,
                y: by,
                w: 0.25,
                h: 0.25,
                confidence: 0.5 + (current_hash[i + 24] as f32 / 512.0),
                label: label.to_string(),
            });
        }

        Ok(DetectionResult::from_objects(frame, objects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(fill: u8) -> Frame {
        Frame::new(vec![fill; 8 * 8 * 3], 8, 8, fill as u64)
    }

    #[test]
    fn identical_consecutive_frames_yield_no_detections() {
        let mut detector = StubDetector::new();
        let _ = detector.detect(&frame(3)).unwrap();
        let second = detector.detect(&frame(3)).unwrap();
        assert!(second.labels.is_empty());
    }

    #[test]
    fn detections_are_deterministic_per_frame() {
        let mut a = StubDetector::new();
        let mut b = StubDetector::new();
        let ra = a.detect(&frame(9)).unwrap();
        let rb = b.detect(&frame(9)).unwrap();
        assert_eq!(ra.labels, rb.labels);
    }

    #[test]
    fn labels_are_unique() {
        let mut detector = StubDetector::new();
        let result = detector.detect(&frame(1)).unwrap();
        let mut deduped = result.labels.clone();
        deduped.dedup();
        assert_eq!(deduped, result.labels);
    }
}
