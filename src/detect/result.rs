use std::collections::BTreeSet;

use crate::frame::Frame;

/// One detected object in normalized 0..1 frame coordinates.
#[derive(Clone, Debug)]
pub struct DetectedObject {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub confidence: f32,
    pub label: String,
}

/// Result of running detection on one frame.
///
/// `labels` holds the unique object class names (raw duplicate detections
/// collapsed, sorted). `annotated` is a copy of the input frame with box
/// outlines drawn, ready for display. Neither is persisted anywhere.
#[derive(Clone, Debug)]
pub struct DetectionResult {
    pub labels: Vec<String>,
    pub objects: Vec<DetectedObject>,
    pub annotated: Frame,
}

impl DetectionResult {
    /// Build a result from raw detections: collapse duplicate labels and draw
    /// box outlines on a copy of the frame.
    pub fn from_objects(frame: &Frame, objects: Vec<DetectedObject>) -> Self {
        let labels: BTreeSet<String> = objects.iter().map(|o| o.label.clone()).collect();
        let mut annotated = frame.clone();
        for object in &objects {
            draw_box_outline(&mut annotated, object);
        }
        Self {
            labels: labels.into_iter().collect(),
            objects,
            annotated,
        }
    }

    /// An empty result: nothing detected, annotated frame is a plain copy.
    pub fn empty(frame: &Frame) -> Self {
        Self {
            labels: Vec::new(),
            objects: Vec::new(),
            annotated: frame.clone(),
        }
    }
}

const OUTLINE_RGB: [u8; 3] = [0x00, 0xE0, 0x40];

fn draw_box_outline(frame: &mut Frame, object: &DetectedObject) {
    let width = frame.width as i64;
    let height = frame.height as i64;
    let x0 = ((object.x * width as f32) as i64).clamp(0, width - 1);
    let y0 = ((object.y * height as f32) as i64).clamp(0, height - 1);
    let x1 = (((object.x + object.w) * width as f32) as i64).clamp(0, width - 1);
    let y1 = (((object.y + object.h) * height as f32) as i64).clamp(0, height - 1);

    for x in x0..=x1 {
        put_pixel(frame, x, y0);
        put_pixel(frame, x, y1);
    }
    for y in y0..=y1 {
        put_pixel(frame, x0, y);
        put_pixel(frame, x1, y);
    }
}

fn put_pixel(frame: &mut Frame, x: i64, y: i64) {
    let width = frame.width as i64;
    let offset = ((y * width + x) * 3) as usize;
    let pixels = frame.pixels_mut();
    if offset + 2 < pixels.len() {
        pixels[offset..offset + 3].copy_from_slice(&OUTLINE_RGB);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::new(vec![0u8; 16 * 16 * 3], 16, 16, 1)
    }

    fn object(label: &str) -> DetectedObject {
        DetectedObject {
            x: 0.25,
            y: 0.25,
            w: 0.5,
            h: 0.5,
            confidence: 0.9,
            label: label.to_string(),
        }
    }

    #[test]
    fn duplicate_labels_are_collapsed_and_sorted() {
        let result = DetectionResult::from_objects(
            &frame(),
            vec![object("laptop"), object("cup"), object("cup")],
        );
        assert_eq!(result.labels, vec!["cup", "laptop"]);
        assert_eq!(result.objects.len(), 3);
    }

    #[test]
    fn annotation_marks_the_frame_copy_only() {
        let original = frame();
        let result = DetectionResult::from_objects(&original, vec![object("cup")]);
        assert!(original.pixels().iter().all(|&p| p == 0));
        assert!(result.annotated.pixels().iter().any(|&p| p != 0));
    }

    #[test]
    fn empty_result_has_no_labels() {
        let result = DetectionResult::empty(&frame());
        assert!(result.labels.is_empty());
        assert_eq!(result.annotated.pixels(), frame().pixels());
    }
}
