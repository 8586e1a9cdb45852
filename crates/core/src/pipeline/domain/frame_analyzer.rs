use std::sync::Arc;

use crate::detection::domain::detection_model::DetectionModel;
use crate::detection::domain::face_capability::FaceCapability;
use crate::shared::face_box::Detection;
use crate::shared::frame::Frame;

use super::face_selector::FaceSelector;

/// Detects faces in a frame and picks the ones to censor.
pub struct FrameAnalyzer {
    capability: Arc<dyn FaceCapability>,
    model: DetectionModel,
    upsample: u32,
    selector: FaceSelector,
}

impl FrameAnalyzer {
    pub fn new(
        capability: Arc<dyn FaceCapability>,
        model: DetectionModel,
        upsample: u32,
        selector: FaceSelector,
    ) -> Self {
        Self {
            capability,
            model,
            upsample,
            selector,
        }
    }

    pub fn analyze(&self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let detections = self
            .capability
            .detect(frame, self.model, self.upsample)?
            .into_iter()
            .filter(|b| b.clip(frame.width(), frame.height()).is_some())
            .map(|b| Detection::new(b, frame.index()))
            .collect();
        self.selector.select(&*self.capability, frame, detections)
    }
}
