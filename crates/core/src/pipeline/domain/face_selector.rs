use crate::detection::domain::face_capability::FaceCapability;
use crate::detection::domain::reference_set::ReferenceSet;
use crate::shared::error::CensorError;
use crate::shared::face_box::Detection;
use crate::shared::frame::Frame;

use super::censor_mode::CensorMode;

/// Decides which detections in a frame are censor targets.
#[derive(Clone, Debug)]
pub struct FaceSelector {
    mode: CensorMode,
    references: Option<ReferenceSet>,
}

impl FaceSelector {
    /// `references` must be present exactly when the mode needs them.
    pub fn new(mode: CensorMode, references: Option<ReferenceSet>) -> Result<Self, CensorError> {
        match (mode.needs_references(), &references) {
            (false, Some(_)) => Err(CensorError::invalid(
                "reference faces cannot be used with mode 'all'",
            )),
            (true, None) => Err(CensorError::invalid(format!(
                "mode '{mode}' requires at least one reference face"
            ))),
            (true, Some(set)) if set.is_empty() => Err(CensorError::invalid(format!(
                "mode '{mode}' requires at least one reference face"
            ))),
            _ => Ok(Self { mode, references }),
        }
    }

    /// Filters `detections` down to the faces to censor, preserving order.
    ///
    /// `All` returns every detection without encoding anything; the other
    /// modes encode each detection once.
    pub fn select(
        &self,
        capability: &dyn FaceCapability,
        frame: &Frame,
        detections: Vec<Detection>,
    ) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let references = match (&self.references, self.mode) {
            (_, CensorMode::All) | (None, _) => return Ok(detections),
            (Some(references), _) => references,
        };
        let censor_matches = self.mode == CensorMode::One;

        let mut targets = Vec::with_capacity(detections.len());
        for detection in detections {
            let encoding = capability.encode(frame, &detection.face_box)?;
            if references.matches(capability, &encoding) == censor_matches {
                targets.push(detection);
            }
        }
        Ok(targets)
    }
}
