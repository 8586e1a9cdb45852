use std::path::PathBuf;

use crate::shared::error::CensorError;
use crate::shared::frame::Frame;

use super::detection_model::DetectionModel;
use super::face_capability::FaceCapability;
use super::face_encoding::FaceEncoding;

/// A decoded reference image together with where it came from.
#[derive(Clone, Debug)]
pub struct ReferenceImage {
    pub path: PathBuf,
    pub frame: Frame,
}

/// Encodings of the caller-supplied reference faces, one per image.
///
/// Built once per job and owned by it; dropped with the job's pipeline.
#[derive(Clone, Debug)]
pub struct ReferenceSet {
    encodings: Vec<FaceEncoding>,
    threshold: f64,
}

impl ReferenceSet {
    /// Reduces every image to exactly one encoding: the first face the
    /// capability detects. Any image without a face fails the whole set.
    pub fn build(
        capability: &dyn FaceCapability,
        images: &[ReferenceImage],
        model: DetectionModel,
        upsample: u32,
    ) -> Result<Self, CensorError> {
        let mut encodings = Vec::with_capacity(images.len());
        for image in images {
            let unreadable = |e: Box<dyn std::error::Error>| CensorError::UnreadableReference {
                path: image.path.clone(),
                reason: e.to_string(),
            };
            let boxes = capability
                .detect(&image.frame, model, upsample)
                .map_err(unreadable)?;
            let first = boxes.first().ok_or_else(|| CensorError::NoReferenceFace {
                path: image.path.clone(),
            })?;
            if boxes.len() > 1 {
                log::debug!(
                    "Reference {} has {} faces, using the first",
                    image.path.display(),
                    boxes.len()
                );
            }
            encodings.push(capability.encode(&image.frame, first).map_err(unreadable)?);
        }
        log::info!("Built reference set from {} image(s)", encodings.len());
        Ok(Self {
            encodings,
            threshold: capability.match_threshold(),
        })
    }

    pub fn from_encodings(encodings: Vec<FaceEncoding>, threshold: f64) -> Self {
        Self {
            encodings,
            threshold,
        }
    }

    /// True when `encoding` lies strictly closer than the threshold to at
    /// least one reference face.
    pub fn matches(&self, capability: &dyn FaceCapability, encoding: &FaceEncoding) -> bool {
        self.encodings
            .iter()
            .map(|r| capability.distance(r, encoding))
            .fold(f64::INFINITY, f64::min)
            < self.threshold
    }

    pub fn len(&self) -> usize {
        self.encodings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encodings.is_empty()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}
