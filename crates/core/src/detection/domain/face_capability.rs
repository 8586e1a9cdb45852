use crate::shared::constants::DEFAULT_MATCH_THRESHOLD;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

use super::detection_model::DetectionModel;
use super::face_encoding::FaceEncoding;

/// Domain interface to the face detection/recognition model.
///
/// Shared by every running job, hence `&self` and `Sync`; implementations
/// serialise access to their sessions internally.
pub trait FaceCapability: Send + Sync {
    /// Finds face boxes in `frame`. `upsample` ≥ 1 raises sensitivity to
    /// small faces at proportional cost.
    fn detect(
        &self,
        frame: &Frame,
        model: DetectionModel,
        upsample: u32,
    ) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>>;

    /// Computes the appearance encoding of the face inside `face_box`.
    fn encode(
        &self,
        frame: &Frame,
        face_box: &FaceBox,
    ) -> Result<FaceEncoding, Box<dyn std::error::Error>>;

    fn distance(&self, a: &FaceEncoding, b: &FaceEncoding) -> f64 {
        a.euclidean_distance(b)
    }

    /// Recommended distance cutoff for "same person" under [`Self::distance`].
    fn match_threshold(&self) -> f64 {
        DEFAULT_MATCH_THRESHOLD
    }
}
