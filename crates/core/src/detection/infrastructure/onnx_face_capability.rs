//! Face capability backed by ONNX Runtime: a YOLO face detector for boxes
//! and an ArcFace model for identity encodings.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::detection_model::DetectionModel;
use crate::detection::domain::face_capability::FaceCapability;
use crate::detection::domain::face_encoding::FaceEncoding;
use crate::shared::face_box::{FaceBox, PixelRect};
use crate::shared::frame::Frame;

/// Detection confidence floor for the fast model.
pub const HOG_CONFIDENCE: f64 = 0.5;

/// Lower floor for the accurate model: keeps marginal faces.
pub const CNN_CONFIDENCE: f64 = 0.3;

/// Euclidean distance between L2-normalised ArcFace embeddings below which
/// two faces are the same person (≈ 0.4 cosine similarity).
pub const ARCFACE_MATCH_THRESHOLD: f64 = 1.1;

/// Fallback detector input resolution when the model doesn't specify one.
const DEFAULT_INPUT_SIZE: u32 = 640;

const NMS_IOU_THRESH: f64 = 0.45;

/// Fraction by which neighbouring upsampling tiles overlap, so faces on a
/// tile seam are seen whole by at least one tile.
const TILE_OVERLAP: f64 = 0.25;

const EMBEDDING_INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

type BoxError = Box<dyn std::error::Error>;

pub struct OnnxFaceCapability {
    detector: Mutex<ort::session::Session>,
    embedder: Mutex<ort::session::Session>,
    input_size: u32,
}

impl OnnxFaceCapability {
    pub fn new(detector_model: &Path, embedding_model: &Path) -> Result<Self, BoxError> {
        let detector = build_session(detector_model)?;
        let embedder = build_session(embedding_model)?;

        // NCHW: [1, 3, H, W]; dynamic dimensions come back as -1
        let input_size = detector
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!("Face capability ready (detector input {input_size}px)");
        Ok(Self {
            detector: Mutex::new(detector),
            embedder: Mutex::new(embedder),
            input_size,
        })
    }

    /// Runs the detector once over `frame`, returning boxes in `frame`
    /// coordinates.
    fn detect_pass(&self, frame: &Frame, confidence: f64) -> Result<Vec<RawDetection>, BoxError> {
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;

        let mut session = self
            .detector
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        require_output(outputs.len(), "detector")?;
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape();
        if shape.len() != 3 {
            return Err(format!("unexpected detector output shape: {shape:?}").into());
        }

        // [1, features, detections] when transposed, else [1, detections, features]
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if num_feats < 5 {
            return Err(format!("detector output has {num_feats} features, need 5").into());
        }
        let data = tensor.as_slice().ok_or("cannot read detector output")?;
        let feature = |det: usize, f: usize| -> f64 {
            if transposed {
                data[f * num_dets + det] as f64
            } else {
                data[det * num_feats + f] as f64
            }
        };

        let mut dets = Vec::new();
        for i in 0..num_dets {
            let conf = feature(i, 4);
            if conf < confidence {
                continue;
            }
            let (cx, cy, w, h) = (feature(i, 0), feature(i, 1), feature(i, 2), feature(i, 3));
            dets.push(RawDetection {
                x1: ((cx - w / 2.0) - pad_x as f64) / scale,
                y1: ((cy - h / 2.0) - pad_y as f64) / scale,
                x2: ((cx + w / 2.0) - pad_x as f64) / scale,
                y2: ((cy + h / 2.0) - pad_y as f64) / scale,
                confidence: conf,
            });
        }
        Ok(dets)
    }
}

impl FaceCapability for OnnxFaceCapability {
    fn detect(
        &self,
        frame: &Frame,
        model: DetectionModel,
        upsample: u32,
    ) -> Result<Vec<FaceBox>, BoxError> {
        let confidence = match model {
            DetectionModel::Hog => HOG_CONFIDENCE,
            DetectionModel::Cnn => CNN_CONFIDENCE,
        };

        let mut dets = self.detect_pass(frame, confidence)?;
        for tile in tile_grid(frame.width(), frame.height(), upsample) {
            let crop = frame.crop(tile);
            for mut d in self.detect_pass(&crop, confidence)? {
                d.x1 += tile.x as f64;
                d.x2 += tile.x as f64;
                d.y1 += tile.y as f64;
                d.y2 += tile.y as f64;
                dets.push(d);
            }
        }

        Ok(nms(&mut dets, NMS_IOU_THRESH)
            .into_iter()
            .map(|d| FaceBox::from_corners(d.x1, d.y1, d.x2, d.y2))
            .collect())
    }

    fn encode(&self, frame: &Frame, face_box: &FaceBox) -> Result<FaceEncoding, BoxError> {
        let rect = face_box
            .clip(frame.width(), frame.height())
            .ok_or("face box lies outside the frame")?;
        let crop = frame.crop(rect);
        let input_value = ort::value::Tensor::from_array(embedding_input(&crop))?;

        let mut session = self
            .embedder
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        require_output(outputs.len(), "embedding model")?;
        let embedding = outputs[0].try_extract_array::<f32>()?;
        let mut values = embedding
            .as_slice()
            .ok_or("cannot read embedding output")?
            .to_vec();
        l2_normalize(&mut values);
        Ok(FaceEncoding::new(values))
    }

    fn match_threshold(&self) -> f64 {
        ARCFACE_MATCH_THRESHOLD
    }
}

/// Errors when a session returned no output tensors to read from.
fn require_output(count: usize, model: &str) -> Result<(), BoxError> {
    if count == 0 {
        return Err(format!("{model} produced no outputs").into());
    }
    Ok(())
}

fn build_session(model_path: &Path) -> Result<ort::session::Session, BoxError> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// Platform accelerator, if any; ONNX Runtime falls back to CPU.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Splits the frame into an `n`×`n` grid of overlapping tiles.
///
/// Returns no tiles for `n <= 1`: the whole-frame pass covers that case.
fn tile_grid(width: u32, height: u32, n: u32) -> Vec<PixelRect> {
    if n <= 1 || width == 0 || height == 0 {
        return Vec::new();
    }
    let axis = |len: u32| -> Vec<(usize, usize)> {
        let step = len as f64 / n as f64;
        let size = (step * (1.0 + TILE_OVERLAP)).ceil() as usize;
        (0..n)
            .map(|i| {
                let start = ((i as f64 * step) as usize).min(len as usize - 1);
                let end = (start + size).min(len as usize);
                (start, end - start)
            })
            .collect()
    };

    let cols = axis(width);
    let rows = axis(height);
    let mut tiles = Vec::with_capacity(cols.len() * rows.len());
    for &(y, h) in &rows {
        for &(x, w) in &cols {
            tiles.push(PixelRect { x, y, w, h });
        }
    }
    tiles
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

/// Resize a face crop to 112×112, normalise to [-1, 1], NCHW layout.
fn embedding_input(crop: &Frame) -> ndarray::Array4<f32> {
    let src_w = crop.width() as usize;
    let src_h = crop.height() as usize;
    let src = crop.as_ndarray();
    let size = EMBEDDING_INPUT_SIZE;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / size as f64) as usize).min(src_h - 1);
        for x in 0..size {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / size as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[src_y, src_x, c]] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }
    tensor
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
}

impl RawDetection {
    fn corners(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in dets.iter() {
        if keep
            .iter()
            .all(|k| bbox_iou(&k.corners(), &det.corners()) <= iou_thresh)
        {
            keep.push(det.clone());
        }
    }
    keep
}

fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn det(x1: f64, y1: f64, x2: f64, y2: f64, confidence: f64) -> RawDetection {
        RawDetection {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    #[test]
    fn test_missing_outputs_are_an_error() {
        let err = require_output(0, "embedding model").unwrap_err();
        assert_eq!(err.to_string(), "embedding model produced no outputs");
        assert!(require_output(1, "embedding model").is_ok());
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 → scale 3.2, new 640x320, pad_y 160
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0);
        let (tensor, scale, pad_x, pad_y) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(scale, 3.2, epsilon = 1e-9);
        assert_eq!(pad_x, 0);
        assert_eq!(pad_y, 160);
    }

    #[test]
    fn test_letterbox_pads_with_gray() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 3, 0);
        let (tensor, _, _, pad_y) = letterbox(&frame, 640);
        assert!((tensor[[0, 0, 0, 0]] - 114.0 / 255.0).abs() < 0.01);
        assert!((tensor[[0, 0, pad_y as usize + 1, 1]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_embedding_input_shape_and_range() {
        let crop = Frame::new(vec![255u8; 30 * 20 * 3], 30, 20, 3, 0);
        let tensor = embedding_input(&crop);
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_arcface_threshold_matches_cosine_cutoff() {
        // |a - b|² = 2 - 2cos for unit vectors
        let cosine = 1.0 - ARCFACE_MATCH_THRESHOLD * ARCFACE_MATCH_THRESHOLD / 2.0;
        assert!(cosine > 0.35 && cosine < 0.45);
    }

    #[test]
    fn test_nms_keeps_highest_confidence() {
        let mut dets = vec![
            det(0.0, 0.0, 100.0, 100.0, 0.5),
            det(2.0, 2.0, 102.0, 102.0, 0.9),
        ];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_disjoint() {
        let mut dets = vec![
            det(0.0, 0.0, 50.0, 50.0, 0.9),
            det(200.0, 200.0, 250.0, 250.0, 0.8),
        ];
        assert_eq!(nms(&mut dets, 0.3).len(), 2);
    }

    #[test]
    fn test_tile_grid_single_pass_has_no_tiles() {
        assert!(tile_grid(640, 480, 1).is_empty());
    }

    #[test]
    fn test_tile_grid_covers_frame() {
        let tiles = tile_grid(640, 480, 2);
        assert_eq!(tiles.len(), 4);
        for t in &tiles {
            assert!(t.x + t.w <= 640);
            assert!(t.y + t.h <= 480);
        }
        // Last column/row reaches the frame edge
        assert!(tiles.iter().any(|t| t.x + t.w == 640));
        assert!(tiles.iter().any(|t| t.y + t.h == 480));
        // Neighbouring tiles overlap
        assert!(tiles[0].w > 320);
    }

    #[test]
    fn test_bbox_iou_perfect() {
        let b = [0.0, 0.0, 10.0, 10.0];
        assert_relative_eq!(bbox_iou(&b, &b), 1.0);
    }
}
