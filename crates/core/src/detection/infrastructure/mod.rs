pub mod onnx_face_capability;
