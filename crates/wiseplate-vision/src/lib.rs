//! Vision module - model registry, preprocessing, plate detection, item classification

pub mod classifier;
pub mod detector;
pub mod preprocess;
pub mod registry;

pub use classifier::{argmax, softmax, ItemClassifier};
pub use detector::{decode_yolov5, non_max_suppression, DetectorConfig, PlateDetector, YoloPlateDetector};
pub use preprocess::{classification_tensor, letterbox_tensor, Letterbox, CLASSIFIER_INPUT_SIZE};
pub use registry::{
    InferenceModel, LoaderKind, ModelLoader, ModelManifest, ModelOutput, ModelRegistry,
    ModelSpec, OnnxLoader, OnnxModel,
};
