pub mod cli;
pub mod detector;
pub mod http;
pub mod mapping;
pub mod model;
pub mod postprocess;
pub mod preprocess;

pub use crate::cli::Args;
pub use crate::detector::{best_detection, Detect, Detection, YoloDetector};
pub use crate::http::{router, AppState, SERVICE_NAME};
pub use crate::mapping::{load_class_mapping, CivicTaxonomy, UNCATEGORIZED_TAG};
pub use crate::model::OnnxModel;
pub use crate::postprocess::{decode_and_filter, non_maximum_suppression};
pub use crate::preprocess::{LetterboxMeta, PreprocessConfig, Processor};
