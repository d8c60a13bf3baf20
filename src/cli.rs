use clap::Parser;


#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// ONNX model path
    #[arg(long, default_value = "assets/models/yolov8n.onnx")]
    pub model: String,

    /// Class labels file, one name per line (zero-indexed)
    #[arg(long, default_value = "assets/labels/coco-80.txt")]
    pub labels: String,

    /// Civic issue taxonomy: JSON object mapping class name to issue tag
    #[arg(long, default_value = "assets/civic_map.json")]
    pub taxonomy: String,

    /// Listening port
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Confidence threshold for a detection to count (0.0 - 1.0)
    #[arg(long, default_value_t = 0.25)]
    pub confidence: f32,

    /// NMS IoU threshold (0.0 - 1.0)
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// Run inference on the CUDA execution provider
    #[arg(long, default_value_t = false)]
    pub cuda: bool,
}
