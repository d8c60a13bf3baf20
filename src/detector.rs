use std::collections::HashMap;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use image::DynamicImage;
use ndarray::CowArray;
use tokio::sync::Mutex;

use crate::postprocess::{decode_and_filter, non_maximum_suppression};
use crate::preprocess::Processor;

/// One detector output for a single image.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f32,
    /// Corner-format box in source-image coordinates.
    pub bbox: [f32; 4],
}

/// Seam over the underlying model so the HTTP layer can be exercised without
/// a loaded ONNX session.
#[async_trait]
pub trait Detect: Send + Sync {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>>;
}

/// Keep the detection with the strictly greatest confidence; the first
/// detection wins ties since only strict `>` advances the maximum.
pub fn best_detection(detections: &[Detection]) -> Option<&Detection> {
    let mut best: Option<&Detection> = None;
    for det in detections {
        if best.map_or(true, |b| det.confidence > b.confidence) {
            best = Some(det);
        }
    }
    best
}

/// YOLO detector backed by an ONNX Runtime session.
///
/// The session is loaded once at startup and shared across requests; ort
/// sessions are not assumed reentrant, so inference is funneled through a
/// mutex.
pub struct YoloDetector {
    session: Mutex<ort::session::Session>,
    processor: Processor,
    labels: HashMap<usize, String>,
    conf_threshold: f32,
    iou_threshold: f32,
}

// ort::session::Session has no Debug impl.
impl fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YoloDetector")
            .field("conf_threshold", &self.conf_threshold)
            .field("iou_threshold", &self.iou_threshold)
            .finish()
    }
}

impl YoloDetector {
    pub fn new(
        session: ort::session::Session,
        processor: Processor,
        labels: HashMap<usize, String>,
        conf_threshold: f32,
        iou_threshold: f32,
    ) -> Self {
        Self {
            session: Mutex::new(session),
            processor,
            labels,
            conf_threshold,
            iou_threshold,
        }
    }

    fn class_name(&self, id: i32) -> String {
        match self.labels.get(&(id as usize)) {
            Some(name) => name.clone(),
            None => format!("class_{id}"),
        }
    }
}

#[async_trait]
impl Detect for YoloDetector {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let (xs, meta) = self.processor.preprocess(image)?;
        let xs = CowArray::from(xs);
        let input_data = ort::inputs![xs.view()]?;

        let output = {
            let session = self.session.lock().await;
            let ys = session.run(input_data)?;
            let (_name, value) = ys
                .iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("model returned no outputs"))?;
            value.try_extract_tensor::<f32>()?.into_owned()
        };

        let (ids, confs, boxes) = decode_and_filter(&output, self.conf_threshold, &meta)?;
        let (confs, ids, boxes) = non_maximum_suppression(confs, ids, boxes, self.iou_threshold);

        let detections = ids
            .into_iter()
            .zip(confs)
            .zip(boxes)
            .map(|((id, confidence), bbox)| Detection {
                class_name: self.class_name(id),
                confidence,
                bbox: [bbox[0], bbox[1], bbox[2], bbox[3]],
            })
            .collect();
        Ok(detections)
    }
}
