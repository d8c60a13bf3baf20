use std::collections::HashMap;

use anyhow::Result;
use ndarray::{s, Array, Array1, Array3, ArrayView1, Axis};

use crate::preprocess::LetterboxMeta;

pub fn argmax_and_max(scores: &ArrayView1<f32>) -> (usize, f32) {
    scores
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(max_idx, max_val), (i, &val)| {
            if val > max_val { (i, val) } else { (max_idx, max_val) }
        })
}

/// Decode the raw YOLO output of shape (1, 4 + num_classes, num_anchors).
///
/// Each anchor column holds a center-format box in model-input pixels followed
/// by per-class scores. Anchors whose best class score reaches `threshold` are
/// kept, with boxes converted to corner format in source-image coordinates.
pub fn decode_and_filter(
    output_dyn: &Array<f32, ndarray::IxDyn>,
    threshold: f32,
    meta: &LetterboxMeta,
) -> Result<(Vec<i32>, Vec<f32>, Vec<Array1<f32>>)> {
    let fixed: Array3<f32> = output_dyn
        .view()
        .into_dimensionality::<ndarray::Ix3>()?
        .to_owned();
    let preds = fixed.index_axis(Axis(0), 0); // shape (4 + C, N)
    anyhow::ensure!(
        preds.shape()[0] > 4,
        "unexpected model output shape {:?}",
        fixed.shape()
    );

    let mut filtered_classes = Vec::new();
    let mut filtered_conf = Vec::new();
    let mut filtered_boxes = Vec::new();

    for col in preds.axis_iter(Axis(1)) {
        let scores = col.slice(s![4..]);
        let (class_id, confidence) = argmax_and_max(&scores);
        if confidence >= threshold {
            let (cx, cy, w, h) = (col[0], col[1], col[2], col[3]);
            let x1 = (cx - w / 2.0 - meta.x_offset as f32) / meta.scale;
            let y1 = (cy - h / 2.0 - meta.y_offset as f32) / meta.scale;
            let x2 = (cx + w / 2.0 - meta.x_offset as f32) / meta.scale;
            let y2 = (cy + h / 2.0 - meta.y_offset as f32) / meta.scale;
            filtered_classes.push(class_id as i32);
            filtered_conf.push(confidence);
            filtered_boxes.push(ndarray::arr1(&[x1, y1, x2, y2]));
        }
    }
    Ok((filtered_classes, filtered_conf, filtered_boxes))
}

/// Intersection over Union of two corner-format boxes.
pub fn compute_iou(b1: &Array1<f32>, b2: &Array1<f32>) -> f32 {
    let (x1_1, y1_1, x2_1, y2_1) = (b1[0], b1[1], b1[2], b1[3]);
    let (x1_2, y1_2, x2_2, y2_2) = (b2[0], b2[1], b2[2], b2[3]);

    let inter_x1 = x1_1.max(x1_2);
    let inter_y1 = y1_1.max(y1_2);
    let inter_x2 = x2_1.min(x2_2);
    let inter_y2 = y2_1.min(y2_2);

    let inter_area = ((inter_x2 - inter_x1).max(0.0)) * ((inter_y2 - inter_y1).max(0.0));
    let area1 = (x2_1 - x1_1).max(0.0) * (y2_1 - y1_1).max(0.0);
    let area2 = (x2_2 - x1_2).max(0.0) * (y2_2 - y1_2).max(0.0);
    let union_area = area1 + area2 - inter_area;
    if union_area <= 0.0 {
        0.0
    } else {
        inter_area / union_area
    }
}

pub fn non_maximum_suppression(
    class_confs: Vec<f32>,
    class_ids: Vec<i32>,
    boxes: Vec<Array1<f32>>,
    iou_threshold: f32,
) -> (Vec<f32>, Vec<i32>, Vec<Array1<f32>>) {
    // Group indices by class id; NMS never suppresses across classes.
    let mut by_class: HashMap<i32, Vec<usize>> = HashMap::new();
    for (i, &cid) in class_ids.iter().enumerate() {
        by_class.entry(cid).or_default().push(i);
    }

    let mut keep_indices: Vec<usize> = Vec::new();

    for (_cid, indices) in by_class.iter_mut() {
        // Descending confidence order.
        indices.sort_by(|&i1, &i2| {
            class_confs[i2]
                .partial_cmp(&class_confs[i1])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut suppressed = vec![false; indices.len()];
        for i in 0..indices.len() {
            if suppressed[i] {
                continue;
            }
            let idx_i = indices[i];
            keep_indices.push(idx_i);
            for j in (i + 1)..indices.len() {
                if suppressed[j] {
                    continue;
                }
                let idx_j = indices[j];
                if compute_iou(&boxes[idx_i], &boxes[idx_j]) > iou_threshold {
                    suppressed[j] = true;
                }
            }
        }
    }

    keep_indices.sort_unstable();

    let filtered_confs: Vec<f32> = keep_indices.iter().map(|&i| class_confs[i]).collect();
    let filtered_ids: Vec<i32> = keep_indices.iter().map(|&i| class_ids[i]).collect();
    let filtered_boxes: Vec<Array1<f32>> =
        keep_indices.iter().map(|&i| boxes[i].clone()).collect();

    (filtered_confs, filtered_ids, filtered_boxes)
}
