use std::cmp::Ordering;

use crate::models::RawDetection;
use crate::preprocess::Letterbox;

/// Filtering applied to raw network output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub confidence: f32,
    pub iou: f32,
    pub max_detections: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            iou: 0.45,
            max_detections: 1000,
        }
    }
}

/// Decode YOLOv5 rows of `(cx, cy, w, h, objectness, class scores...)` into
/// corner boxes in model input space, dropping low confidence candidates and
/// rows whose coordinates are not finite.
pub fn decode(rows: &[f32], row_len: usize, thresholds: &Thresholds) -> Vec<RawDetection> {
    if row_len < 6 {
        return Vec::new();
    }

    rows.chunks_exact(row_len)
        .filter_map(|row| {
            let objectness = row[4];
            if objectness < thresholds.confidence {
                return None;
            }

            let (class, class_score) = row[5..]
                .iter()
                .copied()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))?;

            let confidence = objectness * class_score;
            if confidence.is_nan() || confidence < thresholds.confidence {
                return None;
            }

            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            if !(cx.is_finite() && cy.is_finite() && w.is_finite() && h.is_finite()) {
                return None;
            }

            Some(RawDetection {
                xmin: cx - w / 2.0,
                ymin: cy - h / 2.0,
                xmax: cx + w / 2.0,
                ymax: cy + h / 2.0,
                confidence: confidence.min(1.0),
                class,
            })
        })
        .collect()
}

/// Map model-space boxes onto the uploaded image, clipped to its bounds.
pub fn restore(detections: Vec<RawDetection>, lb: &Letterbox) -> Vec<RawDetection> {
    detections
        .into_iter()
        .map(|d| {
            let (xmin, ymin) = lb.restore(d.xmin, d.ymin);
            let (xmax, ymax) = lb.restore(d.xmax, d.ymax);
            RawDetection {
                xmin,
                ymin,
                xmax,
                ymax,
                ..d
            }
        })
        .collect()
}

pub fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let width = (a.xmax.min(b.xmax) - a.xmin.max(b.xmin)).max(0.0);
    let height = (a.ymax.min(b.ymax) - a.ymin.max(b.ymin)).max(0.0);
    let intersection = width * height;

    let area_a = (a.xmax - a.xmin) * (a.ymax - a.ymin);
    let area_b = (b.xmax - b.xmin) * (b.ymax - b.ymin);
    let union = area_a + area_b - intersection;

    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Class-aware non-maximum suppression. Output is sorted by confidence,
/// highest first, and capped at `max_detections`.
pub fn non_max_suppression(
    mut detections: Vec<RawDetection>,
    thresholds: &Thresholds,
) -> Vec<RawDetection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in detections {
        if kept.len() >= thresholds.max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class == candidate.class && iou(k, &candidate) > thresholds.iou);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
