use image::RgbImage;

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::error::DetectError;
use crate::labels::{class_name, Labels};
use crate::models::{DetectionRecord, RawDetection};

/// Anything that turns an image into boxes. Shared read-only across workers.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectError>;
}

/// The detector plus everything needed to turn its output into response
/// records. Built once at startup.
pub struct DetectionService {
    detector: Box<dyn Detector>,
    labels: Option<Labels>,
    max_upload_bytes: usize,
}

impl DetectionService {
    pub fn new(detector: impl Detector + 'static, labels: Option<Labels>) -> Self {
        Self {
            detector: Box::new(detector),
            labels,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_upload_limit(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn labels(&self) -> Option<&Labels> {
        self.labels.as_ref()
    }

    /// Decode the uploaded bytes, run the detector and normalize its output.
    pub fn detect_bytes(&self, bytes: &[u8]) -> Result<Vec<DetectionRecord>, DetectError> {
        let image = image::load_from_memory(bytes)?.to_rgb8();
        let detections = self.detector.detect(&image)?;
        Ok(detections.into_iter().map(|raw| self.record(raw)).collect())
    }

    fn record(&self, raw: RawDetection) -> DetectionRecord {
        let (xmin, xmax) = ordered(raw.xmin, raw.xmax);
        let (ymin, ymax) = ordered(raw.ymin, raw.ymax);
        DetectionRecord {
            xmin,
            ymin,
            xmax,
            ymax,
            confidence: raw.confidence.clamp(0.0, 1.0),
            class_id: raw.class as i64,
            name: class_name(self.labels.as_ref(), raw.class),
        }
    }
}

fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Fixed(Vec<RawDetection>);

    impl Detector for Fixed {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<RawDetection>, DetectError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl Detector for Broken {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<RawDetection>, DetectError> {
            Err(DetectError::inference("model exploded"))
        }
    }

    fn png() -> Vec<u8> {
        let image = image::DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let mut bytes = Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, image::ImageOutputFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn normalizes_raw_detections() {
        let service = DetectionService::new(
            Fixed(vec![RawDetection {
                xmin: 30.0,
                ymin: 5.0,
                xmax: 10.0,
                ymax: 25.0,
                confidence: 1.2,
                class: 1,
            }]),
            Some(Labels::parse("cat\ndog")),
        );

        let records = service.detect_bytes(&png()).unwrap();
        assert_eq!(
            records,
            vec![DetectionRecord {
                xmin: 10.0,
                ymin: 5.0,
                xmax: 30.0,
                ymax: 25.0,
                confidence: 1.0,
                class_id: 1,
                name: "dog".to_string(),
            }]
        );
    }

    #[test]
    fn unlabeled_classes_use_index() {
        let raw = RawDetection {
            xmin: 0.0,
            ymin: 0.0,
            xmax: 1.0,
            ymax: 1.0,
            confidence: 0.5,
            class: 42,
        };
        let service = DetectionService::new(Fixed(vec![raw]), None);
        assert_eq!(service.detect_bytes(&png()).unwrap()[0].name, "42");
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let service = DetectionService::new(Fixed(Vec::new()), None);
        let err = service.detect_bytes(b"definitely not a png").unwrap_err();
        assert!(matches!(err, DetectError::Decode(_)));
    }

    #[test]
    fn detector_errors_propagate() {
        let service = DetectionService::new(Broken, None);
        let err = service.detect_bytes(&png()).unwrap_err();
        assert_eq!(err.to_string(), "model exploded");
    }
}
