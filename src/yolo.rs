use std::path::Path;

use image::RgbImage;
use tract_onnx::prelude::*;

use crate::config::InputSize;
use crate::error::{DetectError, ModelError};
use crate::models::RawDetection;
use crate::postprocess::{self, Thresholds};
use crate::preprocess;
use crate::service::Detector;

type Plan = TypedRunnableModel<TypedModel>;

enum Engine {
    /// Optimized once for a fixed square input.
    Square { plan: Plan, side: u32 },
    /// Specialized to each request's padded shape.
    Native { model: InferenceModel },
}

/// YOLOv5 ONNX export executed with tract.
pub struct YoloDetector {
    engine: Engine,
    thresholds: Thresholds,
}

impl YoloDetector {
    pub fn load(
        path: &Path,
        input_size: InputSize,
        thresholds: Thresholds,
    ) -> Result<Self, ModelError> {
        let load_error = |e: TractError| ModelError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        let model = tract_onnx::onnx().model_for_path(path).map_err(load_error)?;
        let engine = match input_size {
            InputSize::Square(side) => Engine::Square {
                plan: optimize(model, side, side).map_err(load_error)?,
                side,
            },
            InputSize::Native => Engine::Native { model },
        };

        Ok(Self { engine, thresholds })
    }

    pub fn input_size(&self) -> InputSize {
        match self.engine {
            Engine::Square { side, .. } => InputSize::Square(side),
            Engine::Native { .. } => InputSize::Native,
        }
    }

    fn forward(&self, plan: &Plan, canvas: &RgbImage) -> Result<Vec<RawDetection>, DetectError> {
        let input = preprocess::to_tensor(canvas);
        let data = input
            .as_slice()
            .ok_or_else(|| DetectError::inference("input tensor is not contiguous"))?;
        let tensor = Tensor::from_shape(input.shape(), data).map_err(DetectError::inference)?;

        let outputs = plan.run(tvec!(tensor.into())).map_err(DetectError::inference)?;

        let output = outputs
            .first()
            .ok_or_else(|| DetectError::inference("model produced no outputs"))?;
        let rows = output.as_slice::<f32>().map_err(DetectError::inference)?;
        candidates(output.shape(), rows, &self.thresholds).map_err(DetectError::inference)
    }
}

impl Detector for YoloDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectError> {
        let (canvas, lb) = preprocess::prepare(image, self.input_size());

        let candidates = match &self.engine {
            Engine::Square { plan, .. } => self.forward(plan, &canvas)?,
            Engine::Native { model } => {
                let plan = optimize(model.clone(), canvas.width(), canvas.height())
                    .map_err(DetectError::inference)?;
                self.forward(&plan, &canvas)?
            }
        };

        let kept = postprocess::non_max_suppression(candidates, &self.thresholds);
        Ok(postprocess::restore(kept, &lb))
    }
}

fn optimize(model: InferenceModel, width: u32, height: u32) -> TractResult<Plan> {
    model
        .with_input_fact(0, f32::fact([1, 3, height as usize, width as usize]).into())?
        .into_optimized()?
        .into_runnable()
}

/// Validate the `[1, N, 5 + classes]` output layout and decode it.
fn candidates(
    shape: &[usize],
    rows: &[f32],
    thresholds: &Thresholds,
) -> Result<Vec<RawDetection>, ModelError> {
    match shape {
        [1, _, row_len] if *row_len >= 6 => Ok(postprocess::decode(rows, *row_len, thresholds)),
        _ => Err(ModelError::OutputShape(shape.to_vec())),
    }
}
