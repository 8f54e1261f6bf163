use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// How an uploaded image is shaped before inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSize {
    /// Keep the original resolution, padding right/bottom to the model stride.
    Native,
    /// Letterbox into a `n x n` square.
    Square(u32),
}

impl FromStr for InputSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("native") || s.eq_ignore_ascii_case("none") {
            return Ok(InputSize::Native);
        }
        match s.parse::<u32>() {
            Ok(0) => Err("input size must be greater than zero".to_string()),
            Ok(n) => Ok(InputSize::Square(n)),
            Err(_) => Err(format!("expected a pixel size or `native`, got `{s}`")),
        }
    }
}

impl fmt::Display for InputSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSize::Native => write!(f, "native"),
            InputSize::Square(n) => write!(f, "{n}x{n}"),
        }
    }
}

fn unit_interval(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside [0, 1]"))
    }
}

/// Object detection HTTP service.
#[derive(Debug, Clone, Parser)]
#[command(name = "detect-api", version)]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 10000)]
    pub port: u16,

    /// YOLOv5 ONNX export loaded at startup
    #[arg(long = "model", env = "MODEL_PATH", default_value = "yolov5s.onnx")]
    pub model_path: PathBuf,

    /// Newline separated class names, `none` to report bare class indices.
    /// Defaults to the COCO classes.
    #[arg(long = "labels", env = "LABELS_PATH")]
    pub labels_path: Option<String>,

    /// Square letterbox size, or `native` to skip resizing
    #[arg(long, env = "INPUT_SIZE", default_value = "640")]
    pub input_size: InputSize,

    #[arg(long, env = "CONF_THRESHOLD", default_value_t = 0.25, value_parser = unit_interval)]
    pub conf_threshold: f32,

    #[arg(long, env = "IOU_THRESHOLD", default_value_t = 0.45, value_parser = unit_interval)]
    pub iou_threshold: f32,

    #[arg(long, env = "MAX_DETECTIONS", default_value_t = 1000)]
    pub max_detections: usize,

    /// Browser origin allowed to call the API; any origin when unset or `*`
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

/// Where class names come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSource {
    Coco,
    Disabled,
    File(PathBuf),
}

impl Config {
    pub fn label_source(&self) -> LabelSource {
        match self.labels_path.as_deref() {
            None => LabelSource::Coco,
            Some(s) if s.eq_ignore_ascii_case("none") => LabelSource::Disabled,
            Some(path) => LabelSource::File(PathBuf::from(path)),
        }
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}
