use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::Array4;

use crate::config::InputSize;

/// Model stride; native inputs are padded to a multiple of it.
pub const STRIDE: u32 = 32;
const PAD_VALUE: u8 = 114;

/// How model-space coordinates map back onto the uploaded image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub width: u32,
    pub height: u32,
}

impl Letterbox {
    /// Map a model-space point to image pixels, clipped to the image bounds.
    pub fn restore(&self, x: f32, y: f32) -> (f32, f32) {
        let x = (x - self.pad_x) / self.scale;
        let y = (y - self.pad_y) / self.scale;
        (
            x.clamp(0.0, self.width as f32),
            y.clamp(0.0, self.height as f32),
        )
    }
}

/// Shape `image` for the network: letterbox or stride padding.
pub fn prepare(image: &RgbImage, size: InputSize) -> (RgbImage, Letterbox) {
    match size {
        InputSize::Square(side) => letterbox(image, side),
        InputSize::Native => pad_to_stride(image),
    }
}

pub fn letterbox(image: &RgbImage, side: u32) -> (RgbImage, Letterbox) {
    let (width, height) = image.dimensions();
    let scale = (side as f32 / width as f32).min(side as f32 / height as f32);
    let new_width = ((width as f32 * scale).round() as u32).clamp(1, side);
    let new_height = ((height as f32 * scale).round() as u32).clamp(1, side);

    let resized = if (new_width, new_height) == (width, height) {
        image.clone()
    } else {
        imageops::resize(image, new_width, new_height, FilterType::Triangle)
    };

    let pad_x = (side - new_width) / 2;
    let pad_y = (side - new_height) / 2;

    let mut canvas = RgbImage::from_pixel(side, side, Rgb([PAD_VALUE; 3]));
    imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    (
        canvas,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            width,
            height,
        },
    )
}

pub fn pad_to_stride(image: &RgbImage) -> (RgbImage, Letterbox) {
    let (width, height) = image.dimensions();
    let padded_width = width.div_ceil(STRIDE) * STRIDE;
    let padded_height = height.div_ceil(STRIDE) * STRIDE;

    let mut canvas = RgbImage::from_pixel(padded_width, padded_height, Rgb([PAD_VALUE; 3]));
    imageops::replace(&mut canvas, image, 0, 0);

    (
        canvas,
        Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            width,
            height,
        },
    )
}

/// NCHW tensor with channel values scaled to [0, 1].
pub fn to_tensor(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_wide_image() {
        let image = RgbImage::from_pixel(200, 100, Rgb([255, 0, 0]));
        let (canvas, lb) = letterbox(&image, 64);

        assert_eq!(canvas.dimensions(), (64, 64));
        assert_eq!(lb.scale, 0.32);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 16.0);
        assert_eq!(canvas.get_pixel(32, 0), &Rgb([PAD_VALUE; 3]));
        assert_eq!(canvas.get_pixel(32, 32), &Rgb([255, 0, 0]));
    }

    #[test]
    fn restore_undoes_letterbox_and_clips() {
        let image = RgbImage::new(200, 100);
        let (_, lb) = letterbox(&image, 64);

        let (x, y) = lb.restore(32.0, 32.0);
        assert!((x - 100.0).abs() < 1e-3);
        assert!((y - 50.0).abs() < 1e-3);

        assert_eq!(lb.restore(-5.0, 0.0), (0.0, 0.0));
        assert_eq!(lb.restore(64.0, 64.0), (200.0, 100.0));
    }

    #[test]
    fn tiny_image_still_fills_at_least_one_pixel() {
        let image = RgbImage::new(2, 2);
        let (canvas, lb) = letterbox(&image, 640);
        assert_eq!(canvas.dimensions(), (640, 640));
        assert_eq!(lb.scale, 320.0);
    }

    #[test]
    fn native_pads_to_stride() {
        let image = RgbImage::from_pixel(33, 64, Rgb([1, 2, 3]));
        let (canvas, lb) = prepare(&image, InputSize::Native);

        assert_eq!(canvas.dimensions(), (64, 64));
        assert_eq!(lb.scale, 1.0);
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([1, 2, 3]));
        assert_eq!(canvas.get_pixel(40, 0), &Rgb([PAD_VALUE; 3]));
        assert_eq!(lb.restore(10.0, 20.0), (10.0, 20.0));
    }

    #[test]
    fn tensor_is_channel_first() {
        let mut image = RgbImage::new(3, 2);
        image.put_pixel(2, 1, Rgb([255, 0, 51]));

        let tensor = to_tensor(&image);
        assert_eq!(tensor.shape(), &[1, 3, 2, 3]);
        assert_eq!(tensor[[0, 0, 1, 2]], 1.0);
        assert_eq!(tensor[[0, 1, 1, 2]], 0.0);
        assert!((tensor[[0, 2, 1, 2]] - 0.2).abs() < 1e-6);
    }
}
