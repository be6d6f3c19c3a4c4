//! Image preprocessing for the detector and classifiers

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::Array4;

/// Side length of classifier inputs
pub const CLASSIFIER_INPUT_SIZE: u32 = 224;

/// ImageNet channel means
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Letterbox padding value (114/255 gray)
const PAD_VALUE: u8 = 114;

/// Resize to `size` x `size` and normalize with ImageNet statistics
///
/// Output is NCHW `[1, 3, size, size]`. Aspect ratio is not preserved.
pub fn classification_tensor(image: &DynamicImage, size: u32) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, size, size, FilterType::Triangle);

    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            let value = f32::from(pixel[c]) / 255.0;
            tensor[[0, c, y as usize, x as usize]] = (value - MEAN[c]) / STD[c];
        }
    }
    tensor
}

/// Geometry of a letterbox transform, used to map boxes back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Map a point in model input space back to source-image pixels
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Scale to fit `size` x `size` keeping aspect ratio, pad with gray
///
/// Pixel values are scaled to 0..1 without mean/std normalization.
pub fn letterbox_tensor(image: &DynamicImage, size: u32) -> (Array4<f32>, Letterbox) {
    let size = size.max(1);
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    let scale = (size as f32 / width.max(1) as f32).min(size as f32 / height.max(1) as f32);
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let resized = imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    imageops::overlay(&mut canvas, &resized, i64::from(pad_x), i64::from(pad_y));

    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = f32::from(pixel[c]) / 255.0;
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}
