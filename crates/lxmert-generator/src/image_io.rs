//! Convert generated image tensors to RGB buffers and PNG files

use std::path::Path;

use burn::prelude::*;
use image::{ImageError, RgbImage};

/// Convert a generated `[batch, 3, h, w]` tensor with values in `[-1, 1]`
/// into per-batch RGB images.
pub fn tensor_to_rgb8<B: Backend>(tensor: Tensor<B, 4>) -> Vec<RgbImage> {
    let [batch, channels, h, w] = tensor.dims();
    assert_eq!(channels, 3, "expected an RGB tensor, got {} channels", channels);

    // [-1, 1] -> [0, 255]
    let tensor = (tensor.clamp(-1.0, 1.0) + 1.0) * 127.5;

    let data = tensor.into_data();
    let floats: Vec<f32> = data.convert::<f32>().to_vec().unwrap();

    let mut images = Vec::with_capacity(batch);
    for b in 0..batch {
        let base = b * 3 * h * w;
        let img = RgbImage::from_fn(w as u32, h as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            let r = floats[base + y * w + x] as u8;
            let g = floats[base + h * w + y * w + x] as u8;
            let bl = floats[base + 2 * h * w + y * w + x] as u8;
            image::Rgb([r, g, bl])
        });
        images.push(img);
    }

    images
}

/// Write the first image of a generated batch to a PNG file
pub fn save_rgb8<B: Backend>(tensor: Tensor<B, 4>, path: impl AsRef<Path>) -> Result<(), ImageError> {
    let batch = tensor.dims()[0];
    assert!(batch > 0, "cannot save an image from an empty batch");

    let images = tensor_to_rgb8(tensor);
    images[0].save(path)
}
