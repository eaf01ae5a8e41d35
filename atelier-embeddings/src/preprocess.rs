//! Image preprocessing.
//!
//! Two stages with different jobs: `bound_dimensions` is a memory and
//! latency guard applied as images leave the fetcher; `clip_pixels` is the
//! encoder's canonical 224×224 crop-and-normalize, applied at encode time.

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Canonical CLIP input edge length.
pub const CLIP_INPUT_SIZE: u32 = 224;

/// Per-channel normalization constants from the CLIP reference pipeline.
const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Shrink so that `max(width, height) <= max_side`, preserving aspect ratio.
/// Images already within the bound pass through untouched.
pub fn bound_dimensions(image: RgbImage, max_side: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let longest = w.max(h);
    if longest <= max_side {
        return image;
    }

    let scale = max_side as f64 / longest as f64;
    let nw = ((w as f64 * scale).round() as u32).max(1);
    let nh = ((h as f64 * scale).round() as u32).max(1);
    imageops::resize(&image, nw, nh, FilterType::Lanczos3)
}

/// Produce the CLIP visual-tower input for one image: resize the shortest
/// side to 224, center-crop to 224×224, scale to [0,1], normalize per
/// channel, and lay out as CHW.
pub fn clip_pixels(image: &RgbImage) -> Vec<f32> {
    let (w, h) = image.dimensions();
    let shortest = w.min(h).max(1);
    let scale = CLIP_INPUT_SIZE as f64 / shortest as f64;
    let nw = ((w as f64 * scale).round() as u32).max(CLIP_INPUT_SIZE);
    let nh = ((h as f64 * scale).round() as u32).max(CLIP_INPUT_SIZE);

    let resized = imageops::resize(image, nw, nh, FilterType::Lanczos3);
    let left = (nw - CLIP_INPUT_SIZE) / 2;
    let top = (nh - CLIP_INPUT_SIZE) / 2;
    let cropped = imageops::crop_imm(&resized, left, top, CLIP_INPUT_SIZE, CLIP_INPUT_SIZE).to_image();

    let plane = (CLIP_INPUT_SIZE * CLIP_INPUT_SIZE) as usize;
    let mut out = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in cropped.enumerate_pixels() {
        let offset = (y * CLIP_INPUT_SIZE + x) as usize;
        for channel in 0..3 {
            let value = pixel.0[channel] as f32 / 255.0;
            out[channel * plane + offset] = (value - CLIP_MEAN[channel]) / CLIP_STD[channel];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, color: [u8; 3]) -> RgbImage {
        let mut img = RgbImage::new(w, h);
        for pixel in img.pixels_mut() {
            *pixel = Rgb(color);
        }
        img
    }

    #[test]
    fn small_images_pass_through() {
        let img = solid(100, 60, [1, 2, 3]);
        let out = bound_dimensions(img.clone(), 512);
        assert_eq!(out.dimensions(), (100, 60));
        assert_eq!(out, img);
    }

    #[test]
    fn exact_bound_passes_through() {
        let out = bound_dimensions(solid(512, 300, [0, 0, 0]), 512);
        assert_eq!(out.dimensions(), (512, 300));
    }

    #[test]
    fn oversized_images_shrink_preserving_aspect() {
        let out = bound_dimensions(solid(1024, 512, [0, 0, 0]), 512);
        assert_eq!(out.dimensions(), (512, 256));

        let out = bound_dimensions(solid(300, 900, [0, 0, 0]), 512);
        assert_eq!(out.dimensions().1, 512);
        let ratio = out.dimensions().0 as f64 / out.dimensions().1 as f64;
        assert!((ratio - 300.0 / 900.0).abs() < 0.01);
    }

    #[test]
    fn clip_pixels_has_canonical_shape() {
        let out = clip_pixels(&solid(64, 48, [128, 128, 128]));
        assert_eq!(out.len(), 3 * 224 * 224);
    }

    #[test]
    fn clip_pixels_is_deterministic() {
        let img = solid(90, 120, [200, 50, 10]);
        assert_eq!(clip_pixels(&img), clip_pixels(&img));
    }

    #[test]
    fn clip_pixels_normalizes_channels() {
        // A white image maps each channel to (1 - mean) / std.
        let out = clip_pixels(&solid(224, 224, [255, 255, 255]));
        let plane = 224 * 224;
        for channel in 0..3 {
            let expected = (1.0 - CLIP_MEAN[channel]) / CLIP_STD[channel];
            assert!((out[channel * plane] - expected).abs() < 1e-5);
        }
    }
}
