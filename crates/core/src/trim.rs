//! Uniform-background auto-crop for logo images.

use image::{DynamicImage, GenericImageView};

/// Bias subtracted from the doubled per-channel difference, out of a
/// 255 max intensity. Suppresses near-background noise so only clearly
/// different pixels count as foreground.
const FOREGROUND_BIAS: i16 = 100;

/// Crop `image` to the bounding box of its non-background content.
///
/// The pixel at (0, 0) is taken as the background color. A pixel is
/// foreground when `2 * |channel - background_channel| - 100` stays
/// above zero on any RGBA channel. Returns `None` when no foreground
/// pixel exists (the image is uniformly the background color); the
/// caller decides what a logo with nothing to crop means.
pub fn trim_background(image: &DynamicImage) -> Option<DynamicImage> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let rgba = image.to_rgba8();
    let background = *rgba.get_pixel(0, 0);

    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let foreground = pixel
            .0
            .iter()
            .zip(background.0.iter())
            .any(|(&c, &b)| 2 * (c as i16 - b as i16).abs() - FOREGROUND_BIAS > 0);

        if foreground {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if min_x == u32::MAX {
        return None;
    }

    Some(image.crop_imm(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn test_uniform_image_has_no_crop() {
        let img = DynamicImage::ImageRgba8(solid(10, 10, [255, 255, 255, 255]));
        assert!(trim_background(&img).is_none());
    }

    #[test]
    fn test_embedded_square_crops_tight() {
        let mut raw = solid(10, 10, [255, 255, 255, 255]);
        for y in 4..6 {
            for x in 3..5 {
                raw.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }
        let cropped = trim_background(&DynamicImage::ImageRgba8(raw)).unwrap();
        assert_eq!(cropped.dimensions(), (2, 2));
        assert_eq!(cropped.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_near_background_noise_ignored() {
        // Differences of 50 or less per channel fall under the bias
        let mut raw = solid(8, 8, [200, 200, 200, 255]);
        raw.put_pixel(1, 1, Rgba([230, 200, 200, 255]));
        raw.put_pixel(5, 5, Rgba([255, 200, 200, 255]));
        let cropped = trim_background(&DynamicImage::ImageRgba8(raw)).unwrap();
        // Only the 55-difference pixel at (5,5) survives
        assert_eq!(cropped.dimensions(), (1, 1));
    }

    #[test]
    fn test_foreground_touching_edges_keeps_full_size() {
        let mut raw = solid(4, 4, [0, 0, 0, 255]);
        for x in 0..4 {
            raw.put_pixel(x, 3, Rgba([255, 255, 255, 255]));
        }
        let cropped = trim_background(&DynamicImage::ImageRgba8(raw)).unwrap();
        assert_eq!(cropped.dimensions(), (4, 1));
    }

    #[test]
    fn test_zero_sized_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        assert!(trim_background(&img).is_none());
    }
}
