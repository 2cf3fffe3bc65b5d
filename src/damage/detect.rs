use image::{GrayImage, Luma, RgbImage};

use crate::image_utils::rgb_to_gray;

pub const DEFAULT_DETECTION_THRESHOLD: u8 = 180;

/// Marks bright defects (scratches, dust, tears) of a real damaged photo.
pub fn detect_damage_mask(image: &RgbImage, threshold: u8) -> GrayImage {
    let gray = rgb_to_gray(image);
    let (width, height) = gray.dimensions();
    let mut mask = GrayImage::new(width, height);

    for (x, y, pixel) in gray.enumerate_pixels() {
        if pixel[0] > threshold {
            mask.put_pixel(x, y, Luma([255]));
        }
    }

    mask
}
