use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::{
    drawing::{BresenhamLineIter, draw_filled_rect_mut},
    rect::Rect,
};
use rand::{Rng, RngCore};

use crate::damage::{DamageKind, DamageTransform};

/// Straight light scratches, each `thickness` pixels wide.
pub struct ScratchTransform {
    count: u32,
    thickness: (u32, u32),
    color: Rgb<u8>,
}

impl ScratchTransform {
    pub fn new(count: u32, thickness: (u32, u32)) -> Self {
        Self {
            count,
            thickness,
            color: Rgb([255, 255, 255]),
        }
    }

    pub fn with_color(mut self, color: Rgb<u8>) -> Self {
        self.color = color;
        self
    }
}

impl DamageTransform for ScratchTransform {
    fn kind(&self) -> DamageKind {
        DamageKind::Scratch
    }

    fn apply(
        &self,
        mut image: RgbImage,
        mut mask: GrayImage,
        rng: &mut dyn RngCore,
    ) -> (RgbImage, GrayImage) {
        let (width, height) = image.dimensions();

        for _ in 0..self.count {
            let start = (rng.gen_range(0..width) as f32, rng.gen_range(0..height) as f32);
            let end = (rng.gen_range(0..width) as f32, rng.gen_range(0..height) as f32);
            let thickness = rng.gen_range(self.thickness.0..=self.thickness.1);
            stroke(&mut image, &mut mask, start, end, thickness, self.color);
        }

        (image, mask)
    }
}

/// Sweeps a `thickness` x `thickness` square brush along the line.
fn stroke(
    image: &mut RgbImage,
    mask: &mut GrayImage,
    start: (f32, f32),
    end: (f32, f32),
    thickness: u32,
    color: Rgb<u8>,
) {
    let thickness = thickness.max(1);
    let offset = (thickness / 2) as i32;

    for (x, y) in BresenhamLineIter::new(start, end) {
        let brush = Rect::at(x - offset, y - offset).of_size(thickness, thickness);
        draw_filled_rect_mut(image, brush, color);
        draw_filled_rect_mut(mask, brush, Luma([255]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_utils::count_marked;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_stroke_width_matches_thickness() {
        for thickness in 2..=6 {
            let mut image = RgbImage::new(40, 20);
            let mut mask = GrayImage::new(40, 20);
            stroke(
                &mut image,
                &mut mask,
                (5.0, 10.0),
                (30.0, 10.0),
                thickness,
                Rgb([255, 255, 255]),
            );

            let column = (0..20).filter(|&y| mask.get_pixel(15, y)[0] > 0).count();
            assert_eq!(column as u32, thickness);
        }
    }

    #[test]
    fn test_scratches_mark_mask_and_image_together() {
        let transform = ScratchTransform::new(20, (2, 6));
        let mut rng = Pcg32::seed_from_u64(11);
        let (image, mask) = transform.apply(
            RgbImage::new(64, 48),
            GrayImage::new(64, 48),
            &mut rng,
        );

        assert!(count_marked(&mask) > 0);
        for (x, y, pixel) in mask.enumerate_pixels() {
            if pixel[0] == 255 {
                assert_eq!(image.get_pixel(x, y), &Rgb([255, 255, 255]));
            }
        }
    }
}
