use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};
use rand::{Rng, RngCore};

use crate::damage::{DamageKind, DamageTransform};

/// Solid dark rectangles punched into the frame.
pub struct HoleTransform {
    count: u32,
    size: (u32, u32),
    color: Rgb<u8>,
}

impl HoleTransform {
    pub fn new(count: u32, size: (u32, u32)) -> Self {
        Self {
            count,
            size,
            color: Rgb([0, 0, 0]),
        }
    }

    pub fn with_color(mut self, color: Rgb<u8>) -> Self {
        self.color = color;
        self
    }

    /// Top-left corner range shrinks by the largest extent so holes mostly
    /// stay inside; frames smaller than that extent pin the corner to 0.
    fn sample_origin(&self, dim: u32, rng: &mut dyn RngCore) -> u32 {
        let limit = dim.saturating_sub(self.size.1);
        rng.gen_range(0..=limit)
    }
}

impl DamageTransform for HoleTransform {
    fn kind(&self) -> DamageKind {
        DamageKind::Hole
    }

    fn apply(
        &self,
        mut image: RgbImage,
        mut mask: GrayImage,
        rng: &mut dyn RngCore,
    ) -> (RgbImage, GrayImage) {
        let (width, height) = image.dimensions();

        for _ in 0..self.count {
            let x = self.sample_origin(width, rng);
            let y = self.sample_origin(height, rng);
            let w = rng.gen_range(self.size.0..=self.size.1);
            let h = rng.gen_range(self.size.0..=self.size.1);

            let rect = Rect::at(x as i32, y as i32).of_size(w, h);
            draw_filled_rect_mut(&mut image, rect, self.color);
            draw_filled_rect_mut(&mut mask, rect, Luma([255]));
        }

        (image, mask)
    }
}
