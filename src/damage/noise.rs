use image::{GrayImage, Luma, RgbImage};
use rand::{Rng, RngCore};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::{
    damage::{DamageKind, DamageTransform},
    error::{RestorationError, Result},
};

const MID_GRAY: f64 = 128.0;

/// Whole-frame Gaussian grain plus a few faded patches.
///
/// Only the faded patches are recorded in the mask; the grain covers the whole
/// frame and is not something an inpainter is expected to fill.
pub struct NoiseTransform {
    distribution: Normal,
    weight: f64,
    patch_count: u32,
    patch_size: (u32, u32),
    fade: u8,
}

impl NoiseTransform {
    pub fn new(sigma: f64, weight: f64) -> Result<Self> {
        let distribution = Normal::new(0.0, sigma)
            .map_err(|e| RestorationError::InvalidParameter(format!("noise sigma: {e}")))?;

        Ok(Self {
            distribution,
            weight,
            patch_count: 3,
            patch_size: (80, 200),
            fade: 3,
        })
    }

    pub fn with_patches(mut self, count: u32, size: (u32, u32), fade: u8) -> Self {
        self.patch_count = count;
        self.patch_size = size;
        self.fade = fade.max(1);
        self
    }

    /// Grain sample centred on mid-gray.
    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        let u = rng.gen_range(f64::EPSILON..1.0);
        (MID_GRAY + self.distribution.inverse_cdf(u)).clamp(0.0, 255.0)
    }

    fn blend(&self, image: &mut RgbImage, rng: &mut dyn RngCore) {
        let keep = 1.0 - self.weight;

        for pixel in image.pixels_mut() {
            for channel in pixel.0.iter_mut() {
                let noise = self.sample(rng);
                let value = keep * *channel as f64 + self.weight * noise;
                *channel = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    fn fade_patches(&self, image: &mut RgbImage, mask: &mut GrayImage, rng: &mut dyn RngCore) {
        let (width, height) = image.dimensions();

        for _ in 0..self.patch_count {
            let x1 = rng.gen_range(0..=width / 2);
            let y1 = rng.gen_range(0..=height / 2);
            let x2 = width.min(x1 + rng.gen_range(self.patch_size.0..=self.patch_size.1));
            let y2 = height.min(y1 + rng.gen_range(self.patch_size.0..=self.patch_size.1));

            for y in y1..y2 {
                for x in x1..x2 {
                    let pixel = image.get_pixel_mut(x, y);
                    for channel in pixel.0.iter_mut() {
                        *channel /= self.fade;
                    }
                    mask.put_pixel(x, y, Luma([255]));
                }
            }
        }
    }
}

impl DamageTransform for NoiseTransform {
    fn kind(&self) -> DamageKind {
        DamageKind::Noise
    }

    fn apply(
        &self,
        mut image: RgbImage,
        mut mask: GrayImage,
        rng: &mut dyn RngCore,
    ) -> (RgbImage, GrayImage) {
        self.blend(&mut image, rng);
        self.fade_patches(&mut image, &mut mask, rng);
        (image, mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_utils::count_marked;
    use image::Rgb;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_zero_patches_leave_mask_empty() {
        let transform = NoiseTransform::new(50.0, 0.4)
            .unwrap()
            .with_patches(0, (80, 200), 3);
        let mut rng = Pcg32::seed_from_u64(5);
        let (image, mask) = transform.apply(
            RgbImage::from_pixel(32, 32, Rgb([120, 120, 120])),
            GrayImage::new(32, 32),
            &mut rng,
        );

        assert_eq!(count_marked(&mask), 0);
        assert!(image.pixels().any(|p| *p != Rgb([72, 72, 72])));
    }

    #[test]
    fn test_grain_is_centred_on_mid_gray() {
        let transform = NoiseTransform::new(50.0, 0.4)
            .unwrap()
            .with_patches(0, (80, 200), 3);
        let mut rng = Pcg32::seed_from_u64(17);
        let (image, _) = transform.apply(
            RgbImage::from_pixel(64, 64, Rgb([128, 128, 128])),
            GrayImage::new(64, 64),
            &mut rng,
        );

        let samples = image.as_raw();
        let mean = samples.iter().map(|&v| v as f64).sum::<f64>() / samples.len() as f64;
        assert!((mean - 128.0).abs() < 1.5, "mean {mean}");
    }

    #[test]
    fn test_patches_are_marked() {
        let transform = NoiseTransform::new(50.0, 0.4).unwrap();
        let mut rng = Pcg32::seed_from_u64(9);
        let (_, mask) = transform.apply(RgbImage::new(50, 40), GrayImage::new(50, 40), &mut rng);

        assert!(count_marked(&mask) > 0);
    }

    #[test]
    fn test_rejects_non_positive_sigma() {
        assert!(NoiseTransform::new(0.0, 0.4).is_err());
    }
}
