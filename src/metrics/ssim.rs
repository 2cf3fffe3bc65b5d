use image::RgbImage;
use ndarray::Array2;

use crate::{
    error::{RestorationError, Result},
    image_utils::{integral, window_sum},
};

pub struct SsimParams {
    pub window: usize,
    pub k1: f64,
    pub k2: f64,
    pub data_range: f64,
}

impl Default for SsimParams {
    fn default() -> Self {
        Self {
            window: 7,
            k1: 0.01,
            k2: 0.03,
            data_range: 255.0,
        }
    }
}

/// Mean structural similarity with uniform windows.
///
/// Each window pools the samples of all three channels, so colour channels
/// are compared jointly instead of averaging three per-channel scores.
pub fn ssim(reference: &RgbImage, candidate: &RgbImage) -> Result<f64> {
    ssim_with(reference, candidate, &SsimParams::default())
}

pub fn ssim_with(reference: &RgbImage, candidate: &RgbImage, params: &SsimParams) -> Result<f64> {
    if reference.dimensions() != candidate.dimensions() {
        return Err(RestorationError::DimensionMismatch {
            expected: reference.dimensions(),
            actual: candidate.dimensions(),
        });
    }

    let (width, height) = (reference.width() as usize, reference.height() as usize);
    let window = params.window.min(width).min(height);
    if window < 2 {
        return Err(RestorationError::InvalidInput(format!(
            "image {width}x{height} too small for SSIM"
        )));
    }

    let mut sx = Array2::zeros((height, width));
    let mut sy = Array2::zeros((height, width));
    let mut sxx = Array2::zeros((height, width));
    let mut syy = Array2::zeros((height, width));
    let mut sxy = Array2::zeros((height, width));

    for (x, y, a) in reference.enumerate_pixels() {
        let b = candidate.get_pixel(x, y);
        let idx = [y as usize, x as usize];
        for c in 0..3 {
            let (va, vb) = (a[c] as f64, b[c] as f64);
            sx[idx] += va;
            sy[idx] += vb;
            sxx[idx] += va * va;
            syy[idx] += vb * vb;
            sxy[idx] += va * vb;
        }
    }

    let (ix, iy) = (integral(&sx), integral(&sy));
    let (ixx, iyy, ixy) = (integral(&sxx), integral(&syy), integral(&sxy));

    let n = (window * window * 3) as f64;
    let cov_norm = n / (n - 1.0);
    let c1 = (params.k1 * params.data_range).powi(2);
    let c2 = (params.k2 * params.data_range).powi(2);

    let mut total = 0.0;
    let mut count = 0usize;

    for y in 0..=(height - window) {
        for x in 0..=(width - window) {
            let ux = window_sum(&ix, x, y, window) / n;
            let uy = window_sum(&iy, x, y, window) / n;
            let vx = cov_norm * (window_sum(&ixx, x, y, window) / n - ux * ux);
            let vy = cov_norm * (window_sum(&iyy, x, y, window) / n - uy * uy);
            let vxy = cov_norm * (window_sum(&ixy, x, y, window) / n - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            count += 1;
        }
    }

    Ok(total / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_identical_is_one() {
        let image = gradient(32, 24);
        assert!((ssim(&image, &image).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_symmetric_and_bounded() {
        let a = gradient(32, 32);
        let b = RgbImage::from_fn(32, 32, |x, y| Rgb([(x * 3) as u8, 40, (y * 2) as u8]));
        let ab = ssim(&a, &b).unwrap();
        let ba = ssim(&b, &a).unwrap();
        assert!((ab - ba).abs() < 1e-12);
        assert!(ab < 1.0 && ab > -1.0);
    }

    #[test]
    fn test_black_vs_white_is_near_zero() {
        let a = RgbImage::new(16, 16);
        let b = RgbImage::from_pixel(16, 16, Rgb([255, 255, 255]));
        assert!(ssim(&a, &b).unwrap() < 0.01);
    }

    #[test]
    fn test_tiny_images_rejected() {
        let a = RgbImage::new(1, 1);
        assert!(ssim(&a, &a).is_err());
    }
}
