pub mod lpips;
pub mod psnr;
pub mod ssim;

use image::RgbImage;
use log::warn;

use crate::{MethodScores, error::Result};

/// Learned perceptual distance; lower means more similar.
pub trait PerceptualMetric: Send + Sync {
    fn distance(&self, reference: &RgbImage, candidate: &RgbImage) -> Result<f64>;
}

/// Full-reference comparison of two equally sized images.
///
/// A failing perceptual model only blanks the LPIPS value.
pub fn compare(
    reference: &RgbImage,
    candidate: &RgbImage,
    perceptual: Option<&dyn PerceptualMetric>,
) -> Result<MethodScores> {
    let psnr = psnr::psnr(reference, candidate)?;
    let ssim = ssim::ssim(reference, candidate)?;

    let lpips = match perceptual {
        Some(model) => match model.distance(reference, candidate) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("LPIPS failed: {}", e);
                None
            }
        },
        None => None,
    };

    Ok(MethodScores { psnr, ssim, lpips })
}
