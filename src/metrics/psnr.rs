use image::RgbImage;

use crate::error::{RestorationError, Result};

const MAX_VALUE: f64 = 255.0;

pub fn mean_squared_error(reference: &RgbImage, candidate: &RgbImage) -> Result<f64> {
    if reference.dimensions() != candidate.dimensions() {
        return Err(RestorationError::DimensionMismatch {
            expected: reference.dimensions(),
            actual: candidate.dimensions(),
        });
    }

    let samples = reference.as_raw().len();
    if samples == 0 {
        return Err(RestorationError::InvalidInput("empty image".into()));
    }

    let sum = reference
        .as_raw()
        .iter()
        .zip(candidate.as_raw().iter())
        .map(|(&a, &b)| {
            let diff = a as f64 - b as f64;
            diff * diff
        })
        .sum::<f64>();

    Ok(sum / samples as f64)
}

/// Peak signal-to-noise ratio in dB over all channels; identical images give `+inf`.
pub fn psnr(reference: &RgbImage, candidate: &RgbImage) -> Result<f64> {
    let mse = mean_squared_error(reference, candidate)?;
    if mse == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(10.0 * (MAX_VALUE * MAX_VALUE / mse).log10())
}
