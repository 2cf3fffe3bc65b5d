use std::{
    fs::File,
    io::{BufWriter, Cursor},
    path::Path,
};

use image::{
    DynamicImage, GrayImage, ImageFormat, Luma, RgbImage,
    codecs::jpeg::JpegEncoder,
    imageops::{self, FilterType},
};
use ndarray::Array2;

use crate::error::{RestorationError, Result};

pub fn rgb_to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let lum =
            (0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64) as u8;
        gray.put_pixel(x, y, Luma([lum]));
    }

    gray
}

pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    Ok(image::open(path)?.to_rgb8())
}

pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<GrayImage> {
    Ok(image::open(path)?.to_luma8())
}

/// Writes `image` in the format implied by the extension; JPEG uses `jpeg_quality`.
pub fn save_rgb<P: AsRef<Path>>(image: &RgbImage, path: P, jpeg_quality: u8) -> Result<()> {
    let path = path.as_ref();
    let format = ImageFormat::from_path(path)?;

    if format == ImageFormat::Jpeg {
        let mut writer = BufWriter::new(File::create(path)?);
        let encoder = JpegEncoder::new_with_quality(&mut writer, jpeg_quality);
        image.write_with_encoder(encoder)?;
    } else {
        image.save_with_format(path, format)?;
    }

    Ok(())
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(RestorationError::InvalidInput("empty image payload".into()));
    }
    image::load_from_memory(bytes)
        .map_err(|e| RestorationError::InvalidInput(format!("not a decodable image: {e}")))
}

/// Largest centered square; odd leftovers favour the top-left edge.
pub fn center_crop_square(image: &DynamicImage) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let side = width.min(height);
    let left = (width - side) / 2;
    let top = (height - side) / 2;

    image.crop_imm(left, top, side, side)
}

pub fn resize_exact(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Source pixels `[floor(i * src / dst), ceil((i + 1) * src / dst))` covered by output index `i`.
fn footprint(i: u32, src: u32, dst: u32) -> (u32, u32) {
    let (i, src, dst) = (i as u64, src as u64, dst as u64);
    let start = i * src / dst;
    let end = ((i + 1) * src).div_ceil(dst).max(start + 1).min(src);
    (start as u32, end as u32)
}

/// An output pixel is marked when any source pixel in its footprint is marked,
/// so thin damage survives downscaling.
pub fn resize_mask(mask: &GrayImage, width: u32, height: u32) -> GrayImage {
    if mask.dimensions() == (width, height) {
        return mask.clone();
    }
    let (src_w, src_h) = mask.dimensions();
    if src_w == 0 || src_h == 0 {
        return GrayImage::new(width, height);
    }

    let columns = (0..width)
        .map(|x| footprint(x, src_w, width))
        .collect::<Vec<_>>();

    GrayImage::from_fn(width, height, |x, y| {
        let (y0, y1) = footprint(y, src_h, height);
        let (x0, x1) = columns[x as usize];
        let marked = (y0..y1).any(|sy| (x0..x1).any(|sx| mask.get_pixel(sx, sy)[0] > 0));
        Luma([if marked { 255 } else { 0 }])
    })
}

pub fn count_marked(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] > 0).count()
}

/// Summed-area table with a leading zero row and column.
pub fn integral(values: &Array2<f64>) -> Array2<f64> {
    let (height, width) = values.dim();
    let mut table = Array2::zeros((height + 1, width + 1));

    for y in 0..height {
        let mut row_sum = 0.0;
        for x in 0..width {
            row_sum += values[[y, x]];
            table[[y + 1, x + 1]] = table[[y, x + 1]] + row_sum;
        }
    }

    table
}

pub fn window_sum(table: &Array2<f64>, x: usize, y: usize, size: usize) -> f64 {
    table[[y + size, x + size]] - table[[y, x + size]] - table[[y + size, x]] + table[[y, x]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_center_crop_landscape() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 200, Rgb([1, 2, 3])));
        let cropped = center_crop_square(&image);
        assert_eq!((cropped.width(), cropped.height()), (200, 200));
    }

    #[test]
    fn test_integral_window_sum() {
        let values = Array2::from_shape_fn((4, 5), |(y, x)| (y * 5 + x) as f64);
        let table = integral(&values);
        let expected = values[[1, 2]] + values[[1, 3]] + values[[2, 2]] + values[[2, 3]];
        assert_eq!(window_sum(&table, 2, 1, 2), expected);
    }

    #[test]
    fn test_downscaled_scratches_keep_every_damaged_footprint() {
        use crate::damage::{DamageTransform, scratch::ScratchTransform};
        use rand::SeedableRng;
        use rand_pcg::Pcg32;

        let (src_w, src_h, dst) = (1600, 1200, 200);
        let mut rng = Pcg32::seed_from_u64(21);
        let (_, mask) = ScratchTransform::new(20, (2, 6)).apply(
            RgbImage::new(src_w, src_h),
            GrayImage::new(src_w, src_h),
            &mut rng,
        );

        let resized = resize_mask(&mask, dst, dst);
        let mut missed = 0;
        for (x, y, pixel) in mask.enumerate_pixels() {
            if pixel[0] > 0 {
                let (ox, oy) = (x * dst / src_w, y * dst / src_h);
                if resized.get_pixel(ox, oy)[0] == 0 {
                    missed += 1;
                }
            }
        }
        assert_eq!(missed, 0);
        assert!(count_marked(&resized) > 0);
    }

    #[test]
    fn test_mask_upscale_stays_binary() {
        let mut mask = GrayImage::new(2, 2);
        mask.put_pixel(1, 0, Luma([7]));
        let resized = resize_mask(&mask, 4, 4);
        assert_eq!(count_marked(&resized), 4);
        assert_eq!(resized.get_pixel(3, 1)[0], 255);
        assert_eq!(resized.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image(b"definitely not a png").unwrap_err();
        assert!(err.is_client_error());
    }
}
