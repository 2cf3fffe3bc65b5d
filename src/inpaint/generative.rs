use image::{DynamicImage, GrayImage, Rgba, RgbaImage, RgbImage, imageops::FilterType};
use log::debug;

use crate::{
    config::GenerativeSettings,
    error::{RestorationError, Result},
    image_utils::{decode_image, encode_png, resize_mask},
    inpaint::{Inpainter, check_dimensions},
    naming::RestorationMethod,
    service::{EditRequest, ImageEditService},
};

/// Prompted inpainting through a hosted image-edit model.
pub struct GenerativeInpainter<S> {
    service: S,
    prompt: String,
    size: u32,
}

impl<S: ImageEditService> GenerativeInpainter<S> {
    pub fn new(service: S, settings: &GenerativeSettings) -> Self {
        Self {
            service,
            prompt: settings.prompt.clone(),
            size: settings.size,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn request(&self, image: &RgbImage, mask: &GrayImage) -> Result<EditRequest> {
        let square = DynamicImage::ImageRgb8(image.clone()).resize_exact(
            self.size,
            self.size,
            FilterType::Lanczos3,
        );
        let square_mask = resize_mask(mask, self.size, self.size);

        Ok(EditRequest {
            image_png: encode_png(&DynamicImage::ImageRgba8(square.to_rgba8()))?,
            mask_png: Some(encode_png(&DynamicImage::ImageRgba8(edit_mask(&square_mask)))?),
            prompt: self.prompt.clone(),
            size: self.size,
        })
    }
}

/// Damaged pixels become fully transparent, everything else stays opaque.
pub fn edit_mask(mask: &GrayImage) -> RgbaImage {
    let (width, height) = mask.dimensions();
    RgbaImage::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y)[0] > 0 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([0, 0, 0, 255])
        }
    })
}

impl<S: ImageEditService> Inpainter for GenerativeInpainter<S> {
    fn method(&self) -> RestorationMethod {
        RestorationMethod::Diffusion
    }

    fn inpaint(&self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage> {
        check_dimensions(image, mask)?;

        let request = self.request(image, mask)?;
        let bytes = self.service.edit(&request)?;
        let restored = decode_image(&bytes)
            .map_err(|e| RestorationError::Service(format!("undecodable result: {e}")))?;

        let (width, height) = image.dimensions();
        debug!(
            "Generative result {}x{} resized back to {}x{}",
            restored.width(),
            restored.height(),
            width,
            height
        );

        Ok(restored
            .resize_exact(width, height, FilterType::Lanczos3)
            .to_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};
    use std::sync::Mutex;

    struct EchoService {
        seen: Mutex<Vec<EditRequest>>,
    }

    impl ImageEditService for EchoService {
        fn edit(&self, request: &EditRequest) -> Result<Vec<u8>> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(request.image_png.clone())
        }
    }

    struct DownService;

    impl ImageEditService for DownService {
        fn edit(&self, _: &EditRequest) -> Result<Vec<u8>> {
            Err(RestorationError::Service("quota exceeded".into()))
        }
    }

    #[test]
    fn test_result_is_resized_back() {
        let service = EchoService {
            seen: Mutex::new(Vec::new()),
        };
        let inpainter = GenerativeInpainter::new(service, &GenerativeSettings::default());
        let image = RgbImage::from_pixel(40, 30, Rgb([10, 200, 30]));
        let mut mask = GrayImage::new(40, 30);
        mask.put_pixel(5, 5, Luma([255]));

        let restored = inpainter.inpaint(&image, &mask).unwrap();
        assert_eq!(restored.dimensions(), (40, 30));

        let seen = inpainter.service.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].size, 512);
        assert_eq!(seen[0].prompt, "Restore this artwork realistically");
        let mask_png = image::load_from_memory(seen[0].mask_png.as_ref().unwrap()).unwrap();
        assert_eq!((mask_png.width(), mask_png.height()), (512, 512));
    }

    #[test]
    fn test_service_failure_propagates() {
        let inpainter = GenerativeInpainter::new(DownService, &GenerativeSettings::default());
        let result = inpainter.inpaint(&RgbImage::new(8, 8), &GrayImage::new(8, 8));
        assert!(matches!(result, Err(RestorationError::Service(_))));
    }

    #[test]
    fn test_edit_mask_transparency() {
        let mut mask = GrayImage::new(2, 1);
        mask.put_pixel(1, 0, Luma([255]));
        let rgba = edit_mask(&mask);
        assert_eq!(rgba.get_pixel(0, 0)[3], 255);
        assert_eq!(rgba.get_pixel(1, 0)[3], 0);
    }
}
