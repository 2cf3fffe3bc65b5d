//! Single-photo restoration: normalize an uploaded image and forward it to
//! the image-edit service.

use std::path::Path;

use image::{DynamicImage, imageops::FilterType};
use log::info;

use crate::{
    config::UploadSettings,
    error::Result,
    image_utils::{center_crop_square, decode_image, encode_png},
    service::{EditRequest, ImageEditService},
};

/// Decodes, center-crops to a square, resizes to `size` and re-encodes as RGBA PNG.
pub fn prepare_upload(bytes: &[u8], size: u32) -> Result<Vec<u8>> {
    let image = decode_image(bytes)?;
    let square = center_crop_square(&image).resize_exact(size, size, FilterType::Lanczos3);
    encode_png(&DynamicImage::ImageRgba8(square.to_rgba8()))
}

pub fn restored_file_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    format!("restored_{stem}.png")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

pub struct UploadHandler<S> {
    service: S,
    settings: UploadSettings,
}

impl<S: ImageEditService> UploadHandler<S> {
    pub fn new(service: S, settings: UploadSettings) -> Self {
        Self { service, settings }
    }

    /// Errors carry their HTTP class via `RestorationError::status_code`.
    pub fn handle(&self, file_name: &str, bytes: &[u8]) -> Result<RestoredUpload> {
        let image_png = prepare_upload(bytes, self.settings.target_size)?;
        info!(
            "Forwarding {} ({} bytes) for restoration",
            file_name,
            image_png.len()
        );

        let request = EditRequest {
            image_png,
            mask_png: None,
            prompt: self.settings.prompt.clone(),
            size: self.settings.target_size,
        };
        let restored = self.service.edit(&request)?;

        Ok(RestoredUpload {
            bytes: restored,
            file_name: restored_file_name(file_name),
        })
    }
}
