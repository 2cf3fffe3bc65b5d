#![allow(dead_code)]

use std::{fs, path::Path, sync::Mutex};

use image::{GrayImage, Luma, Rgb, RgbImage};
use restoration_lab::{
    config::{DataLayout, PipelineConfig},
    error::{RestorationError, Result},
    service::{EditRequest, ImageEditService},
};

pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x * 3 + y) % 256) as u8])
    })
}

pub fn square_mask(width: u32, height: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        if x >= x0 && x < x0 + side && y >= y0 && y < y0 + side {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

pub fn config_at(root: &Path) -> PipelineConfig {
    PipelineConfig {
        layout: DataLayout::rooted_at(root),
        ..PipelineConfig::default()
    }
}

pub fn create_dirs(layout: &DataLayout) {
    for dir in [
        &layout.raw_dir,
        &layout.damaged_dir,
        &layout.masks_dir,
        &layout.traditional_dir,
        &layout.deep_dir,
    ] {
        fs::create_dir_all(dir).unwrap();
    }
}

/// Returns the submitted image unchanged and records each request.
#[derive(Default)]
pub struct EchoService {
    pub requests: Mutex<Vec<EditRequest>>,
}

impl ImageEditService for EchoService {
    fn edit(&self, request: &EditRequest) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(request.image_png.clone())
    }
}

pub struct UnavailableService;

impl ImageEditService for UnavailableService {
    fn edit(&self, _: &EditRequest) -> Result<Vec<u8>> {
        Err(RestorationError::Service("503 Service Unavailable".into()))
    }
}
