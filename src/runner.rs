use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{GrayImage, RgbImage};
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    damage::list_images,
    error::Result,
    image_utils::{load_mask, load_rgb, save_rgb},
    inpaint::{Inpainter, check_dimensions},
    naming::{FileRole, ParsedName},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Damaged files that reached the inpainters.
    pub processed: usize,
    /// Files without a mask or with unusable input.
    pub skipped: usize,
    /// Individual inpainter outputs that could not be produced.
    pub failed: usize,
    pub written: usize,
}

/// Applies every configured inpainter to each damaged/mask pair in a directory.
pub struct RestorationRunner {
    inpainters: Vec<Box<dyn Inpainter>>,
    output_dir: PathBuf,
    jpeg_quality: u8,
}

impl RestorationRunner {
    pub fn new<P: AsRef<Path>>(inpainters: Vec<Box<dyn Inpainter>>, output_dir: P) -> Self {
        Self {
            inpainters,
            output_dir: output_dir.as_ref().to_path_buf(),
            jpeg_quality: 95,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn run(&self, damaged_dir: &Path, masks_dir: &Path) -> Result<RunSummary> {
        fs::create_dir_all(&self.output_dir)?;
        let mut summary = RunSummary::default();

        for path in list_images(damaged_dir)? {
            let Some(parsed) = ParsedName::from_path(&path) else {
                continue;
            };
            if parsed.role != FileRole::Damaged {
                continue;
            }

            let mask_path = masks_dir.join(parsed.sibling(FileRole::Mask));
            if !mask_path.is_file() {
                debug!("No mask for {}, skipping", path.display());
                summary.skipped += 1;
                continue;
            }

            let (image, mask) = match load_pair(&path, &mask_path) {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    summary.skipped += 1;
                    continue;
                }
            };

            summary.processed += 1;
            for inpainter in &self.inpainters {
                let method = inpainter.method();
                let output = self.output_dir.join(parsed.sibling(FileRole::Restored(method)));

                let written = inpainter
                    .inpaint(&image, &mask)
                    .and_then(|restored| save_rgb(&restored, &output, self.jpeg_quality));

                match written {
                    Ok(()) => {
                        debug!("Wrote {}", output.display());
                        summary.written += 1;
                    }
                    Err(e) => {
                        warn!("{} failed on {}: {}", method, path.display(), e);
                        summary.failed += 1;
                    }
                }
            }
        }

        info!(
            "Restoration into {} finished: {} processed, {} written, {} skipped, {} failed",
            self.output_dir.display(),
            summary.processed,
            summary.written,
            summary.skipped,
            summary.failed
        );

        Ok(summary)
    }
}

fn load_pair(image_path: &Path, mask_path: &Path) -> Result<(RgbImage, GrayImage)> {
    let image = load_rgb(image_path)?;
    let mask = load_mask(mask_path)?;
    check_dimensions(&image, &mask)?;
    Ok((image, mask))
}
