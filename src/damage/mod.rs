pub mod detect;
pub mod hole;
pub mod noise;
pub mod scratch;

use std::{fmt, fs, path::Path};

use image::{GrayImage, RgbImage};
use log::{debug, info, warn};
use rand::{Rng, RngCore, SeedableRng, seq::index};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::{
    DamageRecord,
    config::{DamageSettings, DataLayout},
    damage::{hole::HoleTransform, noise::NoiseTransform, scratch::ScratchTransform},
    error::Result,
    image_utils::{load_rgb, save_rgb},
    naming::{FileRole, ImageKey, is_supported_image},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageKind {
    Scratch,
    Hole,
    Noise,
}

impl fmt::Display for DamageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DamageKind::Scratch => "scratch",
            DamageKind::Hole => "hole",
            DamageKind::Noise => "noise",
        };
        f.write_str(name)
    }
}

/// One kind of synthetic damage. Takes the working image and mask by value
/// and hands back the damaged pair, so transforms compose by folding.
pub trait DamageTransform: Send + Sync {
    fn kind(&self) -> DamageKind;

    fn apply(
        &self,
        image: RgbImage,
        mask: GrayImage,
        rng: &mut dyn RngCore,
    ) -> (RgbImage, GrayImage);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SynthesisSummary {
    pub images_processed: usize,
    pub images_skipped: usize,
    pub pairs_written: usize,
    pub seed: u64,
}

pub struct DamageSynthesizer {
    settings: DamageSettings,
    transforms: Vec<Box<dyn DamageTransform>>,
    seed: u64,
}

impl DamageSynthesizer {
    pub fn new(settings: DamageSettings) -> Result<Self> {
        settings.validate()?;

        let transforms: Vec<Box<dyn DamageTransform>> = vec![
            Box::new(ScratchTransform::new(
                settings.scratch_count,
                settings.scratch_thickness,
            )),
            Box::new(HoleTransform::new(settings.hole_count, settings.hole_size)),
            Box::new(
                NoiseTransform::new(settings.noise_sigma, settings.noise_weight)?.with_patches(
                    settings.patch_count,
                    settings.patch_size,
                    settings.patch_fade,
                ),
            ),
        ];

        let seed = settings.seed.unwrap_or_else(rand::random);

        Ok(Self {
            settings,
            transforms,
            seed,
        })
    }

    /// Replaces the transform registry, e.g. to add a new damage kind.
    pub fn with_transforms(mut self, transforms: Vec<Box<dyn DamageTransform>>) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn kinds(&self) -> Vec<DamageKind> {
        self.transforms.iter().map(|t| t.kind()).collect()
    }

    pub fn synthesize(&self, base: &str, image: &RgbImage) -> Vec<DamageRecord> {
        (0..self.settings.variations)
            .map(|variation| self.synthesize_variant(base, variation, image))
            .collect()
    }

    pub fn synthesize_variant(&self, base: &str, variation: u32, image: &RgbImage) -> DamageRecord {
        let mut rng = Pcg32::seed_from_u64(variant_seed(self.seed, base, variation));
        let (width, height) = image.dimensions();

        let available = self.transforms.len();
        let upper = self.settings.max_transforms.min(available);
        let selected = if upper == 0 {
            Vec::new()
        } else {
            let amount = rng.gen_range(1..=upper);
            index::sample(&mut rng, available, amount).into_vec()
        };

        let mut damaged = image.clone();
        let mut mask = GrayImage::new(width, height);
        let mut kinds = Vec::with_capacity(selected.len());

        for i in selected {
            let transform = &self.transforms[i];
            (damaged, mask) = transform.apply(damaged, mask, &mut rng);
            kinds.push(transform.kind());
        }

        DamageRecord {
            key: ImageKey::new(base, variation),
            damaged,
            mask,
            kinds,
        }
    }

    pub fn process_directory(&self, layout: &DataLayout) -> Result<SynthesisSummary> {
        fs::create_dir_all(&layout.damaged_dir)?;
        fs::create_dir_all(&layout.masks_dir)?;

        let mut summary = SynthesisSummary {
            seed: self.seed,
            ..SynthesisSummary::default()
        };
        info!("Synthesizing damage with seed {}", self.seed);

        for path in list_images(&layout.raw_dir)? {
            let Some((base, extension)) = split_name(&path) else {
                continue;
            };

            let image = match load_rgb(&path) {
                Ok(image) => image,
                Err(e) => {
                    warn!("Could not read {}, skipping: {}", path.display(), e);
                    summary.images_skipped += 1;
                    continue;
                }
            };

            for record in self.synthesize(&base, &image) {
                let damaged_name = record.key.file_name(FileRole::Damaged, &extension);
                let mask_name = record.key.file_name(FileRole::Mask, &extension);

                save_rgb(
                    &record.damaged,
                    layout.damaged_dir.join(&damaged_name),
                    self.settings.jpeg_quality,
                )?;
                record.mask.save(layout.masks_dir.join(&mask_name))?;

                debug!(
                    "Saved {} and {} ({})",
                    damaged_name,
                    mask_name,
                    record
                        .kinds
                        .iter()
                        .map(|k| k.to_string())
                        .collect::<Vec<_>>()
                        .join("+")
                );
                summary.pairs_written += 1;
            }

            summary.images_processed += 1;
        }

        info!(
            "Damage synthesis finished: {} images, {} pairs, {} skipped",
            summary.images_processed, summary.pairs_written, summary.images_skipped
        );

        Ok(summary)
    }
}

/// Per-variant seed independent of directory order.
fn variant_seed(seed: u64, base: &str, variation: u32) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64 ^ seed;
    for byte in base.bytes().chain(variation.to_le_bytes()) {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn split_name(path: &Path) -> Option<(String, String)> {
    let base = path.file_stem()?.to_str()?.to_string();
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    Some((base, extension))
}

/// Supported images directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            e.into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"))
        })?;
        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            paths.push(entry.into_path());
        }
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_utils::count_marked;

    fn settings(seed: u64) -> DamageSettings {
        DamageSettings {
            variations: 3,
            seed: Some(seed),
            ..DamageSettings::default()
        }
    }

    #[test]
    fn test_variants_match_source_dimensions() {
        let synthesizer = DamageSynthesizer::new(settings(1)).unwrap();
        let image = RgbImage::new(120, 90);

        let records = synthesizer.synthesize("frame", &image);
        assert_eq!(records.len(), 3);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.key, ImageKey::new("frame", i as u32));
            assert_eq!(record.mask.dimensions(), (120, 90));
            assert_eq!(record.damaged.dimensions(), (120, 90));
            assert!((1..=3).contains(&record.kinds.len()));
        }
    }

    #[test]
    fn test_kinds_are_distinct() {
        let synthesizer = DamageSynthesizer::new(settings(2)).unwrap();
        let image = RgbImage::new(64, 64);

        for record in synthesizer.synthesize("img", &image) {
            let mut kinds = record.kinds.clone();
            kinds.sort_by_key(|k| *k as u8);
            kinds.dedup();
            assert_eq!(kinds.len(), record.kinds.len());
        }
    }

    #[test]
    fn test_same_seed_same_output() {
        let image = RgbImage::from_fn(80, 60, |x, y| image::Rgb([x as u8, y as u8, 90]));
        let a = DamageSynthesizer::new(settings(42)).unwrap().synthesize("a", &image);
        let b = DamageSynthesizer::new(settings(42)).unwrap().synthesize("a", &image);

        for (left, right) in a.iter().zip(b.iter()) {
            assert_eq!(left.damaged, right.damaged);
            assert_eq!(left.mask, right.mask);
            assert_eq!(left.kinds, right.kinds);
        }
    }

    #[test]
    fn test_every_variant_marks_black_image() {
        let synthesizer = DamageSynthesizer::new(settings(77)).unwrap();
        let image = RgbImage::new(100, 100);

        for record in synthesizer.synthesize("black", &image) {
            assert!(count_marked(&record.mask) > 0);
        }
    }

    #[test]
    fn test_variant_seed_depends_on_name_and_index() {
        assert_ne!(variant_seed(1, "cat", 0), variant_seed(1, "cat", 1));
        assert_ne!(variant_seed(1, "cat", 0), variant_seed(1, "dog", 0));
        assert_eq!(variant_seed(1, "cat", 0), variant_seed(1, "cat", 0));
    }
}
