//! Pipeline settings shared by every stage.
//!
//! All sections use `#[serde(default)]`, so a settings file only needs the
//! fields it overrides.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{RestorationError, Result};

pub const DEFAULT_RESTORE_PROMPT: &str = "Restore this artwork realistically";

pub const DEFAULT_UPLOAD_PROMPT: &str = "Restore this photograph while keeping the subject's original features \
and natural colors intact. Remove damage, scratches, and age-related artifacts, \
but do not alter facial characteristics, expressions, or tones. The restored image \
should look as close as possible to the original photo, just cleaned and clear.";

/// On-disk layout of the evaluation data set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataLayout {
    pub raw_dir: PathBuf,
    pub damaged_dir: PathBuf,
    pub masks_dir: PathBuf,
    pub traditional_dir: PathBuf,
    pub deep_dir: PathBuf,
    pub metrics_csv: PathBuf,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::rooted_at(".")
    }
}

impl DataLayout {
    pub fn rooted_at<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            raw_dir: root.join("data/raw"),
            damaged_dir: root.join("data/damaged"),
            masks_dir: root.join("data/masks"),
            traditional_dir: root.join("results/traditional"),
            deep_dir: root.join("results/deep"),
            metrics_csv: root.join("results/metrics_all.csv"),
        }
    }

    pub fn method_dir(&self, method: crate::RestorationMethod) -> &Path {
        if method.is_classical() {
            &self.traditional_dir
        } else {
            &self.deep_dir
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DamageSettings {
    pub variations: u32,
    pub seed: Option<u64>,
    pub max_transforms: usize,
    pub jpeg_quality: u8,
    pub scratch_count: u32,
    pub scratch_thickness: (u32, u32),
    pub hole_count: u32,
    pub hole_size: (u32, u32),
    pub noise_sigma: f64,
    pub noise_weight: f64,
    pub patch_count: u32,
    pub patch_size: (u32, u32),
    pub patch_fade: u8,
}

impl Default for DamageSettings {
    fn default() -> Self {
        Self {
            variations: 5,
            seed: None,
            max_transforms: 3,
            jpeg_quality: 95,
            scratch_count: 20,
            scratch_thickness: (2, 6),
            hole_count: 6,
            hole_size: (80, 200),
            noise_sigma: 50.0,
            noise_weight: 0.4,
            patch_count: 3,
            patch_size: (80, 200),
            patch_fade: 3,
        }
    }
}

impl DamageSettings {
    pub fn validate(&self) -> Result<()> {
        let ranges = [
            ("scratch_thickness", self.scratch_thickness),
            ("hole_size", self.hole_size),
            ("patch_size", self.patch_size),
        ];
        for (name, (min, max)) in ranges {
            if min == 0 || min > max {
                return Err(RestorationError::InvalidParameter(format!(
                    "{name} must satisfy 0 < min <= max, got ({min}, {max})"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.noise_weight) {
            return Err(RestorationError::InvalidParameter(
                "noise_weight must be within [0, 1]".into(),
            ));
        }
        if self.noise_sigma <= 0.0 {
            return Err(RestorationError::InvalidParameter(
                "noise_sigma must be positive".into(),
            ));
        }
        if self.patch_fade == 0 {
            return Err(RestorationError::InvalidParameter(
                "patch_fade must be at least 1".into(),
            ));
        }
        if self.max_transforms == 0 {
            return Err(RestorationError::InvalidParameter(
                "max_transforms must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InpaintSettings {
    pub radius: u32,
    pub jpeg_quality: u8,
}

impl Default for InpaintSettings {
    fn default() -> Self {
        Self {
            radius: 3,
            jpeg_quality: 95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerativeSettings {
    pub prompt: String,
    pub size: u32,
}

impl Default for GenerativeSettings {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_RESTORE_PROMPT.into(),
            size: 512,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvaluationSettings {
    pub comparison_size: u32,
    pub lpips_weights: Option<PathBuf>,
    pub threads: Option<usize>,
    pub write_summary: bool,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            comparison_size: 512,
            lpips_weights: None,
            threads: None,
            write_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceSettings {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "dall-e-2".into(),
            api_key_env: "OPENAI_API_KEY".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadSettings {
    pub target_size: u32,
    pub prompt: String,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            target_size: 1024,
            prompt: DEFAULT_UPLOAD_PROMPT.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub layout: DataLayout,
    pub damage: DamageSettings,
    pub inpaint: InpaintSettings,
    pub generative: GenerativeSettings,
    pub evaluation: EvaluationSettings,
    pub service: ServiceSettings,
    pub upload: UploadSettings,
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str::<Self>(&content)?;
        config.damage.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
