//! Structured identifiers for every file the pipeline reads or writes.
//!
//! Stages pass [`ImageKey`] values around; the `{base}_{tag}_{index}.{ext}`
//! filename is only how a key is serialized on disk.

use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RestorationMethod {
    Telea,
    NavierStokes,
    Diffusion,
}

impl RestorationMethod {
    pub const ALL: [RestorationMethod; 3] = [
        RestorationMethod::Telea,
        RestorationMethod::NavierStokes,
        RestorationMethod::Diffusion,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            RestorationMethod::Telea => "telea",
            RestorationMethod::NavierStokes => "navier",
            RestorationMethod::Diffusion => "sdxl",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.tag() == tag)
    }

    pub fn is_classical(&self) -> bool {
        !matches!(self, RestorationMethod::Diffusion)
    }
}

impl fmt::Display for RestorationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileRole {
    Damaged,
    Mask,
    Restored(RestorationMethod),
}

impl FileRole {
    pub fn tag(&self) -> &'static str {
        match self {
            FileRole::Damaged => "damaged",
            FileRole::Mask => "mask",
            FileRole::Restored(method) => method.tag(),
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "damaged" => Some(FileRole::Damaged),
            "mask" => Some(FileRole::Mask),
            other => RestorationMethod::from_tag(other).map(FileRole::Restored),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImageKey {
    pub base: String,
    pub variation: u32,
}

impl ImageKey {
    pub fn new(base: impl Into<String>, variation: u32) -> Self {
        Self {
            base: base.into(),
            variation,
        }
    }

    /// Masks are always PNG regardless of `extension`.
    pub fn file_name(&self, role: FileRole, extension: &str) -> String {
        let extension = match role {
            FileRole::Mask => "png",
            _ => extension,
        };
        format!("{}_{}_{}.{}", self.base, role.tag(), self.variation, extension)
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.base, self.variation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub key: ImageKey,
    pub role: FileRole,
    pub extension: String,
}

impl ParsedName {
    /// Splits from the right so base names may contain underscores.
    pub fn parse(file_name: &str) -> Option<Self> {
        let (stem, extension) = file_name.rsplit_once('.')?;
        let (rest, index) = stem.rsplit_once('_')?;
        let variation = index.parse::<u32>().ok()?;
        let (base, tag) = rest.rsplit_once('_')?;

        if base.is_empty() || extension.is_empty() {
            return None;
        }

        let role = FileRole::from_tag(tag)?;

        Some(Self {
            key: ImageKey::new(base, variation),
            role,
            extension: extension.to_string(),
        })
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(Self::parse)
    }

    pub fn file_name(&self) -> String {
        self.key.file_name(self.role, &self.extension)
    }

    /// Name of the same image under another role, keeping the extension.
    pub fn sibling(&self, role: FileRole) -> String {
        self.key.file_name(role, &self.extension)
    }
}

/// Extensions accepted as source or damaged images.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}
