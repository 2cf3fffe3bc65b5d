//! Full-reference scoring of restored images against their originals.

use std::path::{Path, PathBuf};

use image::RgbImage;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::{
    MethodScores, MetricRow, RestorationMethod,
    config::DataLayout,
    damage::list_images,
    error::{RestorationError, Result},
    image_utils::{load_rgb, resize_exact},
    metrics::{PerceptualMetric, compare},
    naming::{FileRole, ParsedName},
    report::{SummaryReport, write_csv},
};

pub const SUMMARY_FILE_NAME: &str = "metrics_summary.json";

#[derive(Debug, Clone)]
pub struct EvaluationSummary {
    pub rows: Vec<MetricRow>,
    /// Damaged files that produced no row.
    pub skipped: usize,
    pub csv_path: PathBuf,
    pub summary_path: Option<PathBuf>,
}

pub struct Evaluator {
    layout: DataLayout,
    comparison_size: u32,
    perceptual: Option<Box<dyn PerceptualMetric>>,
    threads: Option<usize>,
    write_summary: bool,
}

impl Evaluator {
    pub fn new(layout: DataLayout) -> Self {
        Self {
            layout,
            comparison_size: 512,
            perceptual: None,
            threads: None,
            write_summary: true,
        }
    }

    pub fn with_comparison_size(mut self, size: u32) -> Self {
        self.comparison_size = size;
        self
    }

    pub fn with_perceptual(mut self, metric: Box<dyn PerceptualMetric>) -> Self {
        self.perceptual = Some(metric);
        self
    }

    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_summary(mut self, enabled: bool) -> Self {
        self.write_summary = enabled;
        self
    }

    /// First raw file, in name order, whose name starts with `base`.
    pub fn find_original<'a>(&self, raw_files: &'a [PathBuf], base: &str) -> Option<&'a PathBuf> {
        let mut candidates = raw_files.iter().filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(base))
        });

        let first = candidates.next()?;
        if let Some(other) = candidates.next() {
            debug!(
                "Several originals match '{}': using {}, ignoring {} and maybe more",
                base,
                first.display(),
                other.display()
            );
        }
        Some(first)
    }

    /// Scores one damaged file; `None` when no usable original exists.
    pub fn evaluate_file(&self, damaged: &ParsedName, raw_files: &[PathBuf]) -> Option<MetricRow> {
        let name = damaged.file_name();

        let Some(original_path) = self.find_original(raw_files, &damaged.key.base) else {
            warn!("No original found for {}", name);
            return None;
        };

        let original = match load_rgb(original_path) {
            Ok(image) => self.to_comparison_size(&image),
            Err(e) => {
                warn!("Could not read original {}: {}", original_path.display(), e);
                return None;
            }
        };

        let mut row = MetricRow::new(name);
        for method in RestorationMethod::ALL {
            let path = self
                .layout
                .method_dir(method)
                .join(damaged.sibling(FileRole::Restored(method)));

            if !path.is_file() {
                continue;
            }

            match self.score(&original, &path) {
                Ok(scores) => {
                    row.scores.insert(method, scores);
                }
                Err(e) => warn!("Could not score {}: {}", path.display(), e),
            }
        }

        Some(row)
    }

    fn score(&self, original: &RgbImage, restored: &Path) -> Result<MethodScores> {
        let restored = self.to_comparison_size(&load_rgb(restored)?);
        compare(original, &restored, self.perceptual.as_deref())
    }

    fn to_comparison_size(&self, image: &RgbImage) -> RgbImage {
        resize_exact(image, self.comparison_size, self.comparison_size)
    }

    fn damaged_files(&self) -> Result<Vec<ParsedName>> {
        Ok(list_images(&self.layout.damaged_dir)?
            .iter()
            .filter_map(|path| ParsedName::from_path(path))
            .filter(|parsed| parsed.role == FileRole::Damaged)
            .collect())
    }

    pub fn collect_rows(&self) -> Result<(Vec<MetricRow>, usize)> {
        let damaged = self.damaged_files()?;
        let raw_files = list_images(&self.layout.raw_dir)?;
        info!("Evaluating {} damaged images", damaged.len());

        let evaluate_all = || {
            damaged
                .par_iter()
                .map(|parsed| self.evaluate_file(parsed, &raw_files))
                .collect::<Vec<_>>()
        };

        let results = match self.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| RestorationError::InvalidParameter(format!("thread pool: {e}")))?
                .install(evaluate_all),
            None => evaluate_all(),
        };

        let skipped = results.iter().filter(|r| r.is_none()).count();
        let mut rows = results.into_iter().flatten().collect::<Vec<_>>();
        rows.sort_by(|a, b| a.image.cmp(&b.image));

        Ok((rows, skipped))
    }

    /// Scores the whole data set and writes the report once every task is done.
    pub fn run(&self) -> Result<EvaluationSummary> {
        let (rows, skipped) = self.collect_rows()?;
        let csv_path = self.layout.metrics_csv.clone();
        write_csv(&csv_path, &rows)?;

        let summary_path = if self.write_summary {
            let path = csv_path.with_file_name(SUMMARY_FILE_NAME);
            SummaryReport::from(rows.as_slice()).write(&path)?;
            Some(path)
        } else {
            None
        };

        info!(
            "Wrote {} rows to {} ({} skipped)",
            rows.len(),
            csv_path.display(),
            skipped
        );

        Ok(EvaluationSummary {
            rows,
            skipped,
            csv_path,
            summary_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_prefix_match_wins() {
        let evaluator = Evaluator::new(DataLayout::default());
        let raw = vec![
            PathBuf::from("raw/bird.png"),
            PathBuf::from("raw/cat.jpg"),
            PathBuf::from("raw/cat_v2.jpg"),
        ];
        assert_eq!(
            evaluator.find_original(&raw, "cat"),
            Some(&PathBuf::from("raw/cat.jpg"))
        );
        assert_eq!(evaluator.find_original(&raw, "dog"), None);
    }
}
