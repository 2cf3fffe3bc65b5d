use std::{fs, io::Write, path::Path};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::{
    MethodScores, MetricRow,
    error::{RestorationError, Result},
    naming::RestorationMethod,
};

pub const METRIC_COLUMNS: [&str; 3] = ["psnr", "ssim", "lpips"];

pub fn csv_header() -> Vec<String> {
    let mut header = vec!["image".to_string()];
    for method in RestorationMethod::ALL {
        for metric in METRIC_COLUMNS {
            header.push(format!("{}_{}", method.tag(), metric));
        }
    }
    header
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_infinite() && v > 0.0 => "inf".into(),
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

fn csv_record(row: &MetricRow) -> Vec<String> {
    let mut record = vec![row.image.clone()];
    for method in RestorationMethod::ALL {
        let scores = row.scores.get(&method);
        record.push(format_value(scores.map(|s| s.psnr)));
        record.push(format_value(scores.map(|s| s.ssim)));
        record.push(format_value(scores.and_then(|s| s.lpips)));
    }
    record
}

/// Writes into a temporary file beside `path`, then renames it into place.
/// Readers see either the old file or the complete new one.
pub fn write_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(contents)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

pub fn render_csv(rows: &[MetricRow]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(csv_header())?;
    for row in rows {
        writer.write_record(csv_record(row))?;
    }
    writer
        .into_inner()
        .map_err(|e| RestorationError::Io(e.into_error()))
}

pub fn write_csv<P: AsRef<Path>>(path: P, rows: &[MetricRow]) -> Result<()> {
    write_atomic(path, &render_csv(rows)?)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MethodSummary {
    pub method: RestorationMethod,
    pub evaluated: usize,
    pub mean_psnr: Option<f64>,
    pub mean_ssim: Option<f64>,
    pub mean_lpips: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummaryReport {
    pub rows: usize,
    pub methods: Vec<MethodSummary>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

impl From<&[MetricRow]> for SummaryReport {
    fn from(rows: &[MetricRow]) -> Self {
        let methods = RestorationMethod::ALL
            .into_iter()
            .map(|method| {
                let scores = rows
                    .iter()
                    .filter_map(|row| row.scores.get(&method))
                    .collect::<Vec<&MethodScores>>();

                MethodSummary {
                    method,
                    evaluated: scores.len(),
                    mean_psnr: mean(scores.iter().map(|s| s.psnr).filter(|v| v.is_finite())),
                    mean_ssim: mean(scores.iter().map(|s| s.ssim)),
                    mean_lpips: mean(scores.iter().filter_map(|s| s.lpips)),
                }
            })
            .collect();

        Self {
            rows: rows.len(),
            methods,
        }
    }
}

impl SummaryReport {
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_atomic(path, self.to_json()?.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn row(image: &str, telea: Option<MethodScores>) -> MetricRow {
        let mut scores = BTreeMap::new();
        if let Some(s) = telea {
            scores.insert(RestorationMethod::Telea, s);
        }
        MetricRow {
            image: image.into(),
            scores,
        }
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(
            csv_header().join(","),
            "image,telea_psnr,telea_ssim,telea_lpips,navier_psnr,navier_ssim,navier_lpips,sdxl_psnr,sdxl_ssim,sdxl_lpips"
        );
    }

    #[test]
    fn test_missing_methods_are_empty_cells() {
        let rows = vec![row(
            "cat_damaged_0.jpg",
            Some(MethodScores {
                psnr: 30.5,
                ssim: 0.9,
                lpips: None,
            }),
        )];
        let csv = String::from_utf8(render_csv(&rows).unwrap()).unwrap();
        let line = csv.lines().nth(1).unwrap();
        assert_eq!(line, "cat_damaged_0.jpg,30.5,0.9,,,,,,,");
    }

    #[test]
    fn test_infinite_psnr_written_as_inf() {
        let rows = vec![row(
            "a_damaged_1.png",
            Some(MethodScores {
                psnr: f64::INFINITY,
                ssim: 1.0,
                lpips: Some(0.0),
            }),
        )];
        let csv = String::from_utf8(render_csv(&rows).unwrap()).unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("a_damaged_1.png,inf,1,0,"));
    }

    #[test]
    fn test_summary_skips_infinite_psnr() {
        let rows = vec![
            row(
                "a",
                Some(MethodScores {
                    psnr: f64::INFINITY,
                    ssim: 1.0,
                    lpips: None,
                }),
            ),
            row(
                "b",
                Some(MethodScores {
                    psnr: 20.0,
                    ssim: 0.5,
                    lpips: Some(0.25),
                }),
            ),
            row("c", None),
        ];
        let summary = SummaryReport::from(rows.as_slice());
        let telea = &summary.methods[0];
        assert_eq!(summary.rows, 3);
        assert_eq!(telea.evaluated, 2);
        assert_eq!(telea.mean_psnr, Some(20.0));
        assert_eq!(telea.mean_ssim, Some(0.75));
        assert_eq!(telea.mean_lpips, Some(0.25));
        assert_eq!(summary.methods[2].evaluated, 0);
        assert_eq!(summary.methods[2].mean_ssim, None);
    }

    #[test]
    fn test_atomic_write_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/metrics.csv");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
