mod common;

use std::fs;

use common::{config_at, create_dirs, gradient};
use restoration_lab::{RestorationLab, RestorationMethod, evaluation::Evaluator};

#[test]
fn test_single_method_row_leaves_other_columns_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_at(dir.path());
    config.evaluation.comparison_size = 64;
    create_dirs(&config.layout);

    let original = gradient(300, 400);
    original.save(config.layout.raw_dir.join("portrait.png")).unwrap();
    original
        .save(config.layout.damaged_dir.join("portrait_damaged_0.png"))
        .unwrap();
    original
        .save(config.layout.traditional_dir.join("portrait_telea_0.png"))
        .unwrap();

    let summary = RestorationLab::new(config.clone()).evaluate().unwrap();
    assert_eq!(summary.rows.len(), 1);

    let row = &summary.rows[0];
    assert_eq!(row.image, "portrait_damaged_0.png");
    let telea = row.get(RestorationMethod::Telea).unwrap();
    assert!(telea.psnr.is_infinite());
    assert!((telea.ssim - 1.0).abs() < 1e-9);
    assert!(telea.lpips.is_none());
    assert!(row.get(RestorationMethod::NavierStokes).is_none());
    assert!(row.get(RestorationMethod::Diffusion).is_none());

    let csv = fs::read_to_string(&config.layout.metrics_csv).unwrap();
    let lines = csv.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("portrait_damaged_0.png,inf,1,,"));
    assert!(lines[1].ends_with(",,,,,,"));

    let summary_path = summary.summary_path.unwrap();
    let json = fs::read_to_string(summary_path).unwrap();
    assert!(json.contains("\"evaluated\": 1"));
}

#[test]
fn test_missing_original_yields_no_row() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_at(dir.path());
    config.evaluation.comparison_size = 32;
    create_dirs(&config.layout);

    gradient(40, 40)
        .save(config.layout.damaged_dir.join("orphan_damaged_0.png"))
        .unwrap();
    gradient(40, 40).save(config.layout.raw_dir.join("kept.png")).unwrap();
    gradient(40, 40)
        .save(config.layout.damaged_dir.join("kept_damaged_0.png"))
        .unwrap();

    let summary = Evaluator::new(config.layout.clone())
        .with_comparison_size(32)
        .with_threads(Some(2))
        .run()
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.rows.len(), 1);
    assert_eq!(summary.rows[0].image, "kept_damaged_0.png");
    assert!(summary.rows[0].scores.is_empty());
}

#[test]
fn test_rows_are_sorted_and_unreadable_outputs_are_blank() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_at(dir.path());
    create_dirs(&config.layout);

    for base in ["zeta", "alpha"] {
        gradient(32, 32)
            .save(config.layout.raw_dir.join(format!("{base}.png")))
            .unwrap();
        gradient(32, 32)
            .save(config.layout.damaged_dir.join(format!("{base}_damaged_0.png")))
            .unwrap();
    }
    fs::write(config.layout.deep_dir.join("alpha_sdxl_0.png"), b"garbage").unwrap();

    let summary = Evaluator::new(config.layout.clone())
        .with_comparison_size(32)
        .with_summary(false)
        .run()
        .unwrap();

    let names = summary.rows.iter().map(|r| r.image.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["alpha_damaged_0.png", "zeta_damaged_0.png"]);
    assert!(summary.rows[0].get(RestorationMethod::Diffusion).is_none());
    assert!(summary.summary_path.is_none());
}

#[test]
fn test_unreadable_original_yields_no_row() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_at(dir.path());
    create_dirs(&config.layout);

    fs::write(config.layout.raw_dir.join("cat.jpg"), b"these bytes are not a jpeg").unwrap();
    gradient(40, 40)
        .save(config.layout.damaged_dir.join("cat_damaged_0.jpg"))
        .unwrap();
    gradient(40, 40)
        .save(config.layout.traditional_dir.join("cat_telea_0.jpg"))
        .unwrap();
    gradient(40, 40).save(config.layout.raw_dir.join("dog.png")).unwrap();
    gradient(40, 40)
        .save(config.layout.damaged_dir.join("dog_damaged_0.png"))
        .unwrap();

    let summary = Evaluator::new(config.layout.clone())
        .with_comparison_size(32)
        .run()
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.rows.len(), 1);
    assert_eq!(summary.rows[0].image, "dog_damaged_0.png");

    let csv = fs::read_to_string(&summary.csv_path).unwrap();
    assert!(!csv.contains("cat_damaged_0"));
    assert_eq!(csv.lines().count(), 2);
}
