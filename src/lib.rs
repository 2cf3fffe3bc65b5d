use std::{collections::BTreeMap, path::Path};

use image::{GrayImage, RgbImage};
use serde::Serialize;

use crate::{
    config::PipelineConfig,
    damage::{DamageKind, DamageSynthesizer, SynthesisSummary},
    error::Result,
    evaluation::{EvaluationSummary, Evaluator},
    inpaint::{Inpainter, classical_pair, generative::GenerativeInpainter},
    metrics::{PerceptualMetric, lpips::LpipsModel},
    runner::{RestorationRunner, RunSummary},
    service::ImageEditService,
};

pub mod config;
pub mod damage;
pub mod error;
pub mod evaluation;
pub mod image_utils;
pub mod inpaint;
pub mod metrics;
pub mod naming;
pub mod report;
pub mod runner;
pub mod service;
pub mod upload;

pub use naming::{FileRole, ImageKey, RestorationMethod};

/// Entry point tying the pipeline stages to one configuration.
pub struct RestorationLab {
    config: PipelineConfig,
}

impl RestorationLab {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(PipelineConfig::load(path)?))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn synthesize_damage(&self) -> Result<SynthesisSummary> {
        let synthesizer = DamageSynthesizer::new(self.config.damage.clone())?;
        synthesizer.process_directory(&self.config.layout)
    }

    pub fn restore_classical(&self) -> Result<RunSummary> {
        let runner = RestorationRunner::new(
            classical_pair(self.config.inpaint.radius),
            &self.config.layout.traditional_dir,
        )
        .with_jpeg_quality(self.config.inpaint.jpeg_quality);

        runner.run(&self.config.layout.damaged_dir, &self.config.layout.masks_dir)
    }

    pub fn restore_generative<S: ImageEditService + 'static>(&self, service: S) -> Result<RunSummary> {
        let inpainter: Box<dyn Inpainter> =
            Box::new(GenerativeInpainter::new(service, &self.config.generative));
        let runner = RestorationRunner::new(vec![inpainter], &self.config.layout.deep_dir)
            .with_jpeg_quality(self.config.inpaint.jpeg_quality);

        runner.run(&self.config.layout.damaged_dir, &self.config.layout.masks_dir)
    }

    pub fn evaluate(&self) -> Result<EvaluationSummary> {
        let settings = &self.config.evaluation;
        let perceptual = match &settings.lpips_weights {
            Some(path) => Some(Box::new(LpipsModel::load(path)?) as Box<dyn PerceptualMetric>),
            None => None,
        };

        let evaluator = Evaluator::new(self.config.layout.clone())
            .with_comparison_size(settings.comparison_size)
            .with_threads(settings.threads)
            .with_summary(settings.write_summary);

        match perceptual {
            Some(model) => evaluator.with_perceptual(model).run(),
            None => evaluator.run(),
        }
    }
}

/// One synthesized damaged image with its mask.
#[derive(Debug, Clone)]
pub struct DamageRecord {
    pub key: ImageKey,
    pub damaged: RgbImage,
    pub mask: GrayImage,
    pub kinds: Vec<DamageKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MethodScores {
    pub psnr: f64,
    pub ssim: f64,
    pub lpips: Option<f64>,
}

/// Metrics for one damaged file; methods without a readable output are absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub image: String,
    pub scores: BTreeMap<RestorationMethod, MethodScores>,
}

impl MetricRow {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            scores: BTreeMap::new(),
        }
    }

    pub fn get(&self, method: RestorationMethod) -> Option<&MethodScores> {
        self.scores.get(&method)
    }
}
