use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{LevelFilter, info};
use restoration_lab::{
    RestorationLab,
    config::{DataLayout, PipelineConfig},
    damage::detect::{DEFAULT_DETECTION_THRESHOLD, detect_damage_mask},
    image_utils::load_rgb,
    service::openai::OpenAiImageClient,
    upload::UploadHandler,
};

/// Synthesize damage, restore it, and score the restorations.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Pipeline settings JSON (defaults to built-in values).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project root holding `data/` and `results/`.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Enable debug logging unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write damaged variants and masks for every raw image.
    Damage {
        /// Override the number of variants per image.
        #[arg(long)]
        variations: Option<u32>,

        /// Fix the random seed for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Restore damaged images with Telea and Navier-Stokes inpainting.
    Inpaint {
        /// Override the neighbourhood radius.
        #[arg(long)]
        radius: Option<u32>,
    },
    /// Restore damaged images through the hosted image-edit model.
    Generate {
        /// Override the restoration prompt.
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Score every restoration and write the metrics CSV.
    Evaluate {
        /// LPIPS(alex) weights in safetensors format.
        #[arg(long)]
        lpips_weights: Option<PathBuf>,

        /// Worker threads (defaults to one per core).
        #[arg(long)]
        threads: Option<usize>,

        /// Skip the JSON summary next to the CSV.
        #[arg(long)]
        no_summary: bool,
    },
    /// Restore a single photograph through the hosted model.
    Restore {
        /// Photo to restore.
        input: PathBuf,

        /// Destination (defaults to `restored_{stem}.png` beside the input).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Derive a damage mask from bright pixels of an image.
    DetectMask {
        input: PathBuf,

        output: PathBuf,

        #[arg(long, default_value_t = DEFAULT_DETECTION_THRESHOLD)]
        threshold: u8,
    },
}

fn init_logging(default_filter: LevelFilter) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    if builder.try_init().is_err() {
        // Logger already initialized.
    }
}

fn load_config(common: &CommonArgs) -> Result<PipelineConfig> {
    let mut config = match common.config.as_ref() {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = common.root.as_ref() {
        config.layout = DataLayout::rooted_at(root);
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.common.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    let mut config = load_config(&cli.common)?;

    match cli.command {
        Command::Damage { variations, seed } => {
            if let Some(variations) = variations {
                config.damage.variations = variations;
            }
            if seed.is_some() {
                config.damage.seed = seed;
            }
            let summary = RestorationLab::new(config)
                .synthesize_damage()
                .context("damage synthesis failed")?;
            info!(
                "{} pairs from {} images (seed {})",
                summary.pairs_written, summary.images_processed, summary.seed
            );
        }
        Command::Inpaint { radius } => {
            if let Some(radius) = radius {
                config.inpaint.radius = radius;
            }
            RestorationLab::new(config)
                .restore_classical()
                .context("classical restoration failed")?;
        }
        Command::Generate { prompt } => {
            if let Some(prompt) = prompt {
                config.generative.prompt = prompt;
            }
            let client = OpenAiImageClient::from_env(&config.service)?;
            RestorationLab::new(config)
                .restore_generative(client)
                .context("generative restoration failed")?;
        }
        Command::Evaluate {
            lpips_weights,
            threads,
            no_summary,
        } => {
            if lpips_weights.is_some() {
                config.evaluation.lpips_weights = lpips_weights;
            }
            if threads.is_some() {
                config.evaluation.threads = threads;
            }
            if no_summary {
                config.evaluation.write_summary = false;
            }
            let summary = RestorationLab::new(config)
                .evaluate()
                .context("evaluation failed")?;
            println!("{}", summary.csv_path.display());
        }
        Command::Restore { input, output } => {
            restore_photo(&config, &input, output)?;
        }
        Command::DetectMask {
            input,
            output,
            threshold,
        } => {
            let image = load_rgb(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            detect_damage_mask(&image, threshold)
                .save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!("Mask written to {}", output.display());
        }
    }

    Ok(())
}

fn restore_photo(config: &PipelineConfig, input: &Path, output: Option<PathBuf>) -> Result<()> {
    let bytes =
        fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let client = OpenAiImageClient::from_env(&config.service)?;
    let handler = UploadHandler::new(client, config.upload.clone());
    let restored = handler.handle(file_name, &bytes).map_err(|e| {
        anyhow::anyhow!("restoration failed (status {}): {}", e.status_code(), e)
    })?;

    let destination = output.unwrap_or_else(|| input.with_file_name(&restored.file_name));
    fs::write(&destination, &restored.bytes)
        .with_context(|| format!("failed to write {}", destination.display()))?;
    info!("Restored photo written to {}", destination.display());

    Ok(())
}
