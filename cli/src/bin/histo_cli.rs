use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use histo_cli::AnalysisConfig;
use histo_common::utils::{ensure_output_dir, is_image_file};
use mitosis::{
    load_image, load_mask, save_mask, AnalysisRequest, Binarizer, Connectivity, FsStorage,
    MaskPipeline, ProbabilityMap, ThresholdBinarizer,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the mitotic index of one image and classify another
    Analyze {
        /// Path to a TOML or JSON configuration file (defaults are used otherwise)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Image used for segmentation and the mitotic index
        #[arg(long)]
        segmentation_image: PathBuf,
        /// Image sent to the classifier
        #[arg(long)]
        classification_image: PathBuf,
        /// Run segmentation and classification in parallel
        #[arg(long)]
        concurrent: bool,
    },
    /// Compute the mitotic index of a stored binary mask
    Index {
        /// Mask image; nonzero pixels are foreground
        #[arg(short, long)]
        mask: PathBuf,
        /// Regions strictly larger than this are counted as mitotic
        #[arg(long, default_value_t = 50, allow_negative_numbers = true)]
        min_area: i64,
        #[arg(long, default_value = "eight")]
        connectivity: Connectivity,
    },
    /// Threshold a grayscale probability image into a stored mask
    Binarize {
        /// Grayscale image whose intensities are probabilities
        #[arg(short, long)]
        probability: PathBuf,
        /// Where to write the PNG mask
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value_t = 0.5)]
        threshold: f32,
        /// Keep pixels above the threshold as foreground
        #[arg(long)]
        no_invert: bool,
    },
    /// Print the JSON schema of the configuration file
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Analyze {
            config,
            segmentation_image,
            classification_image,
            concurrent,
        } => {
            analyze(
                config.as_deref(),
                segmentation_image,
                classification_image,
                *concurrent,
            )
            .await?;
        }
        Commands::Index {
            mask,
            min_area,
            connectivity,
        } => {
            index(mask, *min_area, *connectivity)?;
        }
        Commands::Binarize {
            probability,
            output,
            threshold,
            no_invert,
        } => {
            binarize(probability, output, *threshold, !*no_invert)?;
        }
        Commands::Schema => {
            println!("{}", AnalysisConfig::schema_json()?);
        }
    }

    Ok(())
}

async fn analyze(
    config_path: Option<&Path>,
    segmentation_image: &Path,
    classification_image: &Path,
    concurrent: bool,
) -> Result<()> {
    let config = match config_path {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    info!("Configuration: {:?}", config);

    for image in [segmentation_image, classification_image] {
        if !is_image_file(&image.to_string_lossy()) {
            warn!("{} does not look like an image file", image.display());
        }
    }

    let service = config.build_service();
    let request = AnalysisRequest::new(segmentation_image, classification_image);
    let outcome = if concurrent {
        service.analyze_concurrently(&request).await?
    } else {
        service.analyze(&request)?
    };

    if let Some(mask_path) = &outcome.mask_path {
        info!("Mask saved to {}", mask_path.display());
    }
    if let Some(mask_path) = &outcome.classification_mask_path {
        info!("Classification image mask saved to {}", mask_path.display());
    }
    println!("{}", outcome.report.to_json()?);
    Ok(())
}

fn index(mask_path: &Path, min_area: i64, connectivity: Connectivity) -> Result<()> {
    let mask = load_mask(&FsStorage::new("."), mask_path)?;
    let pipeline = MaskPipeline::builder()
        .connectivity(connectivity)
        .min_area(min_area)
        .build();
    info!("{}", pipeline.info());

    let analysis = pipeline.analyze_mask(&mask)?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn binarize(probability_path: &Path, output: &Path, threshold: f32, invert: bool) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(eyre!("Threshold must be within [0, 1], got {}", threshold));
    }

    let probabilities = ProbabilityMap::from_image(&load_image(probability_path)?);
    let mask = ThresholdBinarizer { threshold, invert }.binarize(&probabilities)?;

    if let Some(parent) = output.parent() {
        ensure_output_dir(parent)?;
    }
    let written = save_mask(&FsStorage::new("."), &mask, output)?;

    info!(
        "Wrote {}x{} mask with {} foreground pixels to {}",
        mask.width(),
        mask.height(),
        mask.foreground_count(),
        written.display()
    );
    Ok(())
}
