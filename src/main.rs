use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use fruitscan::{
    ClassifierKind, DatasetIndex, FeatureExtractor, ForestClassifier, Recognizer, RecognizerConfig, TemplateMatcher,
};

#[derive(Parser)]
#[command(name = "fruitscan")]
#[command(about = "Recognise fruit in images and look up their price")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a random forest on a directory of class folders
    Train {
        /// Dataset root, one sub-directory per fruit class
        #[arg(value_name = "DATASET")]
        dataset: PathBuf,

        /// Where to write the model bundle
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Number of trees
        #[arg(long)]
        trees: Option<usize>,

        /// Seed for the split and the trees
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Classify images with a trained model bundle
    Predict {
        /// Model bundle written by `train`
        #[arg(short, long, value_name = "FILE")]
        model: PathBuf,

        /// Minimum confidence in percent
        #[arg(long)]
        threshold: Option<f64>,

        #[arg(value_name = "IMAGE", required = true)]
        images: Vec<PathBuf>,
    },

    /// Classify images by comparing them to sample images
    Match {
        /// Directory with one sub-directory of samples per class
        #[arg(short, long, value_name = "DIR")]
        templates: PathBuf,

        /// Samples loaded per class
        #[arg(long)]
        per_class: Option<usize>,

        #[arg(value_name = "IMAGE", required = true)]
        images: Vec<PathBuf>,
    },

    /// Print the feature vector of an image
    Features {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Save intermediate images to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,
    },

    /// Load the configured classifier and report its state
    Health,
}

#[derive(Serialize)]
struct ImageResult<T: Serialize> {
    image: PathBuf,
    #[serde(flatten)]
    result: T,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => RecognizerConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => RecognizerConfig::default(),
    };

    match args.command {
        Command::Train {
            dataset,
            output,
            trees,
            seed,
        } => {
            let mut forest = config.forest.clone();
            if let Some(trees) = trees {
                forest.n_trees = trees;
            }
            if let Some(seed) = seed {
                forest.seed = seed;
            }

            let index = DatasetIndex::scan(&dataset)?;
            if args.verbose {
                eprintln!(
                    "Dataset: {} classes, {} images",
                    index.classes.len(),
                    index.image_count()
                );
            }
            let (model, report) = fruitscan::forest::train_from_dataset(&index, config.features.clone(), &forest)?;
            model
                .save(&output)
                .with_context(|| format!("Failed to write model bundle {}", output.display()))?;
            print_json(&report)?;
        }

        Command::Predict {
            model,
            threshold,
            images,
        } => {
            let mut policy = config.decision.clone();
            if let Some(threshold) = threshold {
                policy.confidence_threshold = threshold;
            }
            policy.validate()?;
            let classifier = ForestClassifier::lazy(model, policy);
            let recognizer = Recognizer::new(Arc::new(classifier), config.prices.clone());
            recognizer.warm_up().context("Failed to load model bundle")?;
            run_images(&recognizer, &images)?;
        }

        Command::Match {
            templates,
            per_class,
            images,
        } => {
            let mut template_config = config.templates.clone();
            if let Some(per_class) = per_class {
                template_config.max_per_class = per_class;
            }
            let matcher = TemplateMatcher::lazy(templates, template_config);
            let recognizer = Recognizer::new(Arc::new(matcher), config.prices.clone());
            recognizer.warm_up().context("Failed to load templates")?;
            run_images(&recognizer, &images)?;
        }

        Command::Features { image, debug_out } => {
            let extractor = FeatureExtractor::new(config.features.clone())?;
            let img = image::ImageReader::open(&image)?
                .with_guessed_format()?
                .decode()
                .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;

            if args.verbose {
                eprintln!("Image loaded: {}x{}", img.width(), img.height());
            }

            if let Some(dir) = debug_out {
                prepare_debug_dir(&dir)?;
                for (name, debug_image) in extractor.debug_images(&img)? {
                    let path = dir.join(format!("{}.png", name));
                    debug_image
                        .save(&path)
                        .with_context(|| format!("Failed to save {}", path.display()))?;
                }
            }

            let features = extractor.extract(&img)?;
            print_json(&ImageResult {
                image,
                result: serde_json::json!({
                    "layout_version": extractor.layout().version,
                    "features": features.as_slice(),
                }),
            })?;
        }

        Command::Health => {
            let recognizer = Recognizer::from_config(&config);
            if let Err(e) = recognizer.warm_up() {
                match &config.classifier {
                    ClassifierKind::Template { templates_dir } => {
                        tracing::warn!(dir = %templates_dir.display(), error = %e, "templates unavailable")
                    }
                    ClassifierKind::Forest { model_path } => {
                        tracing::warn!(path = %model_path.display(), error = %e, "model unavailable")
                    }
                }
            }
            print_json(&recognizer.health())?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "fruitscan=debug" } else { "fruitscan=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_images(recognizer: &Recognizer, images: &[PathBuf]) -> anyhow::Result<()> {
    for image in images {
        let report = recognizer.recognize_path(image);
        print_json(&ImageResult {
            image: image.clone(),
            result: report,
        })?;
    }
    Ok(())
}

fn prepare_debug_dir(dir: &Path) -> anyhow::Result<()> {
    if dir.exists() {
        if std::fs::read_dir(dir)?.count() > 0 {
            bail!("Debug directory is not empty: {}", dir.display());
        }
    } else {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
