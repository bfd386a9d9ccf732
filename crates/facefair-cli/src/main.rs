use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facefair_core::{pipeline, OnnxEmbedder, PairedDataset};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

mod config;
mod roc_plot;
mod split;

use config::Config;
use split::SplitManifest;

#[derive(Parser)]
#[command(name = "facefair", about = "Face verification fairness benchmark")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the balanced multi-group training and validation lists
    Split {
        /// Write the record lists as JSON
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Resolve a pairs manifest into image paths
    Pairs {
        #[command(flatten)]
        source: PairSource,
        /// Print JSON instead of one pair per line
        #[arg(long)]
        json: bool,
    },
    /// Evaluate a model on a pairs manifest
    Evaluate {
        /// ONNX embedding model
        #[arg(short, long)]
        model: PathBuf,
        #[command(flatten)]
        source: PairSource,
        /// Output path for the ROC curve image (default: $LOG_DIR/roc.png)
        #[arg(long)]
        roc: Option<PathBuf>,
        /// Output path for the JSON report (default: $LOG_DIR/report.json)
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Compare two face images with a model
    Verify {
        /// ONNX embedding model
        #[arg(short, long)]
        model: PathBuf,
        image_a: PathBuf,
        image_b: PathBuf,
    },
}

#[derive(clap::Args)]
struct PairSource {
    /// Pairs manifest (`name i j` or `name_a i name_b j` per line)
    #[arg(short = 'p', long)]
    manifest: PathBuf,
    /// Image root the manifest names resolve against
    #[arg(long, conflicts_with = "group")]
    root: Option<PathBuf>,
    /// Group folder under the configured dataset root, used as image root
    #[arg(long)]
    group: Option<String>,
}

impl PairSource {
    fn load(&self, config: &Config) -> Result<PairedDataset> {
        let root = match (&self.root, &self.group) {
            (Some(root), _) => root.clone(),
            (None, Some(group)) => config.group_root(group),
            (None, None) => bail!("either --root or --group is required"),
        };
        Ok(PairedDataset::load(&self.manifest, &root)?)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Split { out } => run_split(&config, out.as_deref()),
        Commands::Pairs { source, json } => {
            let dataset = source.load(&config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(dataset.pairs())?);
            } else {
                for pair in dataset.pairs() {
                    println!("{}\t{}\t{}", pair.path_a.display(), pair.path_b.display(), pair.is_match);
                }
            }
            Ok(())
        }
        Commands::Evaluate {
            model,
            source,
            roc,
            report,
        } => run_evaluate(&config, &model, &source, roc, report),
        Commands::Verify {
            model,
            image_a,
            image_b,
        } => {
            let mut embedder = OnnxEmbedder::load(&model, config.evaluation.input_size)?;
            let distance = pipeline::verify(&mut embedder, &image_a, &image_b)?;
            println!("distance: {distance}");
            Ok(())
        }
    }
}

fn run_split(config: &Config, out: Option<&Path>) -> Result<()> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let (num_classes, pool) = split::build_pool(config, &mut rng)?;
    let fold = split::select_fold(config, &pool)?;

    tracing::info!(
        num_classes,
        pool_training = pool.training.len(),
        pool_validation = pool.validation.len(),
        fold = fold.index,
        fold_train = fold.train_len(),
        fold_validation = fold.validation().len(),
        "split ready"
    );
    println!(
        "classes: {num_classes}, train: {}, validation: {}, holdout: {}",
        fold.train_len(),
        fold.validation().len(),
        pool.validation.len()
    );

    if let Some(out) = out {
        let manifest = SplitManifest::new(num_classes, config.folds, &fold, &pool);
        let json = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
        println!("record lists written to {}", out.display());
    }

    Ok(())
}

fn run_evaluate(
    config: &Config,
    model: &Path,
    source: &PairSource,
    roc: Option<PathBuf>,
    report: Option<PathBuf>,
) -> Result<()> {
    let dataset = source.load(config)?;
    let mut embedder = OnnxEmbedder::load(model, config.evaluation.input_size)?;
    let evaluation = pipeline::evaluate_pairs(&dataset, &mut embedder, &config.thresholds())?;

    let roc_path = roc.unwrap_or_else(|| config.log_dir.join("roc.png"));
    roc_plot::render(&evaluation.report.fpr(), &evaluation.report.tpr(), &roc_path)?;

    let report_path = report.unwrap_or_else(|| config.log_dir.join("report.json"));
    if let Some(parent) = report_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(&report_path, serde_json::to_string_pretty(&evaluation)?)
        .with_context(|| format!("writing {}", report_path.display()))?;

    println!(
        "Model accuracy is {} at threshold {}",
        evaluation.report.best_accuracy, evaluation.report.best_threshold
    );
    println!("ROC curve generated at {}", roc_path.display());
    println!("Report written to {}", report_path.display());
    Ok(())
}
