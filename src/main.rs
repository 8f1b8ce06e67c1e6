//! RBM training CLI
//!
//! Trains a Restricted Boltzmann Machine layer with Contrastive Divergence and
//! exports data for plotting.

use clap::{Parser, Subcommand};
use rbm::{Config, Result};

#[derive(Parser)]
#[command(name = "rbm")]
#[command(about = "Restricted Boltzmann Machine training with Contrastive Divergence", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Train a model and save it
    Train {
        /// Override number of epochs
        #[arg(long)]
        epochs: Option<usize>,
        /// Override the sampling seed
        #[arg(long)]
        seed: Option<u64>,
        /// Train on bars-and-stripes images of this side instead of the dataset file
        #[arg(long)]
        bars: Option<usize>,
    },
    /// Train while sampling an error curve, printed as JSON
    Curve {
        /// Number of sample points across [0, max_epochs]
        #[arg(long, default_value = "128")]
        frames: usize,
        /// Train on bars-and-stripes images of this side instead of the dataset file
        #[arg(long)]
        bars: Option<usize>,
    },
    /// Print weight histogram and one unit's receptive field heatmap as JSON
    ///
    /// The heatmap is only included when the visible layer is square.
    Inspect {
        /// Hidden unit to show
        #[arg(long, default_value = "0")]
        unit: usize,
        /// Histogram bins
        #[arg(long, default_value = "20")]
        bins: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Train { epochs, seed, bars } => commands::train(&config, epochs, seed, bars),
        Commands::Curve { frames, bars } => commands::curve(&config, frames, bars),
        Commands::Inspect { unit, bins } => commands::inspect(&config, unit, bins),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use burn::backend::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rbm::data::Dataset;
    use rbm::model::RbmModel;
    use rbm::training::CdTrainer;
    use rbm::visualize::{heatmap, ErrorCurve, WeightsView};
    use rbm::{RbmError, TrainingConfig, TrainingConfigBuilder};

    type Backend = NdArray<f32>;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("model")?;
        println!("Created data/ and model/ directories");

        println!("\nNext steps:");
        println!("  1. Put training examples in {} (JSON array of arrays)", config.data.dataset_path);
        println!("  2. Run 'rbm train' (or 'rbm train --bars 4' for a toy dataset)");
        println!("  3. Run 'rbm inspect --unit 0' to look at the learned weights");

        Ok(())
    }

    fn load_dataset(config: &Config, bars: Option<usize>) -> Result<Dataset> {
        match bars {
            Some(side) => {
                let dataset = Dataset::bars_and_stripes(side)?;
                println!(
                    "Using {} bars-and-stripes images ({}x{})",
                    dataset.len(),
                    side,
                    side
                );
                Ok(dataset)
            }
            None => Dataset::load(&config.data.dataset_path),
        }
    }

    fn new_model(config: &Config, num_visible: usize, seed: Option<u64>) -> Result<RbmModel<Backend>> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        RbmModel::init(
            num_visible,
            config.model.num_hidden,
            config.model.init_std,
            &mut rng,
            &Default::default(),
        )
    }

    fn new_trainer<'m>(
        model: &'m mut RbmModel<Backend>,
        training: TrainingConfig,
        seed: Option<u64>,
    ) -> CdTrainer<'m, Backend> {
        match seed {
            Some(seed) => CdTrainer::with_seed(model, training, seed),
            None => CdTrainer::new(model, training),
        }
    }

    pub fn train(
        config: &Config,
        epochs: Option<usize>,
        seed: Option<u64>,
        bars: Option<usize>,
    ) -> Result<()> {
        let dataset = load_dataset(config, bars)?;
        let seed = seed.or(config.model.seed);

        let mut training = config.training;
        if let Some(epochs) = epochs {
            training = TrainingConfigBuilder::from(training)
                .with_max_epochs(epochs)
                .build()?;
        }

        let mut model = new_model(config, dataset.num_visible(), seed)?;
        println!(
            "Training RBM: {} visible, {} hidden units",
            model.num_visible(),
            model.num_hidden()
        );

        let outcome = new_trainer(&mut model, training, seed).train(&dataset)?;

        println!("\n=== Training Complete ===");
        println!("State: {}", outcome.state);
        println!("Epochs: {}", outcome.epochs);
        println!("Mini-batches: {}", outcome.steps);
        println!("Reconstruction error: {:.4}", outcome.mean_squared_error);

        if let Some(parent) = std::path::Path::new(&config.data.model_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        model.save(&config.data.model_path)?;
        println!("Model saved to {}", config.data.model_path);

        Ok(())
    }

    pub fn curve(config: &Config, frames: usize, bars: Option<usize>) -> Result<()> {
        let dataset = load_dataset(config, bars)?;
        let mut model = new_model(config, dataset.num_visible(), config.model.seed)?;
        let mut trainer = new_trainer(&mut model, config.training, config.model.seed);

        let curve = ErrorCurve::record(&mut trainer, &dataset, frames)?;
        let json = serde_json::to_string_pretty(&curve)
            .map_err(|e| RbmError::Parse(e.to_string()))?;
        println!("{}", json);

        Ok(())
    }

    pub fn inspect(config: &Config, unit: usize, bins: usize) -> Result<()> {
        let model = RbmModel::<Backend>::load(&config.data.model_path, &Default::default())?;
        let view = WeightsView::new(&model);

        let field: Vec<f32> = view.receptive_field(unit)?.into_iter().flatten().collect();
        let histogram = view.histogram(bins)?;

        let mut json = serde_json::json!({
            "num_visible": model.num_visible(),
            "num_hidden": model.num_hidden(),
            "unit": unit,
            "histogram": histogram,
        });
        match heatmap(&field) {
            Ok(cells) => {
                let triples: Vec<_> = cells.iter().map(|c| c.to_triple()).collect();
                json["heatmap"] = serde_json::json!(triples);
            }
            Err(e) => log::warn!("Skipping heatmap: {}", e),
        }
        let text = serde_json::to_string_pretty(&json)
            .map_err(|e| RbmError::Parse(e.to_string()))?;
        println!("{}", text);

        Ok(())
    }
}
