use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use housing_estimator::config::Config;
use housing_estimator::data;
use housing_estimator::ml::{self, PredictionEngine};
use housing_estimator::web::PredictorServer;

#[derive(Parser)]
#[command(name = "housing")]
#[command(about = "Housing price dataset cleaning, model training and prediction service")]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clean a raw CSV dataset into the five canonical columns
    Clean {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Train the pipeline and write the model and metadata artifacts
    Train {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Run the prediction HTTP service
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Clean { input, output } => {
            let input = input.unwrap_or(config.data.raw_path);
            let output = output.unwrap_or(config.data.cleaned_path);
            data::clean(&input, &output)?;
        }
        Command::Train { input } => {
            let input = input.unwrap_or(config.data.raw_path);
            let report = ml::train(&input, &config.training)?;
            info!(
                "Training finished after {} epochs on {} rows",
                report.epochs, report.metadata.rows
            );
        }
        Command::Serve { port } => {
            let port = port.unwrap_or(config.server.port);

            // Model loads lazily on the first prediction
            let engine = Arc::new(PredictionEngine::new(config.server.model_path.clone()));
            let server = PredictorServer::new(engine);
            server.start(&config.server.host, port).await?;
        }
    }

    Ok(())
}
