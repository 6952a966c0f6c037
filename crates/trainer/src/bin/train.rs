//! Training binary entry point
//!
//! Runs the simulated model with best-K checkpoint retention. The first
//! argument, if given, is a JSON run configuration.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use runtime_core::RunConfig;
use trainer::{SimulatedModel, TrainingLoop};

/// Width of the simulated parameter vector
const MODEL_DIM: usize = 16;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trainer=info,checkpoint=info,storage=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!("Loading run configuration from {}", path);
            RunConfig::from_json_file(&path)?
        }
        None => RunConfig::default(),
    };

    let mut model = SimulatedModel::new(MODEL_DIM, config.experiment.seed);
    let summary = TrainingLoop::new(config)?.run(&mut model).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
