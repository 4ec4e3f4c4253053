use anyhow::Result;
use clap::Parser;
use retailrec::services::repository::{InMemoryStore, Repositories};
use retailrec::utils::dataset::Dataset;
use retailrec::{init_tracing, AppState, Config};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// JSON file with retailers, products, interactions and preferences.
    #[arg(short, long)]
    dataset: Option<String>,

    #[arg(long, default_value_t = 50)]
    synthetic_retailers: usize,

    #[arg(long, default_value_t = 200)]
    synthetic_products: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Print recommendations for this retailer after training.
    #[arg(short, long)]
    retailer: Option<Uuid>,

    #[arg(short = 'n', long)]
    count: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    info!("Starting RetailRec trainer");

    let config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };
    info!("Training configuration loaded: {:?}", config.training);

    let dataset = match &args.dataset {
        Some(path) => Dataset::from_json_file(path)?,
        None => {
            info!(
                "Generating synthetic data: {} retailers, {} products, seed {}",
                args.synthetic_retailers, args.synthetic_products, args.seed
            );
            Dataset::synthetic(args.synthetic_retailers, args.synthetic_products, args.seed)
        }
    };
    let store = Arc::new(InMemoryStore::new());
    dataset.load_into(&store);

    let count = args.count.unwrap_or(config.recommendation.default_count);
    let state = AppState::new(config, Repositories::in_memory(store))?;

    let outcome = state.recommendation_service.train().await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if let Some(retailer_id) = args.retailer {
        let recommendations = state.serving_service.serve_recommendations(retailer_id, count).await;
        println!("{}", serde_json::to_string_pretty(&recommendations)?);
    }

    println!("{}", serde_json::to_string_pretty(&state.serving_service.health_check())?);
    Ok(())
}
