use std::path::Path;
use std::sync::Arc;

use alsrec::algorithms::Model;
use alsrec::services::coordinator::Coordinator;
use alsrec::services::serving::RequestServer;
use alsrec::services::dataset;
use alsrec::{init_tracing, Config};
use anyhow::Result;
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing().await;

    let config = if Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };
    config.validate()?;
    let config = Arc::new(config);

    info!(
        "Starting alsrec master: {} workers, {}x{} interaction matrix",
        config.cluster.nodes, config.matrix.rows, config.matrix.cols
    );

    let interactions = dataset::load_interactions(
        Path::new(&config.matrix.dataset),
        config.matrix.rows,
        config.matrix.cols,
    )?;

    let model = Model::new(&interactions, config.training.alpha, config.training.lambda);
    info!(
        "model initialized with factor rank {} (initial cost {:.4})",
        model.factor_rank(),
        model.last_cost
    );

    let mut coordinator = Coordinator::new(config.clone(), model);
    coordinator.register_workers().await?;
    coordinator.train().await?;
    info!("training converged, switching to request serving");

    let server = RequestServer::new(config, coordinator.model());
    server.run().await?;

    Ok(())
}
