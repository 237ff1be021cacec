use std::path::Path;
use std::sync::Arc;

use alsrec::services::worker::WorkerRuntime;
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

    info!(
        "Starting alsrec worker, master at {}:{}",
        config.cluster.master_host, config.cluster.worker_port
    );

    let runtime = WorkerRuntime::new(Arc::new(config));
    runtime.run().await?;

    info!("worker exited");
    Ok(())
}
