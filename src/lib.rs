pub mod algorithms;
pub mod config;
pub mod error;
pub mod linalg;
pub mod models;
pub mod protocol;
pub mod services;

pub use config::Config;
pub use error::{Error, Result};
pub use models::*;

pub async fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
