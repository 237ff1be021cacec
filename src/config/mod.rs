use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub matrix: MatrixConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Number of workers that must register before training starts.
    pub nodes: usize,
    pub master_host: String,
    pub worker_port: u16,
    pub client_port: u16,
    pub backlog: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Users (rows of the interaction matrix).
    pub rows: usize,
    /// Items (columns of the interaction matrix).
    pub cols: usize,
    pub dataset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Confidence scale: C = 1 + alpha * R.
    pub alpha: f64,
    /// Ridge regularization strength.
    pub lambda: f64,
    /// Minimum cost delta below which training stops.
    pub threshold: f64,
    /// Coefficients of the worker capacity weight.
    pub cpu_weight: f64,
    pub mem_weight: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster: ClusterConfig {
                nodes: 4,
                master_host: "127.0.0.1".to_string(),
                worker_port: 4321,
                client_port: 4322,
                backlog: 10,
            },
            matrix: MatrixConfig {
                rows: 15,
                cols: 30,
                dataset: "data/sample1.csv".to_string(),
            },
            training: TrainingConfig {
                alpha: 40.0,
                lambda: 0.5,
                threshold: 0.1,
                cpu_weight: 0.6,
                mem_weight: 0.4,
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("ALSREC"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// All parameters are fixed at process start; anything invalid here is
    /// fatal before any socket is opened.
    pub fn validate(&self) -> Result<()> {
        if self.cluster.nodes == 0 {
            return Err(Error::Config("cluster size must be at least 1".into()));
        }
        if self.matrix.rows == 0 || self.matrix.cols == 0 {
            return Err(Error::Config(format!(
                "matrix dimensions must be positive, got {}x{}",
                self.matrix.rows, self.matrix.cols
            )));
        }
        if self.training.alpha < 0.0 {
            return Err(Error::Config("alpha must be non-negative".into()));
        }
        if self.training.lambda < 0.0 {
            return Err(Error::Config("lambda must be non-negative".into()));
        }
        if self.training.threshold <= 0.0 {
            return Err(Error::Config("convergence threshold must be positive".into()));
        }
        if self.training.cpu_weight < 0.0 || self.training.mem_weight < 0.0 {
            return Err(Error::Config("capacity weight coefficients must be non-negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_cluster_size_is_rejected() {
        let mut config = Config::default();
        config.cluster.nodes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn degenerate_dimensions_are_rejected() {
        let mut config = Config::default();
        config.matrix.rows = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_threshold_is_rejected() {
        let mut config = Config::default();
        config.training.threshold = 0.0;
        assert!(config.validate().is_err());
    }
}
