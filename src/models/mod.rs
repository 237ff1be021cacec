use serde::{Deserialize, Serialize};

/// A recommendable point of interest. Immutable once constructed; the id is
/// the item's row index in the item factor matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiRecord {
    id: u64,
    name: String,
    latitude: f64,
    longitude: f64,
    category: String,
}

impl PoiRecord {
    pub fn new(id: u64, name: impl Into<String>, latitude: f64, longitude: f64, category: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            latitude,
            longitude,
            category: category.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

/// Capacity vector a worker reports on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSpecs {
    pub cores: i64,
    /// Available memory in MiB.
    pub free_memory: i64,
}

impl WorkerSpecs {
    /// Probes the local machine.
    pub fn detect() -> Self {
        let mut system = sysinfo::System::new();
        system.refresh_memory();

        Self {
            cores: num_cpus::get() as i64,
            free_memory: (system.available_memory() / (1024 * 1024)) as i64,
        }
    }

    /// Proportional share of cluster capacity, before normalization.
    pub fn weight(&self, cpu_weight: f64, mem_weight: f64) -> f64 {
        (cpu_weight * self.cores as f64 + mem_weight * self.free_memory as f64).max(0.0)
    }
}

/// Transient (item, score) pair used while ranking recommendations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    pub item: usize,
    pub score: f64,
}
