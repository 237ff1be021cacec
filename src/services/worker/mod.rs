//! Worker runtime: connect to the master, report capacity, then solve row
//! partitions until the termination signal arrives.

use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::info;

use crate::algorithms::solver;
use crate::config::Config;
use crate::error::Result;
use crate::models::WorkerSpecs;
use crate::protocol::{self, Assignment, DenseWire, TaskResult, WorkerHello};

pub struct WorkerRuntime {
    config: Arc<Config>,
}

impl WorkerRuntime {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<()> {
        let addr = format!(
            "{}:{}",
            self.config.cluster.master_host, self.config.cluster.worker_port
        );
        let mut stream = TcpStream::connect(&addr).await?;
        info!("connected to master at {}", addr);

        let specs = WorkerSpecs::detect();
        info!(
            "reporting capacity: {} cores, {} MiB free",
            specs.cores, specs.free_memory
        );
        protocol::send_frame(
            &mut stream,
            &WorkerHello {
                cores: specs.cores,
                free_memory: specs.free_memory,
            },
        )
        .await?;

        loop {
            let assignment: Assignment = protocol::read_frame(&mut stream).await?;
            match assignment {
                Assignment::Terminate => {
                    info!("terminated by master");
                    break;
                }
                Assignment::Task(task) => {
                    info!(
                        "solving {} rows of {}",
                        task.row_count,
                        if task.solving_x { "x" } else { "y" }
                    );
                    let result = solver::solve_task(task, self.config.training.lambda)?;
                    protocol::send_frame(
                        &mut stream,
                        &TaskResult {
                            rows: DenseWire::from_matrix(&result),
                        },
                    )
                    .await?;
                }
            }
        }

        Ok(())
    }
}
