//! Cluster coordination: worker registration and weighting, per-iteration
//! partitioning, concurrent dispatch with a barrier, merge, and convergence.

use std::sync::Arc;

use futures::future::join_all;
use nalgebra::DMatrix;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{info, warn};

use crate::algorithms::partition::{effective_weights, merge, partition_ranges};
use crate::algorithms::Model;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::WorkerSpecs;
use crate::protocol::{self, Assignment, DenseWire, TaskPayload, TaskResult, WorkerHello};

/// Training state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Registering,
    Iterating,
    Converged,
    Terminating,
    Serving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Registering,
    Active,
    Terminated,
}

/// Work or shutdown, sent through the same channel to a worker's I/O task.
pub enum WorkerCommand {
    Task(TaskPayload, oneshot::Sender<Result<DMatrix<f64>>>),
    Terminate,
}

/// The coordinator's view of one registered worker: its capacity weight and
/// the command channel to the task owning its socket.
pub struct WorkerHandle {
    pub id: usize,
    pub weight: f64,
    pub state: WorkerState,
    tx: mpsc::Sender<WorkerCommand>,
}

impl WorkerHandle {
    fn new(id: usize, weight: f64, tx: mpsc::Sender<WorkerCommand>) -> Self {
        Self {
            id,
            weight,
            state: WorkerState::Registering,
            tx,
        }
    }
}

/// Owns the model during training; the only control flow that mutates it.
/// After convergence the model is only reachable through the shared
/// read-locked handle.
pub struct Coordinator {
    config: Arc<Config>,
    workers: Vec<WorkerHandle>,
    total_weight: f64,
    model: Arc<RwLock<Model>>,
    phase: Phase,
}

impl Coordinator {
    pub fn new(config: Arc<Config>, model: Model) -> Self {
        Self {
            config,
            workers: Vec::new(),
            total_weight: 0.0,
            model: Arc::new(RwLock::new(model)),
            phase: Phase::Registering,
        }
    }

    pub fn model(&self) -> Arc<RwLock<Model>> {
        self.model.clone()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        info!("entering {:?} phase", phase);
        self.phase = phase;
    }

    /// Blocks until exactly the configured number of workers have connected
    /// and sent a valid capacity vector. A malformed hello drops only that
    /// connection; registration keeps waiting. No worker may join later.
    pub async fn register_workers(&mut self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.config.cluster.worker_port);
        let listener = protocol::listen(&addr, self.config.cluster.backlog)?;
        info!("awaiting {} workers on {}", self.config.cluster.nodes, addr);

        while self.workers.len() < self.config.cluster.nodes {
            let (mut stream, peer) = listener.accept().await?;
            let hello: WorkerHello = match protocol::read_frame(&mut stream).await {
                Ok(hello) => hello,
                Err(err) => {
                    warn!("rejected worker connection from {}: {}", peer, err);
                    continue;
                }
            };

            let specs = WorkerSpecs {
                cores: hello.cores,
                free_memory: hello.free_memory,
            };
            let weight = specs.weight(
                self.config.training.cpu_weight,
                self.config.training.mem_weight,
            );

            let id = self.workers.len();
            let (tx, rx) = mpsc::channel(1);
            tokio::spawn(worker_io(stream, rx, id));

            let mut handle = WorkerHandle::new(id, weight, tx);
            self.total_weight += weight;
            handle.state = WorkerState::Active;
            self.workers.push(handle);
            info!(
                "worker {} connected from {} (weight {:.2})",
                id + 1,
                peer,
                weight
            );
        }

        Ok(())
    }

    /// Runs the training loop to convergence, then terminates the workers.
    /// Any worker failure mid-iteration aborts the run; training never
    /// proceeds with a missing partition.
    pub async fn train(&mut self) -> Result<()> {
        self.enter(Phase::Iterating);
        let threshold = self.config.training.threshold;
        let mut iteration = 0usize;

        loop {
            iteration += 1;
            info!("iteration {}: solving y", iteration);
            self.solve_half(false).await?;
            info!("iteration {}: solving x", iteration);
            self.solve_half(true).await?;

            let delta = {
                let mut model = self.model.write().await;
                model.update_cost()
            };
            info!("iteration {}: cost delta {:.6}", iteration, delta);
            if delta < threshold {
                break;
            }
        }

        self.enter(Phase::Converged);
        self.terminate_workers().await;
        self.enter(Phase::Serving);
        Ok(())
    }

    /// One half-iteration: partition the matrix being solved, dispatch every
    /// non-empty task, barrier on all results, and replace the factor matrix
    /// with the merged rows.
    async fn solve_half(&mut self, solving_x: bool) -> Result<()> {
        let raw: Vec<f64> = self.workers.iter().map(|w| w.weight).collect();
        let (weights, total) = effective_weights(&raw);

        let mut pending = Vec::new();
        let rows;
        {
            let model = self.model.read().await;
            rows = if solving_x {
                model.user_count()
            } else {
                model.item_count()
            };
            let ranges = partition_ranges(&weights, total, rows);

            let fixed = if solving_x { &model.y } else { &model.x };
            let fixed_wire = DenseWire::from_matrix(fixed);

            for (worker, range) in self.workers.iter().zip(&ranges) {
                if range.is_empty() {
                    continue;
                }
                let (confidence, preference) = model.slice_for(solving_x, range.start, range.end);
                let task = TaskPayload {
                    row_count: range.len() as u32,
                    col_count: model.factor_rank() as u32,
                    solving_x,
                    confidence: DenseWire::from_matrix(&confidence),
                    preference: DenseWire::from_matrix(&preference),
                    fixed: fixed_wire.clone(),
                };

                let (reply_tx, reply_rx) = oneshot::channel();
                worker
                    .tx
                    .send(WorkerCommand::Task(task, reply_tx))
                    .await
                    .map_err(|_| Error::Worker(format!("worker {} channel closed", worker.id)))?;
                pending.push((worker.id, reply_rx));
            }
        }

        // Degenerate dimensions: nothing to dispatch, keep the current
        // factors for this half-iteration.
        if pending.is_empty() {
            return Ok(());
        }

        // Barrier: every dispatched task must produce a result before the
        // merge. Results are collected in submission order regardless of
        // completion order.
        let (ids, receivers): (Vec<_>, Vec<_>) = pending.into_iter().unzip();
        let outcomes = join_all(receivers).await;

        let mut parts = Vec::with_capacity(ids.len());
        for (id, outcome) in ids.into_iter().zip(outcomes) {
            let part = outcome
                .map_err(|_| Error::Worker(format!("worker {} dropped its result", id)))??;
            parts.push(part);
        }

        let merged = merge(parts, rows)?;
        let mut model = self.model.write().await;
        if solving_x {
            model.x = merged;
        } else {
            model.y = merged;
        }
        Ok(())
    }

    /// Sends the termination signal to every worker and marks the handles.
    pub async fn terminate_workers(&mut self) {
        self.enter(Phase::Terminating);
        for worker in &mut self.workers {
            if worker.tx.send(WorkerCommand::Terminate).await.is_err() {
                warn!("worker {} already disconnected", worker.id);
            }
            worker.state = WorkerState::Terminated;
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }
}

/// Owns one worker's socket. Commands arrive through the channel; a task is
/// a full send/await-result exchange, termination closes the connection.
async fn worker_io(mut stream: TcpStream, mut rx: mpsc::Receiver<WorkerCommand>, id: usize) {
    while let Some(command) = rx.recv().await {
        match command {
            WorkerCommand::Task(task, reply) => {
                let expected_rows = task.row_count as usize;
                let outcome = exchange(&mut stream, task, expected_rows).await;
                if reply.send(outcome).is_err() {
                    warn!("worker {}: coordinator dropped the pending result", id);
                    break;
                }
            }
            WorkerCommand::Terminate => {
                if let Err(err) = protocol::send_frame(&mut stream, &Assignment::Terminate).await {
                    warn!("worker {}: failed to send termination: {}", id, err);
                }
                break;
            }
        }
    }
}

async fn exchange(
    stream: &mut TcpStream,
    task: TaskPayload,
    expected_rows: usize,
) -> Result<DMatrix<f64>> {
    protocol::send_frame(stream, &Assignment::Task(task)).await?;
    let result: TaskResult = protocol::read_frame(stream).await?;
    let matrix = result.rows.into_matrix()?;
    if matrix.nrows() != expected_rows {
        return Err(Error::Decode(format!(
            "result has {} rows, task assigned {}",
            matrix.nrows(),
            expected_rows
        )));
    }
    Ok(matrix)
}
