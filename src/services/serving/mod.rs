//! Post-training request serving: one handler task per client connection,
//! reading the frozen factor matrices through a shared read lock.

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::algorithms::Model;
use crate::config::Config;
use crate::error::Result;
use crate::protocol::{self, RecommendRequest, RecommendResponse};

pub struct RequestServer {
    config: Arc<Config>,
    model: Arc<RwLock<Model>>,
}

impl RequestServer {
    pub fn new(config: Arc<Config>, model: Arc<RwLock<Model>>) -> Self {
        Self { config, model }
    }

    /// Accept loop. Each connection gets its own handler; a failed request
    /// only closes that connection.
    pub async fn run(&self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.config.cluster.client_port);
        let listener = protocol::listen(&addr, self.config.cluster.backlog)?;
        info!("awaiting clients on {}", addr);

        loop {
            let (stream, peer) = listener.accept().await?;
            info!("client connected from {}", peer);
            let model = self.model.clone();
            tokio::spawn(async move {
                if let Err(err) = handle_client(stream, model).await {
                    error!("client {}: request failed: {}", peer, err);
                }
            });
        }
    }
}

async fn handle_client(mut stream: TcpStream, model: Arc<RwLock<Model>>) -> Result<()> {
    let request: RecommendRequest = protocol::read_frame(&mut stream).await?;

    // The model is frozen by the time clients connect, but reads still go
    // through the lock so a handler can never observe a matrix
    // mid-replacement.
    let items = {
        let model = model.read().await;
        model.recommend(
            request.user_id as usize,
            request.count as usize,
            request.exclude.id(),
        )
    };

    protocol::send_frame(&mut stream, &RecommendResponse { items }).await?;
    info!("request handled for user {}", request.user_id);
    Ok(())
}
