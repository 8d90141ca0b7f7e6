use super::scoring::{partial_user_factors, score_candidates};
use crate::config::file::WorkerEndpoint;
use crate::model::factorization::FactorModel;
use crate::wire::codec::JsonConnection;
use crate::wire::protocol::*;

use anyhow::Result;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// Model snapshot received from the controller.
pub struct WorkerState {
    pub controller_ip: String,
    pub genre_ids: Vec<Vec<usize>>,
    pub model: FactorModel,
}

impl WorkerState {
    /// Validates a synchronization payload and builds the local replica from it.
    pub fn from_sync(request: SyncRequest) -> Result<Self, String> {
        request.model_config.validate()?;
        if request.movie_genre_ids.len() != request.model_config.item_count() {
            return Err(format!(
                "{} genre lists for {} items",
                request.movie_genre_ids.len(),
                request.model_config.item_count()
            ));
        }
        Ok(Self {
            controller_ip: request.master_ip,
            genre_ids: request.movie_genre_ids,
            model: FactorModel::new(request.model_config),
        })
    }
}

/// A worker node: one listener for synchronization, one for batch exchanges.
pub struct Worker {
    sync_listener: TcpListener,
    batch_listener: TcpListener,
    state: RwLock<Option<Arc<WorkerState>>>,
    deadline: Duration,
    batches_served: AtomicUsize,
}

impl Worker {
    pub async fn bind(sync_addr: SocketAddr, batch_addr: SocketAddr) -> Result<Arc<Self>> {
        let sync_listener = TcpListener::bind(sync_addr).await?;
        let batch_listener = TcpListener::bind(batch_addr).await?;

        tracing::info!(
            "Worker listening: sync={} batch={}",
            sync_listener.local_addr()?,
            batch_listener.local_addr()?
        );

        Ok(Arc::new(Self {
            sync_listener,
            batch_listener,
            state: RwLock::new(None),
            deadline: EXCHANGE_DEADLINE,
            batches_served: AtomicUsize::new(0),
        }))
    }

    /// Bound addresses, as the controller should dial them.
    pub fn endpoint(&self) -> Result<WorkerEndpoint> {
        Ok(WorkerEndpoint::new(
            self.sync_listener.local_addr()?,
            self.batch_listener.local_addr()?,
        ))
    }

    pub fn is_synchronized(&self) -> bool {
        self.state.read().is_some()
    }

    pub fn state(&self) -> Option<Arc<WorkerState>> {
        self.state.read().clone()
    }

    /// Number of batch exchanges that reached the final reply.
    pub fn batches_served(&self) -> usize {
        self.batches_served.load(Ordering::SeqCst)
    }

    /// Spawns both accept loops and returns immediately.
    pub async fn start(self: Arc<Self>) {
        let sync_worker = self.clone();
        tokio::spawn(async move {
            sync_worker.sync_loop().await;
        });

        let batch_worker = self.clone();
        tokio::spawn(async move {
            batch_worker.batch_loop().await;
        });

        tracing::info!("Worker background tasks started");
    }

    /// Runs both accept loops on the current task until the process exits.
    pub async fn run(self: Arc<Self>) {
        tokio::join!(self.clone().sync_loop(), self.clone().batch_loop());
    }

    async fn sync_loop(self: Arc<Self>) {
        loop {
            match self.sync_listener.accept().await {
                Ok((stream, peer)) => {
                    // Synchronization is rare and must not interleave; handle inline.
                    if let Err(e) = self.handle_sync(stream).await {
                        tracing::error!("Sync from {} failed: {}", peer, e);
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to accept sync connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn batch_loop(self: Arc<Self>) {
        loop {
            match self.batch_listener.accept().await {
                Ok((stream, peer)) => {
                    let worker = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = worker.handle_batch(stream).await {
                            tracing::error!("Batch from {} failed: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept batch connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn handle_sync(&self, stream: TcpStream) -> Result<()> {
        let mut conn = JsonConnection::accepted(stream, self.deadline);
        let request: SyncRequest = conn.receive().await?;
        let status = self.apply_sync(request);
        conn.send(&SyncResponse { status }).await?;
        Ok(())
    }

    /// Installs a snapshot and returns the status code to report.
    pub fn apply_sync(&self, request: SyncRequest) -> i32 {
        match WorkerState::from_sync(request) {
            Ok(state) => {
                tracing::info!(
                    "Synchronized with controller {}: {} items, {} features",
                    state.controller_ip,
                    state.model.item_count(),
                    state.model.num_features()
                );
                *self.state.write() = Some(Arc::new(state));
                SYNC_STATUS_OK
            }
            Err(e) => {
                tracing::warn!("Rejected synchronization payload: {}", e);
                SYNC_STATUS_INVALID
            }
        }
    }

    async fn handle_batch(&self, stream: TcpStream) -> Result<()> {
        let mut conn = JsonConnection::accepted(stream, self.deadline);
        let state = self
            .state()
            .ok_or_else(|| anyhow::anyhow!("batch received before synchronization"))?;

        let request: BatchRequest = conn.receive().await?;
        validate_batch(&state, &request)?;
        tracing::debug!(
            "Batch for user {}: items {}..{}",
            request.user_id,
            request.start_movie_id,
            request.end_movie_id
        );

        let partial = partial_user_factors(&state.model, &request);
        conn.send(&partial).await?;

        conn.restart_deadline(BARRIER_WAIT_DEADLINE);
        let global: GlobalUserFactors = conn.receive().await?;
        conn.restart_deadline(self.deadline);
        if global.user_latent_factors.len() != state.model.num_features() {
            anyhow::bail!(
                "global factors have {} components, expected {}",
                global.user_latent_factors.len(),
                state.model.num_features()
            );
        }

        let response = score_candidates(
            &state.model,
            &state.genre_ids,
            &request,
            &global.user_latent_factors,
        );
        self.batches_served.fetch_add(1, Ordering::SeqCst);
        conn.send(&response).await?;

        tracing::debug!(
            "Batch for user {} handled: {} candidates",
            request.user_id,
            response.count
        );
        Ok(())
    }
}

fn validate_batch(state: &WorkerState, request: &BatchRequest) -> Result<()> {
    let items = state.model.item_count();
    if request.start_movie_id > request.end_movie_id || request.end_movie_id > items {
        anyhow::bail!(
            "range {}..{} outside catalog of {} items",
            request.start_movie_id,
            request.end_movie_id,
            items
        );
    }
    if request.user_ratings.len() != request.end_movie_id - request.start_movie_id {
        anyhow::bail!(
            "{} ratings for a range of {} items",
            request.user_ratings.len(),
            request.end_movie_id - request.start_movie_id
        );
    }
    if request.user_factors.len() != state.model.num_features() {
        anyhow::bail!(
            "{} user factors, expected {}",
            request.user_factors.len(),
            state.model.num_features()
        );
    }
    Ok(())
}
