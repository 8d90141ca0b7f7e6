use crate::model::factorization::ModelParameters;
use crate::wire::protocol::{BATCH_PORT, SYNC_PORT};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Controller configuration file.
///
/// Carries the worker list, the catalog metadata and the trained model (including `R`/`P`,
/// which never leave the controller).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub slave_ips: Vec<String>,
    pub movie_titles: Vec<String>,
    pub movie_genre_names: Vec<String>,
    pub movie_genre_ids: Vec<Vec<usize>>,
    pub model_config: ModelParameters,
}

impl ClusterConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("decoding config file {}", path.display()))?;
        config.validate()?;
        tracing::info!(
            "Config loaded: {} workers, {} movies, {} genres",
            config.slave_ips.len(),
            config.movie_titles.len(),
            config.movie_genre_names.len()
        );
        Ok(config)
    }

    /// Cross-checks catalog metadata against the model.
    pub fn validate(&self) -> Result<()> {
        self.model_config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid modelConfig: {}", e))?;

        let items = self.model_config.item_count();
        if self.movie_titles.len() != items {
            anyhow::bail!(
                "movieTitles has {} entries but the model has {} items",
                self.movie_titles.len(),
                items
            );
        }
        if self.movie_genre_ids.len() != items {
            anyhow::bail!(
                "movieGenreIds has {} entries but the model has {} items",
                self.movie_genre_ids.len(),
                items
            );
        }
        let genre_count = self.movie_genre_names.len();
        if let Some((item, _)) = self
            .movie_genre_ids
            .iter()
            .enumerate()
            .find(|(_, genres)| genres.iter().any(|genre| *genre >= genre_count))
        {
            anyhow::bail!("movie {} references an unknown genre id", item);
        }
        Ok(())
    }

    /// Resolves every configured worker to its synchronization and batch addresses.
    pub async fn resolve_endpoints(&self) -> Result<Vec<WorkerEndpoint>> {
        let mut endpoints = Vec::with_capacity(self.slave_ips.len());
        for host in &self.slave_ips {
            endpoints.push(WorkerEndpoint::resolve(host).await?);
        }
        Ok(endpoints)
    }
}

/// Network addresses of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerEndpoint {
    pub sync_addr: SocketAddr,
    pub batch_addr: SocketAddr,
}

impl WorkerEndpoint {
    pub fn new(sync_addr: SocketAddr, batch_addr: SocketAddr) -> Self {
        Self {
            sync_addr,
            batch_addr,
        }
    }

    /// Looks up `host` and pairs it with the default worker ports.
    pub async fn resolve(host: &str) -> Result<Self> {
        let sync_addr = lookup(host, SYNC_PORT).await?;
        let batch_addr = lookup(host, BATCH_PORT).await?;
        Ok(Self::new(sync_addr, batch_addr))
    }
}

async fn lookup(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("resolving worker {}", host))?
        .next()
        .ok_or_else(|| anyhow::anyhow!("worker {} resolved to no address", host))
}
