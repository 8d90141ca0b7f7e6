use distributed_recommender::api::router;
use distributed_recommender::config::file::ClusterConfig;
use distributed_recommender::coordinator::service::Controller;
use distributed_recommender::health::tracker::ClusterHealth;
use distributed_recommender::model::dataset::load_ratings;
use distributed_recommender::model::training::{ModelGrid, grid_search};
use distributed_recommender::synchronization::manager::SyncManager;
use distributed_recommender::wire::protocol::{BATCH_PORT, SERVICE_PORT, SYNC_PORT};
use distributed_recommender::worker::service::Worker;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

const USAGE: &str = "Usage:
  recommender controller --config <file.json> [--bind <ip>] [--advertise <ip>]
  recommender worker [--bind <ip>]
  recommender train --data <ratings.csv> --out <model.json> [--features 5,10] [--epochs 20]
                    [--learning-rate 0.01] [--regularization 0.02] [--seed 42]";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let flags = parse_flags(&args[2..])?;
    match args[1].as_str() {
        "controller" => run_controller(&flags).await,
        "worker" => run_worker(&flags).await,
        "train" => run_train(&flags),
        other => {
            eprintln!("Unknown role '{}'\n{}", other, USAGE);
            std::process::exit(1);
        }
    }
}

/// Collects `--name value` pairs.
fn parse_flags(args: &[String]) -> Result<HashMap<String, String>> {
    let mut flags = HashMap::new();
    let mut i = 0;
    while i < args.len() {
        let name = args[i]
            .strip_prefix("--")
            .ok_or_else(|| anyhow::anyhow!("unexpected argument '{}'", args[i]))?;
        let value = args
            .get(i + 1)
            .ok_or_else(|| anyhow::anyhow!("--{} needs a value", name))?;
        flags.insert(name.to_string(), value.clone());
        i += 2;
    }
    Ok(flags)
}

fn flag_or<T: FromStr>(flags: &HashMap<String, String>, name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match flags.get(name) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for --{}", name)),
        None => Ok(default),
    }
}

fn required<'a>(flags: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    flags
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("--{} is required\n{}", name, USAGE))
}

fn list_flag<T: FromStr>(flags: &HashMap<String, String>, name: &str, default: T) -> Result<Vec<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match flags.get(name) {
        Some(raw) => raw
            .split(',')
            .map(|item| {
                item.trim()
                    .parse()
                    .with_context(|| format!("invalid value in --{}", name))
            })
            .collect(),
        None => Ok(vec![default]),
    }
}

async fn run_controller(flags: &HashMap<String, String>) -> Result<()> {
    let bind_ip: IpAddr = flag_or(flags, "bind", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
    let advertise_ip: IpAddr = flag_or(flags, "advertise", bind_ip)?;

    // 1. Config & workers:
    let config = ClusterConfig::load(required(flags, "config")?)?;
    let endpoints = config.resolve_endpoints().await?;
    let health = ClusterHealth::new(endpoints.len());

    // 2. Initial synchronization, then background retries:
    let sync = SyncManager::from_config(
        &config,
        advertise_ip.to_string(),
        endpoints.clone(),
        health.clone(),
    );
    let report = sync.synchronize_all().await;
    if !report.failed.is_empty() {
        tracing::warn!("Workers not synchronized yet: {:?}", report.failed);
        sync.spawn_resync();
    }

    // 3. HTTP API:
    let controller = Arc::new(Controller::new(&config, endpoints, health));
    let app = router(controller);

    let http_addr = SocketAddr::new(bind_ip, SERVICE_PORT);
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!("HTTP server listening on {}", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_worker(flags: &HashMap<String, String>) -> Result<()> {
    let bind_ip: IpAddr = flag_or(flags, "bind", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;

    let worker = Worker::bind(
        SocketAddr::new(bind_ip, SYNC_PORT),
        SocketAddr::new(bind_ip, BATCH_PORT),
    )
    .await?;
    tracing::info!("Waiting for the controller to synchronize");

    worker.run().await;
    Ok(())
}

fn run_train(flags: &HashMap<String, String>) -> Result<()> {
    let ratings = load_ratings(required(flags, "data")?)?;
    let out = required(flags, "out")?;
    let grid = ModelGrid {
        num_features: list_flag(flags, "features", 10)?,
        epochs: list_flag(flags, "epochs", 20)?,
        learning_rates: list_flag(flags, "learning-rate", 0.01)?,
        regularizations: list_flag(flags, "regularization", 0.02)?,
    };
    let seed: u64 = flag_or(flags, "seed", 42)?;

    tracing::info!(
        "Training on {} users x {} items",
        ratings.len(),
        ratings.first().map(Vec::len).unwrap_or(0)
    );
    let (trainer, rmse) = grid_search(&grid, &ratings, seed)?;
    trainer.save_json(out)?;
    tracing::info!("Best model (RMSE {:.6}) written to {}", rmse, out);
    Ok(())
}
