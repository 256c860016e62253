mod alert;
mod config;
mod feed;
mod predict;
mod tracker;
mod web;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::alert::{AlertError, AlertSink, LogSink, WebhookSink};
use crate::config::{Config, ConfigError};
use crate::feed::{FeedError, FeedListener};
use crate::predict::{PredictError, PredictionSource, SondeHubClient};
use crate::tracker::{
    DeviceCache, EvictionSweeper, IngestDispatcher, LandingEvaluator, TrackerStats,
};
use crate::web::AppState;

const INGEST_QUEUE_CAPACITY: usize = 1024;

#[derive(Parser)]
#[command(name = "sonde-alert")]
#[command(about = "Alerts when a radiosonde is predicted to land nearby")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track live sondes and alert on nearby landings
    Run {
        #[arg(short, long, default_value = "sonde-alert.yaml")]
        config: String,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long, default_value = "sonde-alert.yaml")]
        config: String,
    },
    /// Look up the predicted landing of a single sonde
    Check {
        #[arg(short, long, default_value = "sonde-alert.yaml")]
        config: String,
        serial: String,
    },
}

#[derive(Debug, Error)]
enum StartupError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("prediction client: {0}")]
    Predict(#[from] PredictError),
    #[error("alert sink: {0}")]
    Alert(#[from] AlertError),
    #[error("feed: {0}")]
    Feed(#[from] FeedError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Run { config } => block_on(run(&config)),
        Commands::Check { config, serial } => block_on(check(&config, &serial)),
    }
}

fn block_on<F>(future: F) -> ExitCode
where
    F: std::future::Future<Output = Result<(), StartupError>>,
{
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Cannot start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(future) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn validate(path: &str) -> ExitCode {
    let config = match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Configuration is valid");
    println!(
        "  observer:        {} ({})",
        config.observer.coordinates,
        config.observer.name.as_deref().unwrap_or("unnamed")
    );
    println!("  coarse radius:   {} km", config.coarse_radius_km);
    println!("  landing radius:  {} km", config.landing_radius_km);
    println!(
        "  check interval:  {}",
        humantime::format_duration(config.check_interval)
    );
    println!(
        "  retention:       {}",
        humantime::format_duration(config.retention)
    );
    println!("  feed:            {} {}", config.feed.url, config.feed.topic);
    println!("  predictions:     {}", config.prediction.url);
    println!(
        "  alerts:          {}",
        config.alert.webhook.as_deref().unwrap_or("log only")
    );
    if let Some(web) = &config.web {
        println!("  status API:      {}", web.bind);
    }
    ExitCode::SUCCESS
}

async fn run(path: &str) -> Result<(), StartupError> {
    let config = Config::from_file(path)?;
    let policy = Arc::new(config.tracker_policy()?);

    let cache = Arc::new(DeviceCache::new());
    let stats = Arc::new(TrackerStats::default());

    let predictions: Arc<dyn PredictionSource> = Arc::new(SondeHubClient::new(
        &config.prediction.url,
        config.prediction.timeout,
    )?);
    let alerts: Arc<dyn AlertSink> = match &config.alert.webhook {
        Some(url) => Arc::new(WebhookSink::new(url, config.alert.timeout)?),
        None => Arc::new(LogSink),
    };

    let evaluator = LandingEvaluator::new(policy.clone(), cache.clone(), predictions, alerts);
    let sweeper = EvictionSweeper::new(cache.clone(), policy.retention, stats.clone());
    let dispatcher = IngestDispatcher::new(
        cache.clone(),
        evaluator,
        sweeper.clone(),
        policy.check_interval,
        stats.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (telemetry_tx, telemetry_rx) = mpsc::channel(INGEST_QUEUE_CAPACITY);

    log::info!(
        "Watching for sondes landing within {}km of {}",
        policy.landing_radius_km,
        config.observer.coordinates
    );

    let mut feed = tokio::spawn(FeedListener::new(config.feed.clone()).run(
        telemetry_tx,
        stats.clone(),
        shutdown_rx.clone(),
    ));
    let dispatch = tokio::spawn(dispatcher.run(telemetry_rx, shutdown_rx.clone()));
    let sweep = tokio::spawn(sweeper.run(config.sweep_interval, shutdown_rx.clone()));
    let server = config.web.as_ref().map(|web| {
        let state = AppState {
            policy: policy.clone(),
            observer_name: config.observer.name.clone(),
            cache: cache.clone(),
            stats: stats.clone(),
        };
        tokio::spawn(web::run_server(web.bind.clone(), state, shutdown_rx.clone()))
    });

    // The feed only returns on its own with a fatal FeedError.
    let feed_finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            log::info!("Shutting down");
            None
        }
        result = &mut feed => Some(result),
    };
    let _ = shutdown_tx.send(true);

    if let Err(e) = dispatch.await {
        log::error!("Dispatcher task failed: {}", e);
    }
    if let Err(e) = sweep.await {
        log::error!("Sweeper task failed: {}", e);
    }
    if let Some(server) = server {
        if let Ok(Err(e)) = server.await {
            log::error!("Status API failed: {}", e);
        }
    }
    let feed_result = match feed_finished {
        Some(result) => result,
        None => feed.await,
    };
    match feed_result {
        Ok(result) => result?,
        Err(e) => log::error!("Feed task failed: {}", e),
    }

    Ok(())
}

async fn check(path: &str, serial: &str) -> Result<(), StartupError> {
    let config = Config::from_file(path)?;
    let policy = config.tracker_policy()?;
    let client = SondeHubClient::new(&config.prediction.url, config.prediction.timeout)?;

    let trajectory = client.fetch(serial).await?;
    let Some(landing) = trajectory.landing_point() else {
        println!("No prediction for {}", serial);
        return Ok(());
    };

    let distance_km = landing.position.distance_km(&policy.observer);
    println!("Sonde {}", serial);
    println!(
        "  landing:   {:.5}, {:.5}",
        landing.position.latitude_deg, landing.position.longitude_deg
    );
    if let Some(time) = landing.time {
        println!("  at:        {}", time);
    }
    println!("  distance:  {:.1} km", distance_km);
    println!(
        "  alert:     {}",
        if distance_km < policy.landing_radius_km {
            "yes"
        } else {
            "no"
        }
    );
    Ok(())
}
