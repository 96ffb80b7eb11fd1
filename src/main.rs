//! IRIS backend: voice assistant HTTP service.
//!
//! Single-binary Tokio application that:
//! 1. Loads configuration from `.env`, an optional TOML file, and the environment
//! 2. Routes utterances through the per-client wake/sleep state machine
//! 3. Answers weather questions via IP geolocation and WeatherAPI.com
//! 4. Periodically sweeps idle sessions and stale cache entries

mod config;
mod server;

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use assistant::{IntentRouter, SessionStore};
use common::AppConfig;
use geo_client::GeoResolver;
use weather_client::{WeatherApiClient, WeatherLookup, WeatherProvider};

/// IRIS voice assistant backend
#[derive(Parser)]
#[command(name = "iris-backend", about = "IRIS voice assistant backend")]
struct Cli {
    /// Path to the TOML config file (optional; defaults apply when missing).
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the listen address, e.g. 127.0.0.1:5000.
    #[arg(long)]
    bind: Option<String>,

    /// Validate configuration, print it, and exit.
    #[arg(long)]
    check_config: bool,
}

fn build_router(cfg: &AppConfig) -> Result<IntentRouter, common::Error> {
    let geo = GeoResolver::from_config(&cfg.geolocation)?;
    let provider: Arc<dyn WeatherProvider> =
        Arc::new(WeatherApiClient::from_config(&cfg.weather_api_key, &cfg.weather)?);
    let weather = WeatherLookup::new(provider, cfg.weather.cache_capacity);

    Ok(IntentRouter::new(
        SessionStore::new(),
        Arc::new(geo),
        Arc::new(weather),
    ))
}

/// Sweep idle sessions and stale locations, then log a heartbeat line.
fn run_maintenance(router: &IntentRouter, idle_ttl_secs: u64) {
    let stale = router.geo().cache().purge_stale();
    let idle = if idle_ttl_secs > 0 {
        let max_idle = chrono::Duration::seconds(i64::try_from(idle_ttl_secs).unwrap_or(i64::MAX));
        router.sessions().purge_idle(max_idle)
    } else {
        0
    };
    if stale > 0 || idle > 0 {
        info!("Evicted {} idle session(s), {} stale location(s)", idle, stale);
    }

    let counts = router.sessions().counts();
    let stats = router.weather().stats();
    info!(
        "💓 HEARTBEAT | clients={} active={} sleeping={} | locations={} | weather cache={} hits={} misses={} evictions={}",
        counts.total,
        counts.active,
        counts.sleeping,
        router.geo().cache().len(),
        router.weather().cached_entries(),
        stats.hits,
        stats.misses,
        stats.evictions
    );
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received");
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "iris_backend=info,assistant=info,geo_client=info,weather_client=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("🎙️  IRIS backend starting up...");

    let cfg = match config::load_config(&cli.config, cli.bind.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if cfg.weather_api_configured() {
        info!("Weather API key loaded");
    } else {
        warn!("WEATHER_API_KEY not set; weather questions will get the apology reply");
    }
    info!(
        "Geolocation: {} provider(s) {:?}, min interval {}ms, cache ttl {}s",
        cfg.geolocation.providers.len(),
        cfg.geolocation
            .providers
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>(),
        cfg.geolocation.min_interval_ms,
        cfg.geolocation.cache_ttl_secs
    );
    info!("Wake phrases: {:?}", assistant::intent::WAKE_PHRASES);

    if cli.check_config {
        match toml::to_string_pretty(&cfg) {
            Ok(rendered) => println!("{}", rendered),
            Err(e) => {
                error!("Failed to render config: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let router = match build_router(&cfg) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            error!("Startup error: {}", e);
            std::process::exit(1);
        }
    };

    // Maintenance / heartbeat loop.
    {
        let router = router.clone();
        let idle_ttl_secs = cfg.sessions.idle_ttl_secs;
        let period = Duration::from_secs(cfg.sessions.sweep_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick fires immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                run_maintenance(&router, idle_ttl_secs);
            }
        });
    }

    let listener = match TcpListener::bind(&cfg.bind).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", cfg.bind, e);
            std::process::exit(1);
        }
    };
    info!("🚀 Listening on http://{}", cfg.bind);

    let app = server::app(server::AppState::new(router));
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("👋 IRIS backend stopped");
}
