//! ASCEP Server
//!
//! Arbitrage signal and complex event processing engine behind an HTTP and
//! WebSocket API.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use ascep_core::config::ThresholdsStore;
use ascep_core::latency::LatencyTracker;
use ascep_core::processors::{
    BINANCE_STREAM_BASE, BinanceFeed, Dispatcher, EngineOptions, MockFeed, OutboxWriter,
    WriterOptions, load_rules,
};
use ascep_core::sinks::{
    BroadcastFanout, BroadcastSink, ChannelBroadcaster, DurableStore, InMemoryStore, PgStore,
    WebhookBroadcaster,
};
use clap::Parser;
use config::file::{FileConfig, StoreBackend};
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use shutdown::{shutdown_signal, spawn_config_reload_handler};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired records are removed from the durable store.
const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// ASCEP - arbitrage signal and CEP engine
#[derive(Parser, Debug)]
#[command(name = "ascep-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./ascep-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false")]
    log_json: bool,

    /// Run database migrations on startup (postgres store only)
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.log_json);

    tracing::info!("Starting ascep-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", config_loader.path());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Durable store
    let (store, db_pool) = open_store(&loaded_config, args.migrate).await?;

    // Broadcast sinks: the WebSocket channel plus any configured webhooks
    let engine_config = &loaded_config.engine;
    let stream = ChannelBroadcaster::new(loaded_config.server.stream_buffer);
    let channel_sink: Arc<dyn BroadcastSink> = Arc::new(stream.clone());
    let mut fanout = BroadcastFanout::new(vec![channel_sink])
        .with_sink_timeout(Duration::from_millis(engine_config.sink_timeout_ms));
    for webhook in &loaded_config.webhooks {
        let sink = WebhookBroadcaster::new(
            webhook.url.as_str(),
            webhook.topics.clone(),
            webhook.timeout_ms.map(Duration::from_millis),
        )
        .map_err(|e| {
            tracing::error!("Failed to build webhook client for {}: {}", webhook.url, e);
            e
        })?;
        fanout.push(Arc::new(sink));
    }
    tracing::info!(sinks = fanout.len(), "Broadcast sinks configured");

    // Engine
    let latency = LatencyTracker::new();
    let (mut dispatcher, engine, outbox_rx) = Dispatcher::new(
        EngineOptions {
            queue_capacity: engine_config.queue_capacity,
            outbox_capacity: engine_config.outbox_capacity,
            feed_signals_to_rules: engine_config.feed_signals_to_rules,
        },
        ThresholdsStore::new(loaded_config.thresholds),
        latency.clone(),
        shutdown_rx.clone(),
    )
    .await;

    let persisted = load_rules(store.as_ref()).await.map_err(|e| {
        tracing::error!("Failed to load persisted rules: {}", e);
        e
    })?;
    let restored = dispatcher.restore_rules(persisted);
    tracing::info!(restored, "Rules restored from store");

    spawn_purge_loop(store.clone(), shutdown_rx.clone());

    let writer = OutboxWriter::new(
        outbox_rx,
        store,
        Arc::new(fanout),
        WriterOptions {
            sink_timeout: Duration::from_millis(engine_config.sink_timeout_ms),
            signal_ttl: Duration::from_secs(engine_config.signal_ttl_secs),
        },
        latency,
    );

    let dispatcher_task = tokio::spawn(dispatcher.run());
    let writer_task = tokio::spawn(writer.run());

    if loaded_config.mock_feed.enabled {
        let feed = MockFeed::new(
            engine.clone(),
            &loaded_config.mock_feed.symbols,
            Duration::from_millis(loaded_config.mock_feed.interval_ms),
            shutdown_rx.clone(),
        );
        tokio::spawn(feed.run());
    }

    let binance_config = &loaded_config.binance_feed;
    if binance_config.enabled {
        let base_url = match &binance_config.url {
            Some(url) => url.clone(),
            None => url::Url::parse(BINANCE_STREAM_BASE)?,
        };
        let feed = BinanceFeed::new(
            engine.clone(),
            &base_url,
            &binance_config.symbols,
            Duration::from_millis(binance_config.reconnect_delay_ms),
            shutdown_rx.clone(),
        )?;
        tokio::spawn(feed.run());
    }

    // Spawn config reload handler (listens for SIGHUP)
    spawn_config_reload_handler(engine.clone(), config_loader, shutdown_rx);

    // Build the router
    let router = build_router(AppState::new(engine, stream));

    // Run the server
    let listen_addr = loaded_config.server.listen;
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr, shutdown_signal()).await;

    // Stop the engine; the writer drains the outbox once the dispatcher is gone
    let _ = shutdown_tx.send(true);
    if let Err(e) = dispatcher_task.await {
        tracing::error!(error = %e, "Dispatcher task failed");
    }
    if let Err(e) = writer_task.await {
        tracing::error!(error = %e, "OutboxWriter task failed");
    }

    if let Some(pool) = db_pool {
        tracing::info!("Closing database connections...");
        pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

async fn open_store(
    config: &FileConfig,
    migrate: bool,
) -> anyhow::Result<(Arc<dyn DurableStore>, Option<PgPool>)> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory store");
            Ok((Arc::new(InMemoryStore::new()), None))
        }
        StoreBackend::Postgres => {
            let database_url = get_database_url().map_err(|e| {
                tracing::error!("DATABASE_URL environment variable not set");
                e
            })?;

            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.store.max_connections)
                .connect(&database_url)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to database: {}", e);
                    e
                })?;
            tracing::info!("Database connection established");

            if migrate {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("../migrations")
                    .run(&db_pool)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to run migrations: {}", e);
                        e
                    })?;
                tracing::info!("Migrations completed successfully");
            }

            Ok((Arc::new(PgStore::new(db_pool.clone())), Some(db_pool)))
        }
    }
}

fn spawn_purge_loop(store: Arc<dyn DurableStore>, mut shutdown_rx: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    match store.purge_expired().await {
                        Ok(removed) => tracing::debug!(removed, "Purged expired records"),
                        Err(e) => tracing::warn!(error = %e, "Failed to purge expired records"),
                    }
                }
            }
        }
    });
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ascep_core=info,sqlx=warn,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
