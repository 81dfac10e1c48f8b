//! Rill broker server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rill_core::blacklist::InMemoryBlacklist;
use rill_core::features::InMemoryFeatureGates;
use rill_core::registry::EventType;
use rill_core::stream::StreamMetrics;
use rill_core::subscription::stats::NoConsumerState;
use rill_core::subscription::{InMemorySubscriptionStore, SubscriptionService};
use rill_core::testing::{StaticApplications, StaticEventTypes};
use rill_kafka::{KafkaConsumerConfig, KafkaConsumerFactory};
use rill_server::{build_router, AppState};

/// Rill - HTTP-fronted event-streaming broker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address for the HTTP API
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Kafka bootstrap servers
    #[arg(long, default_value = "localhost:9092")]
    kafka_brokers: String,

    /// Consumer group id reported to Kafka
    #[arg(long, default_value = "rill-server")]
    group_id: String,

    /// JSON file listing the served event types
    #[arg(long, default_value = "rill-event-types.json")]
    event_types: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("rill={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rill server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let event_types = load_event_types(&args.event_types)?;
    let state = build_state(&args, event_types);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(bind = %args.bind, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Rill server stopped");
    Ok(())
}

fn load_event_types(path: &Path) -> Result<StaticEventTypes> {
    if !path.exists() {
        warn!(path = %path.display(), "event-type file not found, starting with none");
        return Ok(StaticEventTypes::new());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: Vec<EventType> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    info!(count = parsed.len(), "loaded event types");
    let mut registry = StaticEventTypes::new();
    for event_type in parsed {
        registry = registry.with(event_type);
    }
    Ok(registry)
}

fn build_state(args: &Args, event_types: StaticEventTypes) -> AppState {
    let event_types = Arc::new(event_types);
    let gates = Arc::new(InMemoryFeatureGates::new());
    let store = Arc::new(InMemorySubscriptionStore::new());
    let subscriptions = SubscriptionService::new(
        store,
        event_types.clone(),
        Arc::new(StaticApplications::new()),
        Arc::new(NoConsumerState),
        gates.clone(),
    );

    let kafka = KafkaConsumerConfig::new(&args.kafka_brokers, &args.group_id);
    AppState {
        subscriptions,
        event_types,
        consumer_factory: Arc::new(KafkaConsumerFactory::new(kafka)),
        blacklist: Arc::new(InMemoryBlacklist::new()),
        gates,
        stream_metrics: Arc::new(StreamMetrics::new()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
