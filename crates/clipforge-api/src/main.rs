//! ClipForge server binary: HTTP surface, scheduler and worker pool in
//! one process.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipforge_api::{create_router, handlers, metrics, ApiConfig, AppState};
use clipforge_asr::AsrClient;
use clipforge_blob::{BlobStore, DeliveryConfig, DeliveryUrlSigner};
use clipforge_queue::{EventBus, Scheduler, SchedulerConfig};
use clipforge_store::Store;
use clipforge_worker::{
    FfmpegBackend, JobExecutor, LoggingCreditSink, ProcessingContext, WorkerConfig,
};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("clipforge=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting clipforge-server");

    // Initialization order: config, blob store, job store, event bus,
    // scheduler, worker pool, HTTP surface. Teardown reverses via
    // graceful shutdown.
    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    let blobs = match BlobStore::from_env().await {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to open blob store: {}", e);
            std::process::exit(1);
        }
    };

    let store = match Store::from_env().await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to open job store: {}", e);
            std::process::exit(1);
        }
    };

    let ring_size = std::env::var("EVENT_RING_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(clipforge_queue::DEFAULT_RING_SIZE);
    let events = EventBus::new(ring_size);

    let scheduler_config = SchedulerConfig::from_env();
    let (scheduler, assignments) = Scheduler::new(
        scheduler_config,
        store.clone(),
        blobs.clone(),
        events.clone(),
    );

    // Return orphaned RUNNING jobs to the queue before dispatch starts.
    match scheduler.recover().await {
        Ok(n) if n > 0 => info!("Recovered {} jobs at startup", n),
        Ok(_) => {}
        Err(e) => error!("Startup recovery failed: {}", e),
    }
    tokio::spawn(Arc::clone(&scheduler).run());

    // Worker pool
    let asr = match AsrClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create ASR client: {}", e);
            std::process::exit(1);
        }
    };
    let ctx = Arc::new(ProcessingContext {
        store: store.clone(),
        blobs: blobs.clone(),
        events: events.clone(),
        backend: FfmpegBackend::new(asr),
        config: WorkerConfig::from_env(),
    });
    let executor = Arc::new(JobExecutor::new(
        ctx,
        Arc::clone(&scheduler),
        Arc::new(LoggingCreditSink),
    ));
    tokio::spawn(executor.run(assignments));

    let signer = DeliveryUrlSigner::new(DeliveryConfig::from_env());
    let state = AppState::new(config.clone(), blobs, store, events, scheduler, signer);

    // Expire stale upload sessions in the background.
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(600));
            loop {
                ticker.tick().await;
                let swept = handlers::upload::sweep_expired_uploads(&state).await;
                if swept > 0 {
                    info!("Swept {} expired upload sessions", swept);
                }
            }
        });
    }

    // Metrics
    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);
    let metrics_handle = if metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics())
    } else {
        None
    };

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
