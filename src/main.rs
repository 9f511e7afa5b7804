//! HedgeBot - Temperature Bucket Hedge Server
//! Mission: Price NO-side hedges across complete bucket sets
//! Philosophy: Stateless engine, fresh snapshot, every number explained

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, time::interval};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hedgebot_backend::{
    api::{create_router, AppState},
    config::{load_env, load_hedge_config, ServerConfig},
    hedge::HedgeCalculator,
    store::GroupStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("🚀 HedgeBot starting");

    let server_config = ServerConfig::from_env();
    let hedge_config = load_hedge_config().context("Failed to load hedge config")?;
    info!(
        fee = hedge_config.default_fee_per_contract,
        exit_threshold = hedge_config.exit.threshold,
        simulations = hedge_config.simulation.num_simulations,
        "⚙️ hedge engine configured"
    );

    let store = Arc::new(
        GroupStore::open(&server_config.markets_path).context("Failed to load market snapshot")?,
    );

    if server_config.refresh_secs > 0 {
        spawn_snapshot_refresh(store.clone(), Duration::from_secs(server_config.refresh_secs));
    } else {
        info!("⏸️ snapshot refresh disabled");
    }

    let app = create_router(AppState {
        store,
        calculator: Arc::new(HedgeCalculator::new(hedge_config)),
    })
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive());

    let addr = server_config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hedgebot_backend=debug,hedgebot=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Reload the snapshot file on a fixed cadence
fn spawn_snapshot_refresh(store: Arc<GroupStore>, every: Duration) {
    info!(secs = every.as_secs(), "🔄 snapshot refresh every {:?}", every);
    tokio::spawn(async move {
        let mut ticker = interval(every);
        // First tick fires immediately; the snapshot was just loaded
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let store = store.clone();
            match tokio::task::spawn_blocking(move || store.refresh()).await {
                Ok(Ok(())) => {}
                // Already logged by the store; the previous catalog stays live
                Ok(Err(_)) => debug!("snapshot refresh skipped"),
                Err(e) => warn!("snapshot refresh task failed: {}", e),
            }
        }
    });
}
