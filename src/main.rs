// Draft board entry point.
//
// Startup sequence:
// 1. Initialize tracing (to stderr)
// 2. Load config
// 3. Connect to the roster store, load draft state
// 4. Subscribe to the change feed
// 5. Create channels
// 6. Spawn control server and update fan-out tasks
// 7. Wire Ctrl+C to a Quit intent
// 8. Run the application event loop until it exits

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use draft_board::app;
use draft_board::config;
use draft_board::draft::coordinator::TurnCoordinator;
use draft_board::protocol::Intent;
use draft_board::store::http::HttpStore;
use draft_board::store::RosterStore;
use draft_board::ws_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (to stderr)
    init_tracing()?;
    info!("Draft board starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: event={}, store={}",
        config.event.id, config.store.base_url
    );

    // 3. Connect to the roster store and load draft state
    let store: Arc<dyn RosterStore> = Arc::new(HttpStore::new(
        &config.store.base_url,
        &config.store.realtime_url,
        config.store.api_key.clone(),
    ));
    let coordinator = TurnCoordinator::load(
        store.clone(),
        &config.event.id,
        config.event.actor.clone(),
    )
    .await
    .context("failed to load draft state from the roster store")?;
    info!(
        "Draft state loaded: pick {} of {}",
        coordinator.snapshot().current_pick,
        coordinator.snapshot().total_picks
    );

    // 4. Subscribe to the change feed
    let subscription = store
        .subscribe(&config.event.id)
        .await
        .context("failed to subscribe to the change feed")?;

    // 5. Create channels
    let (intent_tx, intent_rx) = mpsc::channel(64);
    let (ui_tx, mut ui_rx) = mpsc::channel(256);
    let (update_tx, _) = broadcast::channel::<String>(256);

    // 6a. Spawn the control server
    let control_port = config.control.port;
    let server_intent_tx = intent_tx.clone();
    let server_update_tx = update_tx.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = ws_server::run(control_port, server_intent_tx, server_update_tx).await {
            error!("Control server error: {e}");
        }
    });

    // 6b. Fan updates out to every connected client as JSON
    let fanout_handle = tokio::spawn(async move {
        while let Some(update) = ui_rx.recv().await {
            match serde_json::to_string(&update) {
                // send only fails when no client is connected; fine to drop
                Ok(json) => {
                    let _ = update_tx.send(json);
                }
                Err(e) => warn!("Failed to serialize board update: {e}"),
            }
        }
    });

    // 7. Ctrl+C becomes a Quit intent so shutdown flows through one path
    let signal_intent_tx = intent_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received");
            let _ = signal_intent_tx.send(Intent::Quit).await;
        }
    });

    info!("Control server on 127.0.0.1:{control_port}, board ready");

    // 8. Run the event loop until Quit
    let state = app::AppState {
        coordinator,
        store,
        event_id: config.event.id.clone(),
    };
    app::run(state, subscription, intent_rx, ui_tx).await?;

    server_handle.abort();
    fanout_handle.abort();

    info!("Draft board shut down cleanly");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("draft_board=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
