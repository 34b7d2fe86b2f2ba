use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use toolroom::engine::Engine;
use toolroom::notify::SignalHub;
use toolroom::remote::HttpRemote;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("TOOLROOM_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    toolroom::observability::init(metrics_port);

    let api_url = std::env::var("TOOLROOM_API_URL")
        .map_err(|_| "TOOLROOM_API_URL is not set")?;
    let refresh_secs: u64 = std::env::var("TOOLROOM_REFRESH_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(300);

    let remote = Arc::new(HttpRemote::new(api_url.clone()));
    let signals = Arc::new(SignalHub::new());
    let engine = Arc::new(Engine::new(remote, signals.clone()));

    engine.load().await?;
    {
        let state = engine.state.read().await;
        info!("toolroom started");
        info!("  remote: {api_url}");
        info!(
            "  loaded: {} bookings, {} open sessions, {} history entries",
            state.bookings.len(),
            state.sessions.len(),
            state.history.len()
        );
        info!("  refresh: every {refresh_secs}s");
        info!(
            "  metrics: {}",
            metrics_port.map_or("disabled".to_string(), |p| format!(
                "http://0.0.0.0:{p}/metrics"
            ))
        );
    }

    // Log settlements so rollbacks are visible in operation.
    let mut settle_rx = signals.subscribe();
    tokio::spawn(async move {
        while let Ok(signal) = settle_rx.recv().await {
            match signal.outcome {
                toolroom::notify::SignalOutcome::Confirmed => {
                    info!(op = signal.op, entity = %signal.entity, "mutation confirmed");
                }
                toolroom::notify::SignalOutcome::RolledBack(reason) => {
                    tracing::warn!(
                        op = signal.op,
                        entity = %signal.entity,
                        reason = %reason,
                        "mutation rolled back"
                    );
                }
            }
        }
    });

    // Graceful shutdown: stop the refresh loop on SIGTERM/ctrl-c.
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    let mut refresh = tokio::time::interval(Duration::from_secs(refresh_secs));
    refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    refresh.tick().await; // first tick fires immediately; state is already loaded

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                if let Err(e) = engine.load().await {
                    tracing::warn!("periodic refresh failed: {e}");
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("toolroom stopped");
    Ok(())
}
