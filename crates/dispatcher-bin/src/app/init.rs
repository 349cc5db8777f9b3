//! Dispatcher construction and the two run modes.

use crate::app::{router, ticker, AppState};
use dispatcher_config_and_utils::Config;
use email_outbox::{clamp_limit, Dispatcher, ResendSender, RetryPolicy, SenderConfig};
use outbox_store::SupabaseOutboxStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// Wire the Supabase store and the Resend sender into a dispatcher.
fn build_dispatcher(config: &Config) -> Result<Dispatcher, Box<dyn std::error::Error>> {
    let supabase_url = config.supabase_url()?;

    let store = SupabaseOutboxStore::new(
        supabase_url.as_str(),
        config.supabase_service_role_key.as_str(),
        config.http_timeout(),
    )?;

    let sender = ResendSender::new(
        SenderConfig {
            api_url: config.resend_api_url.clone(),
            from: config.email_from.clone(),
            timeout_secs: config.http_timeout_secs,
        },
        &config.resend_api_key,
    )?;

    let policy = RetryPolicy {
        max_attempts: i32::try_from(config.max_attempts).unwrap_or(i32::MAX),
        ..RetryPolicy::default()
    };

    Ok(Dispatcher::new(
        Arc::new(store),
        Arc::new(sender),
        policy,
        config.worker_count,
    ))
}

/// Serve the trigger endpoint until SIGINT or SIGTERM.
pub async fn serve(
    config: Config,
    bind: Option<String>,
    tick_secs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(config = ?config, "Starting outbox dispatcher");

    let dispatcher = build_dispatcher(&config)?;
    let bind_addr = bind.unwrap_or_else(|| config.bind_addr.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ticker_task = tick_secs.filter(|secs| *secs > 0).map(|secs| {
        tokio::spawn(ticker::run_ticker(
            dispatcher.clone(),
            Duration::from_secs(secs),
            shutdown_rx.clone(),
        ))
    });

    let state = AppState::new(dispatcher, config.cron_secret.as_str());
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "Trigger endpoint listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = ticker_task {
        let _ = task.await;
    }

    info!("Outbox dispatcher stopped");
    Ok(())
}

/// Run one invocation and print the counts as JSON.
pub async fn drain(config: Config, limit: Option<i64>) -> Result<(), Box<dyn std::error::Error>> {
    let dispatcher = build_dispatcher(&config)?;
    let report = dispatcher.run(clamp_limit(limit)).await?;

    println!(
        "{}",
        serde_json::json!({
            "success": true,
            "processed": report.processed,
            "sent": report.sent,
            "retried": report.retried,
            "failed": report.failed,
            "record_errors": report.record_errors,
        })
    );
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let term = async {
        if let Ok(mut s) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            s.recv().await;
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = term => {},
    }
    info!("Shutdown signal received");
}
