//! Internal interval trigger for deployments without an external scheduler.

use email_outbox::{Dispatcher, DEFAULT_CLAIM_LIMIT};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Run an invocation every `period` until `shutdown` flips to `true`.
///
/// Ticks that would overlap a slow invocation are delayed, not stacked.
pub(crate) async fn run_ticker(
    dispatcher: Dispatcher,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(period_secs = period.as_secs(), "Internal ticker started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match dispatcher.run(DEFAULT_CLAIM_LIMIT).await {
                    Ok(report) => debug!(processed = report.processed, "Tick finished"),
                    Err(e) => error!(error = %e, "Tick invocation failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Internal ticker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::{dispatcher_for, seeded_store};
    use email_outbox::OutboxStatus;

    #[tokio::test]
    async fn test_ticker_drains_until_shutdown() {
        let store = seeded_store(12);
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(run_ticker(
            dispatcher_for(store.clone()),
            Duration::from_millis(10),
            rx,
        ));

        for _ in 0..200 {
            let items = store.items().await;
            if items.iter().all(|item| item.status == OutboxStatus::Sent) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tx.send(true).unwrap();
        task.await.unwrap();

        let items = store.items().await;
        assert!(items.iter().all(|item| item.status == OutboxStatus::Sent));
        assert!(store.claim_calls().await >= 2);
    }

    #[tokio::test]
    async fn test_ticker_stops_when_sender_dropped() {
        let store = seeded_store(0);
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(run_ticker(
            dispatcher_for(store),
            Duration::from_secs(3600),
            rx,
        ));
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
