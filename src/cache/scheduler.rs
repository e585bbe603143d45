//! Background task that periodically reloads a [`TieredCache`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::error::RefreshError;
use super::reader::TieredCache;

/// Owns the refresh loop. Dropping it signals the loop to stop.
#[derive(Debug)]
pub struct RefreshScheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Spawn the loop on the current tokio runtime. The first reload happens
    /// one `interval` after spawning.
    pub fn spawn(cache: Arc<TieredCache>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_refresh_loop(cache, interval, shutdown_rx));
        info!(interval_secs = interval.as_secs(), "Auto-refresh enabled");
        Self {
            shutdown_tx,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the loop and wait for it to exit. An in-flight refresh
    /// completes first.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.await
        {
            warn!(error = %err, "Refresh task ended abnormally");
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn run_refresh_loop(
    cache: Arc<TieredCache>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The initial load already ran; skip the immediate tick.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match cache.refresh().await {
                    Ok(report) => debug!(generation = report.generation, "Scheduled refresh applied"),
                    Err(RefreshError::Disposed) => break,
                    Err(err) => warn!(error = %err, "Scheduled refresh failed; retrying next interval"),
                }
            }
        }
    }

    debug!(application = %cache.application_name(), "Refresh loop stopped");
}
