//! Ledger Reaper
//!
//! Periodically turns `RETRYING` claims whose lease has expired into `FAILED`,
//! so a delivery abandoned by a crashed process is surfaced instead of being
//! skipped forever.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::domain::IdempotencyLedger;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

pub struct LedgerReaper {
    ledger: Arc<dyn IdempotencyLedger>,
    interval: Duration,
}

impl LedgerReaper {
    pub fn new(ledger: Arc<dyn IdempotencyLedger>, interval: Duration) -> Self {
        Self { ledger, interval }
    }

    /// One sweep; returns the number of claims marked `FAILED`.
    #[instrument(skip(self), level = "debug")]
    pub async fn run_once(&self) -> Result<u64, AppError> {
        let reaped = self.ledger.reap_expired(Utc::now()).await?;
        if reaped > 0 {
            metrics::record_reaped(reaped);
            info!(reaped, "Marked expired claims as FAILED");
        } else {
            debug!("No expired claims");
        }
        Ok(reaped)
    }

    /// Sweep every interval until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "Ledger reaper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Ledger reaper sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Ledger reaper stopped");
    }
}
