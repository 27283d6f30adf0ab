//! Background jobs that push reports through the notifier.

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{errors::Error, notify::Notifier, status::StatusReporter, Result};

/// Periodically sends the status report to the notification chat.
pub struct StatsNotifyJob {
    reporter: Arc<StatusReporter>,
    notifier: Notifier,
    every: Duration,
}

impl StatsNotifyJob {
    /// `every` must be non-zero.
    pub fn new(
        reporter: Arc<StatusReporter>,
        notifier: Notifier,
        every: Duration,
    ) -> Result<Self> {
        if every.is_zero() {
            return Err(Error::Config(
                "stats notify interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            reporter,
            notifier,
            every,
        })
    }

    /// Build and push one report. Returns whether it was delivered.
    pub async fn run_once(&self) -> bool {
        match self.reporter.build().await {
            Ok(report) => self.notifier.notify(&report).await,
            Err(e) => {
                warn!(error = %e, "stats notify job: status report failed");
                false
            }
        }
    }

    /// Spawn the job; it runs until `cancel` fires. The first report goes out
    /// one full interval after start.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(self.every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tick.tick().await;

            info!(every_secs = self.every.as_secs(), "stats notify job started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        self.run_once().await;
                    }
                }
            }
            info!("stats notify job stopped");
        })
    }
}
