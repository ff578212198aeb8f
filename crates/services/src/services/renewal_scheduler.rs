//! Background job that keeps MoU expiry alerts and expirations current.

use std::time::Duration;

use sqlx::PgPool;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use super::mou_renewal::{MouRenewalError, MouRenewalService};

pub struct RenewalScheduler {
    service: MouRenewalService,
    poll_interval: Duration,
}

impl RenewalScheduler {
    /// Spawn the scheduler; `None` when the interval is zero (disabled).
    pub fn spawn(pool: PgPool, poll_interval: Duration) -> Option<tokio::task::JoinHandle<()>> {
        if poll_interval.is_zero() {
            info!("Renewal scheduler disabled");
            return None;
        }
        let scheduler = Self {
            service: MouRenewalService::new(pool),
            poll_interval,
        };
        Some(tokio::spawn(async move {
            scheduler.start().await;
        }))
    }

    async fn start(&self) {
        info!(
            "Starting renewal scheduler with interval {:?}",
            self.poll_interval
        );

        let mut interval = interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let Err(e) = self.run_once().await {
                error!("Error running renewal scheduler: {}", e);
            }
        }
    }

    /// Expire overdue MoUs first so they do not receive threshold alerts.
    async fn run_once(&self) -> Result<(), MouRenewalError> {
        let expiry = self.service.auto_expire().await?;
        let alerts = self.service.process_alerts().await?;
        debug!(
            expired = expiry.expired,
            scheduled = alerts.scheduled,
            sent = alerts.processed,
            "Renewal scheduler cycle complete"
        );
        Ok(())
    }
}
