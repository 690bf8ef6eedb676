//! Periodic jobs that drive the relay passes.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use tbtc_relayer_sm::context::RelayerContext;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, error, info};

use crate::config::SchedulerConfig;

/// Spawns one interval loop per job. Every loop exits once `shutdown` flips, after the pass in
/// flight has finished.
pub(crate) fn spawn_jobs(
    ctx: Arc<RelayerContext>,
    cfg: &SchedulerConfig,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let secs = Duration::from_secs;

    vec![
        every("deposits", secs(cfg.deposit_interval_secs), shutdown.clone(), {
            let ctx = ctx.clone();
            move || {
                let ctx = ctx.clone();
                async move { ctx.run_deposit_pass().await }
            }
        }),
        every("bridge-events", secs(cfg.event_interval_secs), shutdown.clone(), {
            let ctx = ctx.clone();
            move || {
                let ctx = ctx.clone();
                async move { ctx.run_event_pass().await }
            }
        }),
        every("redemptions", secs(cfg.redemption_interval_secs), shutdown.clone(), {
            let ctx = ctx.clone();
            move || {
                let ctx = ctx.clone();
                async move { ctx.run_redemption_pass().await }
            }
        }),
        every("backfill", secs(cfg.backfill_interval_secs), shutdown.clone(), {
            let ctx = ctx.clone();
            move || {
                let ctx = ctx.clone();
                async move { ctx.run_backfill_pass().await }
            }
        }),
        every(
            "retention",
            secs(cfg.retention_sweep_interval_secs),
            shutdown,
            {
                let window = cfg.retention_window();
                move || sweep_settled_redemptions(ctx.clone(), window)
            },
        ),
    ]
}

/// Runs `job` immediately and then every `period` until shutdown.
fn every<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    job: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(job = name, ?period, "job scheduled");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!(job = name, "running");
                    job().await;
                }
                _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => break,
            }
        }

        info!(job = name, "job stopped");
    })
}

async fn sweep_settled_redemptions(ctx: Arc<RelayerContext>, window: Duration) {
    let Ok(window) = chrono::Duration::from_std(window) else {
        error!(?window, "retention window out of range, skipping sweep");
        return;
    };
    let cutoff = Utc::now() - window;

    match ctx
        .redemption_store()
        .delete_settled_redemptions_before(cutoff)
        .await
    {
        Ok(0) => debug!(%cutoff, "no settled redemptions to delete"),
        Ok(deleted) => info!(%cutoff, deleted, "deleted settled redemptions"),
        Err(err) => error!(%cutoff, %err, "retention sweep failed"),
    }
}
