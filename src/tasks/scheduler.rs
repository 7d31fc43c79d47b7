use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::cache::VerdictCache;

/// Registers the periodic expired-verdict sweep and starts the scheduler.
pub async fn configure_sweep_job(cron_spec: &str, cache: Arc<VerdictCache>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let job = Job::new_async(cron_spec, move |_id, _l| {
        let cache = cache.clone();
        Box::pin(async move {
            let removed = cache.sweep_expired();
            tracing::debug!(
                target: "scheduler",
                removed,
                remaining = cache.len(),
                "verdict cache sweep"
            );
        })
    })?;
    scheduler.add(job).await?;
    tracing::info!(target: "scheduler", cron = %cron_spec, "cache sweep job registered");
    scheduler.start().await?;
    Ok(scheduler)
}
