//! Cron scheduling of the crawl and delivery cycles.
//!
//! Both cycles run on one [`JobScheduler`] in UTC. A tick that fails is
//! logged and the next tick runs as scheduled. A tick that fires while the
//! previous tick of the same cycle is still running is skipped.

mod cron;
mod cycle;
mod guard;

pub use cron::normalize_cron;
pub use cycle::{DeliveryOutcome, Pipeline};
pub use guard::{CycleGuard, CyclePermit};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ScheduleConfig;
use crate::error::{FeedhookError, Result};

fn scheduler_error(context: &str, e: JobSchedulerError) -> FeedhookError {
    FeedhookError::Scheduler(format!("{}: {}", context, e))
}

/// Owns the job scheduler and both cycle guards.
pub struct CycleScheduler {
    scheduler: JobScheduler,
    crawl_guard: CycleGuard,
    delivery_guard: CycleGuard,
    stopping: Arc<AtomicBool>,
    crawl_job_id: Uuid,
    delivery_job_id: Uuid,
}

impl CycleScheduler {
    /// Register the crawl and delivery jobs. Nothing runs until [`start`].
    ///
    /// [`start`]: CycleScheduler::start
    pub async fn new(pipeline: Arc<Pipeline>, schedule: &ScheduleConfig) -> Result<Self> {
        let crawl_cron = normalize_cron(&schedule.crawl_cron)?;
        let delivery_cron = normalize_cron(&schedule.notification_cron)?;

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| scheduler_error("creating scheduler", e))?;

        let crawl_guard = CycleGuard::new("crawl");
        let delivery_guard = CycleGuard::new("delivery");
        let stopping = Arc::new(AtomicBool::new(false));

        let crawl_job = {
            let pipeline = pipeline.clone();
            let guard = crawl_guard.clone();
            let stopping = stopping.clone();
            Job::new_async(crawl_cron.as_str(), move |_uuid, _l| {
                let pipeline = pipeline.clone();
                let guard = guard.clone();
                let stopping = stopping.clone();
                Box::pin(async move {
                    crawl_tick(&pipeline, &guard, &stopping).await;
                })
            })
            .map_err(|e| scheduler_error(&format!("creating crawl job for cron {crawl_cron}"), e))?
        };

        let delivery_job = {
            let guard = delivery_guard.clone();
            let stopping = stopping.clone();
            Job::new_async(delivery_cron.as_str(), move |_uuid, _l| {
                let pipeline = pipeline.clone();
                let guard = guard.clone();
                let stopping = stopping.clone();
                Box::pin(async move {
                    delivery_tick(&pipeline, &guard, &stopping).await;
                })
            })
            .map_err(|e| {
                scheduler_error(&format!("creating delivery job for cron {delivery_cron}"), e)
            })?
        };

        let crawl_job_id = scheduler
            .add(crawl_job)
            .await
            .map_err(|e| scheduler_error("adding crawl job", e))?;
        let delivery_job_id = scheduler
            .add(delivery_job)
            .await
            .map_err(|e| scheduler_error("adding delivery job", e))?;

        info!(job_id = %crawl_job_id, cron = %schedule.crawl_cron, "Crawl job created");
        info!(job_id = %delivery_job_id, cron = %schedule.notification_cron, "Delivery job created");

        Ok(Self {
            scheduler,
            crawl_guard,
            delivery_guard,
            stopping,
            crawl_job_id,
            delivery_job_id,
        })
    }

    /// Begin triggering ticks.
    pub async fn start(&self) -> Result<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| scheduler_error("starting scheduler", e))?;
        info!("Scheduler started");
        Ok(())
    }

    /// Stop triggering ticks and wait for in-flight ticks to finish.
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down scheduler");
        self.stopping.store(true, Ordering::SeqCst);

        let result = self
            .scheduler
            .shutdown()
            .await
            .map_err(|e| scheduler_error("shutting down scheduler", e));

        self.crawl_guard.wait_idle().await;
        self.delivery_guard.wait_idle().await;
        info!("Scheduler stopped");

        result
    }

    pub fn crawl_job_id(&self) -> Uuid {
        self.crawl_job_id
    }

    pub fn delivery_job_id(&self) -> Uuid {
        self.delivery_job_id
    }
}

/// Claim the cycle for one tick, unless shutting down or already running.
///
/// The stopping flag is read while holding the permit; every tick admitted
/// here is drained by [`CycleScheduler::shutdown`].
fn enter(guard: &CycleGuard, stopping: &AtomicBool) -> Option<CyclePermit> {
    let Some(permit) = guard.try_enter() else {
        warn!(cycle = guard.name(), "Previous tick still running, skipping");
        return None;
    };

    if stopping.load(Ordering::SeqCst) {
        return None;
    }
    Some(permit)
}

/// One scheduled crawl. Errors are logged, never propagated.
pub async fn crawl_tick(pipeline: &Pipeline, guard: &CycleGuard, stopping: &AtomicBool) {
    let Some(_permit) = enter(guard, stopping) else {
        return;
    };

    if let Err(e) = pipeline.run_crawl().await {
        error!(url = %pipeline.feed_url(), status = ?e.status(), error = %e, "Scheduled crawl failed");
    }
}

/// One scheduled delivery. Errors are logged, never propagated.
pub async fn delivery_tick(pipeline: &Pipeline, guard: &CycleGuard, stopping: &AtomicBool) {
    let Some(_permit) = enter(guard, stopping) else {
        return;
    };

    if let Err(e) = pipeline.run_delivery().await {
        error!(status = ?e.status(), error = %e, "Scheduled delivery failed");
    }
}
