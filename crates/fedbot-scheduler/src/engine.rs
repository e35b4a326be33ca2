//! Scheduler Engine: the main loop that checks and triggers jobs.
//! Uses tokio::interval for ticking (sleeps between checks). Each due job
//! runs on its own task behind its reentrancy guard. Rule checks due on the
//! same tick as a snapshot refresh start once that refresh has finished.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fedbot_core::{FedBotError, Result};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::jobs::{Job, JobAction, JobPermit, JobSchedule};

/// Executes job actions. Implemented by the bot runtime.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn run(&self, action: JobAction) -> Result<()>;
}

/// A job that came due and whose guard was acquired.
#[derive(Debug)]
pub struct DueJob {
    pub name: String,
    pub action: JobAction,
    pub permit: JobPermit,
}

/// The scheduler engine. Owns the job list and decides what fires.
#[derive(Debug, Default)]
pub struct SchedulerEngine {
    jobs: Vec<Job>,
}

impl SchedulerEngine {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    /// Add a job. Cron jobs whose expression yields no next run are rejected.
    pub fn add_job(&mut self, job: Job) -> Result<()> {
        if let JobSchedule::Cron { expression } = &job.schedule
            && job.next_run.is_none()
        {
            return Err(FedBotError::Scheduler(format!(
                "job '{}': cron expression '{}' never fires",
                job.name, expression
            )));
        }
        if self.jobs.iter().any(|j| j.name == job.name) {
            return Err(FedBotError::Scheduler(format!(
                "job '{}' already scheduled",
                job.name
            )));
        }
        tracing::info!("📅 Job added: '{}' ({:?})", job.name, job.schedule);
        self.jobs.push(job);
        Ok(())
    }

    /// List all jobs.
    pub fn list_jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Get job count.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Enable/disable a job by name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.jobs.iter_mut().find(|j| j.name == name) {
            Some(job) => {
                job.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Collect due jobs at `now` and advance their schedules.
    /// A due job still in flight is skipped for this slot.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<DueJob> {
        let mut due = Vec::new();

        for job in self.jobs.iter_mut() {
            if !job.is_due(now) {
                continue;
            }
            job.next_run = job.compute_next(now);

            match job.guard().try_acquire() {
                Some(permit) => {
                    job.last_run = Some(now);
                    job.run_count += 1;
                    tracing::debug!("🔔 Job due: '{}' (run #{})", job.name, job.run_count);
                    due.push(DueJob {
                        name: job.name.clone(),
                        action: job.action,
                        permit,
                    });
                }
                None => {
                    job.skipped_count += 1;
                    tracing::warn!(
                        "⏳ Job '{}' still running, skipping this slot ({} skipped so far)",
                        job.name,
                        job.skipped_count
                    );
                }
            }
        }

        due
    }
}

/// Run the scheduler loop until `shutdown` resolves, then wait for
/// in-flight jobs to finish.
pub async fn run_scheduler<H, S>(
    engine: Arc<Mutex<SchedulerEngine>>,
    handler: Arc<H>,
    check_interval_secs: u64,
    shutdown: S,
) where
    H: JobHandler,
    S: Future<Output = ()>,
{
    tracing::info!(
        "⏰ Scheduler started (check every {}s)",
        check_interval_secs
    );

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(check_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut running: JoinSet<()> = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {}
        }

        while running.try_join_next().is_some() {}

        let due = {
            let mut eng = engine.lock().await;
            eng.tick(Utc::now())
        };

        spawn_due(&mut running, &handler, due);
    }

    if !running.is_empty() {
        tracing::info!("🛑 Scheduler stopping, waiting for {} running job(s)", running.len());
    }
    while running.join_next().await.is_some() {}
    tracing::info!("🛑 Scheduler stopped");
}

/// Spawn one tick's due jobs. Jobs that read the snapshot wait for a
/// refresh due on the same tick, so they evaluate what it fetched.
fn spawn_due<H: JobHandler>(running: &mut JoinSet<()>, handler: &Arc<H>, due: Vec<DueJob>) {
    let (refreshes, rest): (Vec<DueJob>, Vec<DueJob>) =
        due.into_iter().partition(|j| j.action.writes_snapshot());
    let (readers, independent): (Vec<DueJob>, Vec<DueJob>) =
        rest.into_iter().partition(|j| j.action.reads_snapshot());

    for job in independent {
        running.spawn(run_job(handler.clone(), job));
    }

    if refreshes.is_empty() {
        for job in readers {
            running.spawn(run_job(handler.clone(), job));
        }
        return;
    }

    let handler = handler.clone();
    running.spawn(async move {
        for job in refreshes {
            run_job(handler.clone(), job).await;
        }
        let mut followers = JoinSet::new();
        for job in readers {
            followers.spawn(run_job(handler.clone(), job));
        }
        while followers.join_next().await.is_some() {}
    });
}

async fn run_job<H: JobHandler>(handler: Arc<H>, job: DueJob) {
    let DueJob { name, action, permit } = job;
    let started = std::time::Instant::now();
    match handler.run(action).await {
        Ok(()) => tracing::debug!(
            "✅ Job '{}' finished in {}ms",
            name,
            started.elapsed().as_millis()
        ),
        Err(e) => tracing::warn!("⚠️ Job '{}' failed: {e}", name),
    }
    drop(permit);
}
