//! Job definitions: what the scheduler runs and when.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local, Utc};
use fedbot_core::RuleCategory;
use serde::{Deserialize, Serialize};

use crate::cron;

/// What a job does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobAction {
    /// Replace the case snapshot from the case source.
    RefreshSnapshot,
    /// Evaluate one alerting rule against the current snapshot.
    CheckRule(RuleCategory),
    /// Build and send the idle-time report.
    IdleReport,
}

impl JobAction {
    /// Default job name for this action.
    pub fn job_name(&self) -> &'static str {
        match self {
            JobAction::RefreshSnapshot => "refresh-snapshot",
            JobAction::CheckRule(RuleCategory::PriorityEscalation) => "check-priority",
            JobAction::CheckRule(RuleCategory::CommitmentBreach) => "check-commitment",
            JobAction::CheckRule(RuleCategory::EntitlementMismatch) => "check-entitlement",
            JobAction::IdleReport => "idle-report",
        }
    }

    /// Replaces the shared snapshot.
    pub fn writes_snapshot(&self) -> bool {
        matches!(self, JobAction::RefreshSnapshot)
    }

    /// Evaluates the shared snapshot.
    pub fn reads_snapshot(&self) -> bool {
        matches!(self, JobAction::CheckRule(_))
    }
}

/// How/when the job triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobSchedule {
    /// Run every N seconds.
    Interval { every_secs: u64 },
    /// Run on a cron schedule, evaluated in local wall-clock time.
    Cron { expression: String },
}

/// Reentrancy guard shared between a job and its running instance.
#[derive(Debug, Clone, Default)]
pub struct JobGuard(Arc<AtomicBool>);

impl JobGuard {
    /// Claim the job. `None` while a previous run still holds it.
    pub fn try_acquire(&self) -> Option<JobPermit> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| JobPermit(self.0.clone()))
    }

    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Proof that a job instance is running. Releases the guard on drop.
#[derive(Debug)]
pub struct JobPermit(Arc<AtomicBool>);

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A scheduled job.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub action: JobAction,
    pub schedule: JobSchedule,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    /// Runs actually started.
    pub run_count: u32,
    /// Due runs skipped because the previous run was still in flight.
    pub skipped_count: u32,
    guard: JobGuard,
}

impl Job {
    /// Create a recurring interval job; first run one interval from now.
    pub fn interval(action: JobAction, every_secs: u64) -> Self {
        let next = Utc::now() + chrono::Duration::seconds(every_secs as i64);
        Self::build(action, JobSchedule::Interval { every_secs }, Some(next))
    }

    /// Create a cron-scheduled job.
    pub fn cron(action: JobAction, expression: &str) -> Self {
        let mut job = Self::build(
            action,
            JobSchedule::Cron {
                expression: expression.to_string(),
            },
            None,
        );
        job.next_run = job.compute_next(Utc::now());
        job
    }

    fn build(action: JobAction, schedule: JobSchedule, next_run: Option<DateTime<Utc>>) -> Self {
        Self {
            name: action.job_name().to_string(),
            action,
            schedule,
            enabled: true,
            last_run: None,
            next_run,
            run_count: 0,
            skipped_count: 0,
            guard: JobGuard::default(),
        }
    }

    /// Fire on the first tick instead of waiting one interval.
    pub fn starting_now(mut self) -> Self {
        self.next_run = Some(Utc::now());
        self
    }

    /// Check if this job is due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run.is_some_and(|next| now >= next)
    }

    /// Whether a run of this job is in flight.
    pub fn in_flight(&self) -> bool {
        self.guard.is_held()
    }

    pub fn guard(&self) -> &JobGuard {
        &self.guard
    }

    /// Next run after `now` according to the schedule.
    pub fn compute_next(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.schedule {
            JobSchedule::Interval { every_secs } => {
                Some(now + chrono::Duration::seconds(*every_secs as i64))
            }
            JobSchedule::Cron { expression } => {
                cron::next_run_from_cron(expression, &now.with_timezone(&Local))
                    .map(|t| t.with_timezone(&Utc))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_is_exclusive() {
        let guard = JobGuard::default();
        let permit = guard.try_acquire().unwrap();
        assert!(guard.is_held());
        assert!(guard.try_acquire().is_none());
        drop(permit);
        assert!(!guard.is_held());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn test_interval_job_due() {
        let job = Job::interval(JobAction::RefreshSnapshot, 30);
        let now = Utc::now();
        assert!(!job.is_due(now));
        assert!(job.is_due(now + chrono::Duration::seconds(31)));
        assert!(job.clone().starting_now().is_due(Utc::now()));
    }

    #[test]
    fn test_disabled_job_never_due() {
        let mut job = Job::interval(JobAction::IdleReport, 1).starting_now();
        job.enabled = false;
        assert!(!job.is_due(Utc::now() + chrono::Duration::days(1)));
    }

    #[test]
    fn test_cron_job_has_next_run() {
        let job = Job::cron(JobAction::IdleReport, "0 17 * * *");
        let next = job.next_run.unwrap();
        assert!(next > Utc::now());
        assert!(next <= Utc::now() + chrono::Duration::hours(25));
    }

    #[test]
    fn test_job_names() {
        assert_eq!(
            JobAction::CheckRule(RuleCategory::CommitmentBreach).job_name(),
            "check-commitment"
        );
        assert_eq!(Job::interval(JobAction::RefreshSnapshot, 30).name, "refresh-snapshot");
    }
}
