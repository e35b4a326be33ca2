//! # FedBot Scheduler
//!
//! Job scheduling and the deduplication ledger.
//!
//! ## Architecture
//! ```text
//! SchedulerEngine (tokio interval, tick every 5s)
//!   ├── IntervalJob: every 30s → refresh-snapshot
//!   ├── IntervalJob: every 30s → check-priority / check-commitment / check-entitlement
//!   ├── CronJob: "0 17 * * *" → idle-report
//!   └── on due → JobGuard (skip if still running) → spawn JobHandler::run
//!
//! LedgerDb (SQLite)
//!   ├── ledger(category, case_number) : dedup, INSERT OR IGNORE
//!   └── deliveries: outcome of each notifier call
//! ```

pub mod cron;
pub mod engine;
pub mod jobs;
pub mod ledger;

pub use engine::{DueJob, JobHandler, SchedulerEngine, run_scheduler};
pub use jobs::{Job, JobAction, JobGuard, JobPermit, JobSchedule};
pub use ledger::{DeliveryRecord, DeliveryStatus, LedgerDb};
