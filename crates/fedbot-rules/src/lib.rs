//! # FedBot Rules
//!
//! Alerting rules over queue snapshots.
//!
//! ## Flow:
//! ```text
//! SnapshotCell ──→ evaluate(rule, snapshot, ledger) ──→ alerts
//!                                                        │
//!                       ledger.record() new? ──→ notifier.send()
//! ```

pub mod evaluator;
pub mod report;
pub mod rules;
pub mod snapshot;

pub use evaluator::{Delivery, Outcome, apply_alerts, evaluate, run_rule};
pub use report::build_report;
pub use rules::{CommitmentRule, EntitlementRule, PriorityRule, Rule, rule_for};
pub use snapshot::SnapshotCell;
