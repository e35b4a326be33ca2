//! Collaborator traits: the seams between rule logic and external services.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CaseRecord, Message, RuleCategory};

/// Where cases come from (the CRM).
#[async_trait]
pub trait CaseSource: Send + Sync {
    /// Human-readable name of the backend.
    fn name(&self) -> &str;

    /// All cases currently owned by `queue_id`, in CRM order.
    async fn queue_cases(&self, queue_id: &str) -> Result<Vec<CaseRecord>>;

    /// Unresolved cases of the given owners idle longer than `min_idle_days`
    /// with no defect-tracker reference.
    async fn idle_cases(&self, owners: &[String], min_idle_days: f64) -> Result<Vec<CaseRecord>>;
}

/// Delivers messages to the fixed chat destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for logs (e.g. "slack").
    fn name(&self) -> &str;

    /// Post one message.
    async fn send(&self, message: &Message) -> Result<()>;
}

/// Deduplication ledger: which cases already fired which rule.
pub trait Ledger: Send + Sync {
    /// Has `case_number` been recorded under `category`?
    fn contains(&self, category: RuleCategory, case_number: &str) -> Result<bool>;

    /// Record `case_number` under `category`. Returns `true` if the entry is new.
    fn record(&self, category: RuleCategory, case_number: &str) -> Result<bool>;

    /// Every case number recorded under `category`, oldest first.
    fn recorded(&self, category: RuleCategory) -> Result<Vec<String>>;
}
