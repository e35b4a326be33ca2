//! Job handler wiring the case source, rules, ledger and notifier together.

use std::sync::Arc;

use async_trait::async_trait;
use fedbot_core::config::{ReportConfig, RulesConfig};
use fedbot_core::{CaseSource, FedBotConfig, Notifier, RefreshFailurePolicy, Result, RuleCategory, Snapshot};
use fedbot_rules::{Outcome, Rule, SnapshotCell, build_report, rule_for, run_rule};
use fedbot_scheduler::{DeliveryStatus, JobAction, JobHandler, LedgerDb};

/// Source name written to the delivery log for report messages.
const REPORT_SOURCE: &str = "idle-report";

pub struct Bot {
    source: Arc<dyn CaseSource>,
    notifier: Arc<dyn Notifier>,
    ledger: Arc<LedgerDb>,
    snapshot: SnapshotCell,
    rules: Vec<Box<dyn Rule>>,
    queue_id: String,
    policy: RefreshFailurePolicy,
    report: ReportConfig,
}

impl Bot {
    pub fn new(
        config: &FedBotConfig,
        source: Arc<dyn CaseSource>,
        notifier: Arc<dyn Notifier>,
        ledger: Arc<LedgerDb>,
    ) -> Self {
        Self {
            source,
            notifier,
            ledger,
            snapshot: SnapshotCell::new(),
            rules: build_rules(&config.rules, &config.salesforce.queue_name),
            queue_id: config.salesforce.queue_owner_id.clone(),
            policy: config.rules.on_refresh_failure,
            report: config.report.clone(),
        }
    }

    async fn refresh(&self) -> Result<()> {
        let _refreshing = self.snapshot.begin_refresh().await;
        match self.source.queue_cases(&self.queue_id).await {
            Ok(cases) => {
                tracing::debug!("📥 Snapshot refreshed from {}: {} case(s)", self.source.name(), cases.len());
                self.snapshot.replace(Snapshot::new(cases)).await;
                Ok(())
            }
            Err(e) => {
                self.snapshot.mark_stale().await;
                Err(e)
            }
        }
    }

    async fn check(&self, category: RuleCategory) -> Result<()> {
        let Some(rule) = self.rules.iter().find(|r| r.category() == category) else {
            tracing::warn!("⚠️ No rule registered for {category}");
            return Ok(());
        };
        let Some(snapshot) = self.snapshot.current(self.policy).await else {
            tracing::debug!("⏭️ [{category}] no usable snapshot, skipping");
            return Ok(());
        };

        let deliveries = run_rule(rule.as_ref(), &snapshot, self.ledger.as_ref(), self.notifier.as_ref()).await?;
        for delivery in &deliveries {
            let (status, error) = match &delivery.outcome {
                Outcome::Sent => (DeliveryStatus::Sent, None),
                Outcome::Failed(e) => (DeliveryStatus::Failed, Some(e.as_str())),
                Outcome::AlreadyRecorded => continue,
            };
            self.log_delivery(category.as_str(), Some(&delivery.case_number), status, error);
        }
        Ok(())
    }

    async fn idle_report(&self) -> Result<()> {
        let cases = self
            .source
            .idle_cases(&self.report.owners, self.report.idle_threshold_days)
            .await?;
        let message = build_report(&cases, &self.report);
        match self.notifier.send(&message).await {
            Ok(()) => {
                tracing::info!("📊 Idle report sent ({} case(s) queried)", cases.len());
                self.log_delivery(REPORT_SOURCE, None, DeliveryStatus::Sent, None);
                Ok(())
            }
            Err(e) => {
                self.log_delivery(REPORT_SOURCE, None, DeliveryStatus::Failed, Some(&e.to_string()));
                Err(e)
            }
        }
    }

    fn log_delivery(&self, source: &str, case_number: Option<&str>, status: DeliveryStatus, error: Option<&str>) {
        if let Err(e) = self.ledger.record_delivery(source, case_number, status, error) {
            tracing::warn!("⚠️ Failed to write delivery log: {e}");
        }
    }
}

fn build_rules(config: &RulesConfig, queue_name: &str) -> Vec<Box<dyn Rule>> {
    RuleCategory::ALL
        .into_iter()
        .map(|category| rule_for(category, config, queue_name))
        .collect()
}

#[async_trait]
impl JobHandler for Bot {
    async fn run(&self, action: JobAction) -> Result<()> {
        match action {
            JobAction::RefreshSnapshot => self.refresh().await,
            JobAction::CheckRule(category) => self.check(category).await,
            JobAction::IdleReport => self.idle_report().await,
        }
    }
}
