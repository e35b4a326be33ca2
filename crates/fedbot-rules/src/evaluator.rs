//! Rule evaluation over a snapshot, and applying the resulting alerts.
//!
//! Evaluation is read-only: it consults the ledger but never writes it.
//! Application records each alert first and notifies only when the
//! ledger entry was new, so a case fires each rule at most once.

use std::collections::HashSet;

use fedbot_core::{Alert, FedBotError, Ledger, Notifier, Result, RuleCategory, Snapshot};

use crate::rules::Rule;

/// Alerts `rule` raises for `snapshot`, in snapshot order, skipping cases
/// already in the ledger. Cases lacking data the rule needs are skipped
/// with a warning.
pub fn evaluate(rule: &dyn Rule, snapshot: &Snapshot, ledger: &dyn Ledger) -> Result<Vec<Alert>> {
    let category = rule.category();
    let mut seen = HashSet::new();
    let mut alerts = Vec::new();

    for case in &snapshot.cases {
        if !seen.insert(case.case_number.as_str()) {
            continue;
        }
        let message = match rule.check(case) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(FedBotError::MalformedCase { case, reason }) => {
                tracing::warn!("⚠️ [{category}] skipping case {case}: {reason}");
                continue;
            }
            Err(e) => return Err(e),
        };
        if ledger.contains(category, &case.case_number)? {
            tracing::debug!("[{category}] {} already notified", case.case_number);
            continue;
        }
        alerts.push(Alert {
            category,
            case_number: case.case_number.clone(),
            message,
        });
    }
    Ok(alerts)
}

/// What happened to one alert.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Sent,
    /// Another run recorded it first; nothing was sent.
    AlreadyRecorded,
    /// Recorded, but the notifier failed. Not retried.
    Failed(String),
}

/// Result of applying one alert.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub category: RuleCategory,
    pub case_number: String,
    pub outcome: Outcome,
}

/// Record each alert, then notify for the ones that were new.
/// A ledger failure aborts the batch; a notifier failure does not.
pub async fn apply_alerts(
    alerts: Vec<Alert>,
    ledger: &dyn Ledger,
    notifier: &dyn Notifier,
) -> Result<Vec<Delivery>> {
    let mut deliveries = Vec::with_capacity(alerts.len());

    for alert in alerts {
        let outcome = if !ledger.record(alert.category, &alert.case_number)? {
            tracing::debug!("[{}] {} recorded concurrently", alert.category, alert.case_number);
            Outcome::AlreadyRecorded
        } else {
            match notifier.send(&alert.message).await {
                Ok(()) => {
                    tracing::info!(
                        "🔔 [{}] alert for case {} sent via {}",
                        alert.category,
                        alert.case_number,
                        notifier.name()
                    );
                    Outcome::Sent
                }
                Err(e) => {
                    tracing::error!(
                        "❌ [{}] alert for case {} failed: {e}",
                        alert.category,
                        alert.case_number
                    );
                    Outcome::Failed(e.to_string())
                }
            }
        };
        deliveries.push(Delivery {
            category: alert.category,
            case_number: alert.case_number,
            outcome,
        });
    }
    Ok(deliveries)
}

/// Evaluate and apply in one step.
pub async fn run_rule(
    rule: &dyn Rule,
    snapshot: &Snapshot,
    ledger: &dyn Ledger,
    notifier: &dyn Notifier,
) -> Result<Vec<Delivery>> {
    let alerts = evaluate(rule, snapshot, ledger)?;
    apply_alerts(alerts, ledger, notifier).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{CommitmentRule, EntitlementRule, PriorityRule};
    use async_trait::async_trait;
    use fedbot_channels::LogNotifier;
    use fedbot_core::config::RulesConfig;
    use fedbot_core::{CaseRecord, CommitmentStatus, Message, Priority};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryLedger {
        entries: Mutex<Vec<(RuleCategory, String)>>,
    }

    impl Ledger for MemoryLedger {
        fn contains(&self, category: RuleCategory, case_number: &str) -> Result<bool> {
            let entries = self.entries.lock().unwrap();
            Ok(entries.iter().any(|(c, n)| *c == category && n == case_number))
        }

        fn record(&self, category: RuleCategory, case_number: &str) -> Result<bool> {
            if self.contains(category, case_number)? {
                return Ok(false);
            }
            self.entries
                .lock()
                .unwrap()
                .push((category, case_number.to_string()));
            Ok(true)
        }

        fn recorded(&self, category: RuleCategory) -> Result<Vec<String>> {
            let entries = self.entries.lock().unwrap();
            Ok(entries
                .iter()
                .filter(|(c, _)| *c == category)
                .map(|(_, n)| n.clone())
                .collect())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send(&self, _message: &Message) -> Result<()> {
            Err(FedBotError::Notify("channel_not_found".into()))
        }
    }

    fn priority_case(number: &str, label: &str) -> CaseRecord {
        CaseRecord {
            priority: Priority::parse(label),
            entitlement: Some("Federal Support".into()),
            commitment: Some(CommitmentStatus::Pending),
            commitment_minutes: Some(45.0),
            ..CaseRecord::new(number)
        }
    }

    fn priority_rule() -> PriorityRule {
        PriorityRule::new(&RulesConfig::default(), "FED-WS1-ATL-POD")
    }

    #[tokio::test]
    async fn test_replay_is_idempotent() {
        let ledger = MemoryLedger::default();
        let notifier = LogNotifier::new();
        let snapshot = Snapshot::new(vec![
            priority_case("1", "1 - Critical"),
            priority_case("2", "2 - High"),
        ]);
        let rule = priority_rule();

        let first = run_rule(&rule, &snapshot, &ledger, &notifier).await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|d| d.outcome == Outcome::Sent));

        let second = run_rule(&rule, &snapshot, &ledger, &notifier).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(notifier.history().len(), 2);
        assert_eq!(ledger.recorded(RuleCategory::PriorityEscalation).unwrap(), ["1", "2"]);
    }

    #[tokio::test]
    async fn test_commitment_fires_once() {
        let ledger = MemoryLedger::default();
        let notifier = LogNotifier::new();
        let rule = CommitmentRule::new(&RulesConfig::default());
        let mut cases = vec![priority_case("45", "3 - Medium")];
        let mut late = priority_case("75", "3 - Medium");
        late.commitment_minutes = Some(75.0);
        let mut past = priority_case("-5", "3 - Medium");
        past.commitment_minutes = Some(-5.0);
        cases.extend([late, past]);
        let snapshot = Snapshot::new(cases);

        run_rule(&rule, &snapshot, &ledger, &notifier).await.unwrap();
        run_rule(&rule, &snapshot, &ledger, &notifier).await.unwrap();
        let history = notifier.history();
        assert_eq!(history.len(), 1);
        assert!(history[0].text.contains("|45>"));
    }

    #[test]
    fn test_entitlement_only_mismatch_alerts() {
        let ledger = MemoryLedger::default();
        let rule = EntitlementRule::new(&RulesConfig::default());
        let mut second = priority_case("B", "3 - Medium");
        second.entitlement = Some("Commercial Gold".into());
        let snapshot = Snapshot::new(vec![
            priority_case("A", "3 - Medium"),
            second,
            priority_case("C", "3 - Medium"),
        ]);

        let alerts = evaluate(&rule, &snapshot, &ledger).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].case_number, "B");
        assert!(alerts[0].message.text.contains("Entitlement Type: Commercial Gold"));
    }

    #[tokio::test]
    async fn test_categories_are_isolated() {
        let ledger = MemoryLedger::default();
        let notifier = LogNotifier::new();
        let mut case = priority_case("9", "1 - Critical");
        case.entitlement = Some("Commercial".into());
        let snapshot = Snapshot::new(vec![case]);

        run_rule(&priority_rule(), &snapshot, &ledger, &notifier).await.unwrap();
        let rule = EntitlementRule::new(&RulesConfig::default());
        let alerts = evaluate(&rule, &snapshot, &ledger).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].category, RuleCategory::EntitlementMismatch);
    }

    #[test]
    fn test_malformed_case_is_skipped() {
        let ledger = MemoryLedger::default();
        let snapshot = Snapshot::new(vec![
            CaseRecord::new("no-priority"),
            priority_case("ok", "2 - High"),
        ]);
        let alerts = evaluate(&priority_rule(), &snapshot, &ledger).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].case_number, "ok");
    }

    #[test]
    fn test_duplicate_case_in_snapshot_alerts_once() {
        let ledger = MemoryLedger::default();
        let snapshot = Snapshot::new(vec![
            priority_case("7", "1 - Critical"),
            priority_case("7", "1 - Critical"),
        ]);
        assert_eq!(evaluate(&priority_rule(), &snapshot, &ledger).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_already_recorded_is_not_sent() {
        let ledger = MemoryLedger::default();
        let notifier = LogNotifier::new();
        let snapshot = Snapshot::new(vec![priority_case("5", "1 - Critical")]);
        let alerts = evaluate(&priority_rule(), &snapshot, &ledger).unwrap();

        ledger.record(RuleCategory::PriorityEscalation, "5").unwrap();
        let deliveries = apply_alerts(alerts, &ledger, &notifier).await.unwrap();
        assert_eq!(deliveries[0].outcome, Outcome::AlreadyRecorded);
        assert!(notifier.history().is_empty());
    }

    #[tokio::test]
    async fn test_failed_send_stays_recorded() {
        let ledger = MemoryLedger::default();
        let snapshot = Snapshot::new(vec![priority_case("5", "1 - Critical")]);

        let deliveries = run_rule(&priority_rule(), &snapshot, &ledger, &FailingNotifier)
            .await
            .unwrap();
        assert!(matches!(deliveries[0].outcome, Outcome::Failed(ref e) if e.contains("channel_not_found")));
        assert!(ledger.contains(RuleCategory::PriorityEscalation, "5").unwrap());

        let again = run_rule(&priority_rule(), &snapshot, &ledger, &FailingNotifier)
            .await
            .unwrap();
        assert!(again.is_empty());
    }
}
