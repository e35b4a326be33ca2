//! The three alerting rules. Each looks at one case at a time and decides
//! whether it fires; deduplication is the evaluator's job.

use fedbot_core::config::RulesConfig;
use fedbot_core::{CaseRecord, CommitmentStatus, Message, Result, RuleCategory};

/// Shown when the CRM has no customer name for a case.
const UNKNOWN_CUSTOMER: &str = "N/A";

/// A per-case alerting condition.
pub trait Rule: Send + Sync {
    /// Ledger namespace this rule records under.
    fn category(&self) -> RuleCategory;

    /// `Ok(Some(message))` when the case meets the condition, `Ok(None)` when
    /// it does not. An error means the case lacks data the rule needs.
    fn check(&self, case: &CaseRecord) -> Result<Option<Message>>;
}

/// First `limit` characters of `s`, never splitting a character.
pub fn truncate_chars(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn customer(case: &CaseRecord) -> &str {
    case.customer.as_deref().unwrap_or(UNKNOWN_CUSTOMER)
}

/// Alerts on cases in the top severities.
#[derive(Debug, Clone)]
pub struct PriorityRule {
    pub max_level: u8,
    pub queue_name: String,
    pub description_limit: usize,
}

impl PriorityRule {
    pub fn new(config: &RulesConfig, queue_name: &str) -> Self {
        Self {
            max_level: config.escalation_max_level,
            queue_name: queue_name.to_string(),
            description_limit: config.description_limit,
        }
    }
}

impl Rule for PriorityRule {
    fn category(&self) -> RuleCategory {
        RuleCategory::PriorityEscalation
    }

    fn check(&self, case: &CaseRecord) -> Result<Option<Message>> {
        let priority = case.priority()?;
        if priority.level == 0 || priority.level > self.max_level {
            return Ok(None);
        }
        let description = truncate_chars(
            case.description.as_deref().unwrap_or_default(),
            self.description_limit,
        );
        Ok(Some(Message::block(format!(
            "<!here> {} ALERT: <{}|{}> has been added to the {} queue.\n\nCustomer: {}\nDescription: {}",
            priority,
            case.link_or_number(),
            case.case_number,
            self.queue_name,
            customer(case),
            description
        ))))
    }
}

/// Alerts on pending cases whose first-response commitment is minutes away.
#[derive(Debug, Clone)]
pub struct CommitmentRule {
    pub window_minutes: f64,
}

impl CommitmentRule {
    pub fn new(config: &RulesConfig) -> Self {
        Self {
            window_minutes: config.commitment_window_minutes,
        }
    }
}

impl Rule for CommitmentRule {
    fn category(&self) -> RuleCategory {
        RuleCategory::CommitmentBreach
    }

    fn check(&self, case: &CaseRecord) -> Result<Option<Message>> {
        if case.commitment.unwrap_or(CommitmentStatus::Pending) != CommitmentStatus::Pending {
            return Ok(None);
        }
        let minutes = case.commitment_minutes()?;
        if minutes <= 0.0 || minutes >= self.window_minutes {
            return Ok(None);
        }
        Ok(Some(Message::block(format!(
            "<!here> <{}|{}> has {} minutes until missed commit.",
            case.link_or_number(),
            case.case_number,
            minutes
        ))))
    }
}

/// Alerts on cases whose entitlement lacks the required keyword.
#[derive(Debug, Clone)]
pub struct EntitlementRule {
    keyword: String,
}

impl EntitlementRule {
    pub fn new(config: &RulesConfig) -> Self {
        Self {
            keyword: config.entitlement_keyword.trim().to_lowercase(),
        }
    }

    /// Keyword with its first letter capitalised, as it appears in alerts.
    pub fn display_keyword(&self) -> String {
        let mut chars = self.keyword.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl Rule for EntitlementRule {
    fn category(&self) -> RuleCategory {
        RuleCategory::EntitlementMismatch
    }

    fn check(&self, case: &CaseRecord) -> Result<Option<Message>> {
        let label = case.entitlement()?;
        if label.to_lowercase().contains(&self.keyword) {
            return Ok(None);
        }
        Ok(Some(Message::block(format!(
            "<!here> <{}|{}> does not have a {} entitlement according to SalesForce.\n\nCustomer: {}\nEntitlement Type: {}",
            case.link_or_number(),
            case.case_number,
            self.display_keyword(),
            customer(case),
            label
        ))))
    }
}

/// Build the rule for `category` from config.
pub fn rule_for(category: RuleCategory, config: &RulesConfig, queue_name: &str) -> Box<dyn Rule> {
    match category {
        RuleCategory::PriorityEscalation => Box::new(PriorityRule::new(config, queue_name)),
        RuleCategory::CommitmentBreach => Box::new(CommitmentRule::new(config)),
        RuleCategory::EntitlementMismatch => Box::new(EntitlementRule::new(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedbot_core::{FedBotError, Priority};

    fn case(number: &str) -> CaseRecord {
        CaseRecord {
            link: Some(format!("https://crm.test/{number}")),
            customer: Some("Agency X".into()),
            commitment: Some(CommitmentStatus::Pending),
            ..CaseRecord::new(number)
        }
    }

    fn with_priority(label: &str) -> CaseRecord {
        CaseRecord {
            priority: Priority::parse(label),
            description: Some("VPN down".into()),
            ..case("100")
        }
    }

    fn with_minutes(minutes: f64) -> CaseRecord {
        CaseRecord {
            commitment_minutes: Some(minutes),
            ..case("200")
        }
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo wörld", 7), "héllo w");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_priority_levels() {
        let rule = PriorityRule::new(&RulesConfig::default(), "FED-WS1-ATL-POD");
        assert!(rule.check(&with_priority("1 - Critical")).unwrap().is_some());
        assert!(rule.check(&with_priority("2 - High")).unwrap().is_some());
        assert!(rule.check(&with_priority("3 - Medium")).unwrap().is_none());
        assert!(rule.check(&with_priority("4 - Low")).unwrap().is_none());
    }

    #[test]
    fn test_priority_message() {
        let rule = PriorityRule::new(&RulesConfig::default(), "FED-WS1-ATL-POD");
        let msg = rule.check(&with_priority("1 - Critical")).unwrap().unwrap();
        assert_eq!(
            msg.text,
            "<!here> 1 - Critical ALERT: <https://crm.test/100|100> has been added to the FED-WS1-ATL-POD queue.\n\nCustomer: Agency X\nDescription: VPN down"
        );
        assert_eq!(msg.format, fedbot_core::MessageFormat::Block);
    }

    #[test]
    fn test_priority_description_limit() {
        let config = RulesConfig {
            description_limit: 4,
            ..RulesConfig::default()
        };
        let rule = PriorityRule::new(&config, "Q");
        let mut c = with_priority("2 - High");
        c.description = Some("ééééééé".into());
        let msg = rule.check(&c).unwrap().unwrap();
        assert!(msg.text.ends_with("Description: éééé"));
    }

    #[test]
    fn test_priority_missing_is_malformed() {
        let rule = PriorityRule::new(&RulesConfig::default(), "Q");
        assert!(matches!(
            rule.check(&case("1")),
            Err(FedBotError::MalformedCase { .. })
        ));
    }

    #[test]
    fn test_commitment_window() {
        let rule = CommitmentRule::new(&RulesConfig::default());
        let msg = rule.check(&with_minutes(45.0)).unwrap().unwrap();
        assert_eq!(
            msg.text,
            "<!here> <https://crm.test/200|200> has 45 minutes until missed commit."
        );
        assert!(rule.check(&with_minutes(75.0)).unwrap().is_none());
        assert!(rule.check(&with_minutes(-5.0)).unwrap().is_none());
        assert!(rule.check(&with_minutes(0.0)).unwrap().is_none());
        assert!(rule.check(&with_minutes(60.0)).unwrap().is_none());
    }

    #[test]
    fn test_commitment_requires_pending() {
        let rule = CommitmentRule::new(&RulesConfig::default());
        let mut c = with_minutes(30.0);
        c.commitment = Some(CommitmentStatus::Met);
        assert!(rule.check(&c).unwrap().is_none());
        c.commitment = Some(CommitmentStatus::Missed);
        assert!(rule.check(&c).unwrap().is_none());
        // met cases need no minutes
        c.commitment_minutes = None;
        assert!(rule.check(&c).unwrap().is_none());
    }

    #[test]
    fn test_entitlement_keyword() {
        let rule = EntitlementRule::new(&RulesConfig::default());
        let mut c = case("300");
        c.entitlement = Some("FEDERAL Production Support".into());
        assert!(rule.check(&c).unwrap().is_none());

        c.entitlement = Some("Commercial Basic".into());
        let msg = rule.check(&c).unwrap().unwrap();
        assert_eq!(
            msg.text,
            "<!here> <https://crm.test/300|300> does not have a Federal entitlement according to SalesForce.\n\nCustomer: Agency X\nEntitlement Type: Commercial Basic"
        );
    }

    #[test]
    fn test_rule_for_categories() {
        let config = RulesConfig::default();
        for category in RuleCategory::ALL {
            assert_eq!(rule_for(category, &config, "Q").category(), category);
        }
    }
}
