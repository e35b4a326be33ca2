//! Data model: cases, snapshots, rule categories and outgoing messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{FedBotError, Result};

/// Case priority, parsed from labels such as `"1 - Critical"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priority {
    /// Severity ordinal: 1 is the most severe.
    pub level: u8,
    /// Label as shown in the CRM.
    pub label: String,
}

impl Priority {
    /// Parse the leading severity digit out of a CRM priority label.
    pub fn parse(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
        let level: u8 = digits.parse().ok()?;
        Some(Self {
            level,
            label: trimmed.to_string(),
        })
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// First-response commitment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentStatus {
    /// Responded within the commitment.
    Met,
    /// Commitment passed without a response.
    Missed,
    /// Not yet due; the CRM field is unset.
    Pending,
}

impl CommitmentStatus {
    /// Map the CRM's `GSS_First_Resp_Met__c` value. Null or blank means pending.
    pub fn from_field(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::Pending,
            Some(v) if ["yes", "met", "true"].iter().any(|m| v.eq_ignore_ascii_case(m)) => {
                Self::Met
            }
            Some(_) => Self::Missed,
        }
    }
}

/// One support case as seen in a single snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_number: String,
    pub record_id: Option<String>,
    pub priority: Option<Priority>,
    pub commitment_minutes: Option<f64>,
    pub commitment: Option<CommitmentStatus>,
    pub entitlement: Option<String>,
    pub idle_days: Option<f64>,
    pub status: Option<String>,
    pub bug_url: Option<String>,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub customer: Option<String>,
    pub link: Option<String>,
}

impl CaseRecord {
    pub fn new(case_number: &str) -> Self {
        Self {
            case_number: case_number.to_string(),
            ..Default::default()
        }
    }

    pub fn priority(&self) -> Result<&Priority> {
        self.priority
            .as_ref()
            .ok_or_else(|| FedBotError::malformed(&self.case_number, "missing priority"))
    }

    pub fn commitment_minutes(&self) -> Result<f64> {
        self.commitment_minutes
            .ok_or_else(|| FedBotError::malformed(&self.case_number, "missing commitment minutes"))
    }

    pub fn entitlement(&self) -> Result<&str> {
        self.entitlement
            .as_deref()
            .ok_or_else(|| FedBotError::malformed(&self.case_number, "missing entitlement"))
    }

    pub fn idle_days(&self) -> Result<f64> {
        self.idle_days
            .ok_or_else(|| FedBotError::malformed(&self.case_number, "missing idle time"))
    }

    /// Link to the case page, or the bare case number when the CRM gave none.
    pub fn link_or_number(&self) -> &str {
        self.link.as_deref().unwrap_or(&self.case_number)
    }

    /// Whether the CRM reports the case as closed.
    pub fn is_closed(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("closed"))
    }

    /// Whether a defect-tracker reference is attached.
    pub fn has_bug(&self) -> bool {
        self.bug_url.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

/// The monitored queue at one instant. Replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub cases: Vec<CaseRecord>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(cases: Vec<CaseRecord>) -> Self {
        Self {
            cases,
            fetched_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// Ledger namespace, one per alerting rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleCategory {
    PriorityEscalation,
    CommitmentBreach,
    EntitlementMismatch,
}

impl RuleCategory {
    pub const ALL: [RuleCategory; 3] = [
        RuleCategory::PriorityEscalation,
        RuleCategory::CommitmentBreach,
        RuleCategory::EntitlementMismatch,
    ];

    /// Discriminator stored in the ledger table.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::PriorityEscalation => "priority-escalation",
            RuleCategory::CommitmentBreach => "commitment-breach",
            RuleCategory::EntitlementMismatch => "entitlement-mismatch",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleCategory {
    type Err = FedBotError;

    fn from_str(s: &str) -> Result<Self> {
        RuleCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| FedBotError::Ledger(format!("unknown rule category '{s}'")))
    }
}

/// How a message body should be rendered by the chat service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageFormat {
    /// Plain text message.
    Plain,
    /// A single markdown section block.
    Block,
}

/// A message ready for the notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub format: MessageFormat,
}

impl Message {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: MessageFormat::Plain,
        }
    }

    pub fn block(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: MessageFormat::Block,
        }
    }
}

/// A rule firing for one case.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub category: RuleCategory,
    pub case_number: String,
    pub message: Message,
}
