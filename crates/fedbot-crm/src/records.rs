//! Salesforce record JSON → [`CaseRecord`].

use std::sync::LazyLock;

use fedbot_core::{CaseRecord, CommitmentStatus, FedBotError, Priority, Result};
use regex::Regex;
use serde_json::Value;

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href\s*=\s*"([^"]*)""#).expect("static regex")
});

/// Non-empty string field.
fn text(record: &Value, field: &str) -> Option<String> {
    match &record[field] {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Numeric field; formula fields sometimes arrive as strings.
fn number(record: &Value, field: &str) -> Option<f64> {
    match &record[field] {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First-response state. Only a null (or blank) value means not yet due.
fn commitment(record: &Value) -> CommitmentStatus {
    match &record["GSS_First_Resp_Met__c"] {
        Value::Null => CommitmentStatus::Pending,
        Value::Bool(true) => CommitmentStatus::Met,
        Value::Bool(false) => CommitmentStatus::Missed,
        Value::String(s) => CommitmentStatus::from_field(Some(s)),
        _ => CommitmentStatus::Missed,
    }
}

/// Path inside a formula hyperlink such as `<a href="/lightning/r/Case/5008/view" target="_blank">`.
pub fn anchor_path(html: &str) -> Option<String> {
    if let Some(caps) = HREF.captures(html) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    html.split('"').nth(1).map(str::to_string)
}

/// Absolute link for a case: the formula hyperlink when present, else the record page.
fn case_link(record: &Value, link_base: &str) -> Option<String> {
    let base = link_base.trim_end_matches('/');
    if let Some(path) = text(record, "GSS_Case__c").as_deref().and_then(anchor_path) {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Some(path);
        }
        return Some(format!("{base}{path}"));
    }
    text(record, "Id").map(|id| format!("{base}/lightning/r/Case/{id}/view"))
}

/// Parse one record. Only `CaseNumber` is required; rules check the rest.
pub fn parse_case(record: &Value, link_base: &str) -> Result<CaseRecord> {
    let case_number = text(record, "CaseNumber")
        .ok_or_else(|| FedBotError::malformed("<unknown>", "record has no CaseNumber"))?;

    let priority = text(record, "Priority").and_then(|label| {
        let parsed = Priority::parse(&label);
        if parsed.is_none() {
            tracing::warn!("⚠️ Case {}: unrecognised priority '{}'", case_number, label);
        }
        parsed
    });

    Ok(CaseRecord {
        record_id: text(record, "Id"),
        priority,
        commitment_minutes: number(record, "First_Response_Due_In_in_minutes__c"),
        commitment: Some(commitment(record)),
        entitlement: text(record, "Name_of_Entitlement__c"),
        idle_days: number(record, "Case_Idle_Time_Business_Days__c"),
        status: text(record, "Status"),
        bug_url: text(record, "EP_Bug_URL__c"),
        description: text(record, "Description"),
        owner: text(record, "Case_Owner_Name__c"),
        customer: text(record, "EA_Name__c"),
        link: case_link(record, link_base),
        case_number,
    })
}

/// Parse a page of records, dropping (and logging) any without a case number.
pub fn parse_cases(records: &[Value], link_base: &str) -> Vec<CaseRecord> {
    records
        .iter()
        .filter_map(|r| match parse_case(r, link_base) {
            Ok(case) => Some(case),
            Err(e) => {
                tracing::warn!("⚠️ Skipping record: {e}");
                None
            }
        })
        .collect()
}
