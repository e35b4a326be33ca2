//! Daily idle-time report. Stateless: the same cases always give the same text.

use fedbot_core::config::ReportConfig;
use fedbot_core::{CaseRecord, FedBotError, Message};

pub const NO_TICKETS_LINE: &str = "No tickets to report.";

/// Whether `case` belongs in the report.
fn qualifies(case: &CaseRecord, config: &ReportConfig) -> bool {
    let owned = case
        .owner
        .as_deref()
        .is_some_and(|o| config.owners.iter().any(|w| w == o));
    if !owned || case.is_closed() || case.has_bug() {
        return false;
    }
    match case.idle_days() {
        Ok(days) => days > config.idle_threshold_days,
        Err(FedBotError::MalformedCase { case, reason }) => {
            tracing::warn!("⚠️ [idle-report] skipping case {case}: {reason}");
            false
        }
        Err(_) => false,
    }
}

/// Cases that belong in the report, in the order given.
pub fn qualifying<'a>(cases: &'a [CaseRecord], config: &ReportConfig) -> Vec<&'a CaseRecord> {
    cases.iter().filter(|c| qualifies(c, config)).collect()
}

pub fn header(config: &ReportConfig) -> String {
    format!(
        "*Halftime Report:*\n\nTickets with {}+ Day Idle Times:\n",
        config.idle_threshold_days
    )
}

/// Build the report message.
pub fn build_report(cases: &[CaseRecord], config: &ReportConfig) -> Message {
    let lines: Vec<String> = qualifying(cases, config)
        .into_iter()
        .map(|case| {
            format!(
                "{} - Idle Time: {} - Ticket: <{}|{}>",
                case.owner.as_deref().unwrap_or_default(),
                case.idle_days.unwrap_or_default(),
                case.link_or_number(),
                case.case_number
            )
        })
        .collect();

    let body = if lines.is_empty() {
        NO_TICKETS_LINE.to_string()
    } else {
        lines.join("\n")
    };
    Message::block(format!("{}{}", header(config), body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReportConfig {
        ReportConfig {
            owners: vec!["Alex Doe".into(), "Sam Roe".into()],
            idle_threshold_days: 2.0,
        }
    }

    fn idle(number: &str, owner: &str, days: f64) -> CaseRecord {
        CaseRecord {
            owner: Some(owner.into()),
            idle_days: Some(days),
            status: Some("Open".into()),
            link: Some(format!("https://crm.test/{number}")),
            ..CaseRecord::new(number)
        }
    }

    #[test]
    fn test_two_cases_in_order() {
        let cases = vec![idle("20", "Sam Roe", 3.0), idle("10", "Alex Doe", 5.5)];
        let msg = build_report(&cases, &config());
        assert_eq!(
            msg.text,
            "*Halftime Report:*\n\nTickets with 2+ Day Idle Times:\n\
             Sam Roe - Idle Time: 3 - Ticket: <https://crm.test/20|20>\n\
             Alex Doe - Idle Time: 5.5 - Ticket: <https://crm.test/10|10>"
        );
        assert_eq!(build_report(&cases, &config()), msg);
    }

    #[test]
    fn test_filters() {
        let mut closed = idle("1", "Alex Doe", 4.0);
        closed.status = Some("Closed".into());
        let mut bugged = idle("2", "Alex Doe", 4.0);
        bugged.bug_url = Some("https://bugs.test/2".into());
        let mut unknown_idle = idle("6", "Alex Doe", 0.0);
        unknown_idle.idle_days = None;
        let cases = vec![
            closed,
            bugged,
            idle("3", "Alex Doe", 2.0),
            idle("4", "Someone Else", 9.0),
            idle("5", "Sam Roe", 2.5),
            unknown_idle,
        ];
        let picked = qualifying(&cases, &config());
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].case_number, "5");
    }

    #[test]
    fn test_empty_report() {
        let msg = build_report(&[], &config());
        assert!(msg.text.starts_with("*Halftime Report:*"));
        assert!(msg.text.ends_with(NO_TICKETS_LINE));
    }
}
