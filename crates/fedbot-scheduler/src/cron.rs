//! Lightweight cron expression parser.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Field syntax: *, */N, N, A-B, A-B/N and comma lists of those.
//! Example: "0 17 * * 1-5" = weekdays at 17:00
//!
//! Times are matched in the timezone of the `after` argument, so the same
//! expression works for UTC and wall-clock (Local) schedules.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike};

/// Parse a cron expression and compute the next run strictly after `after`.
pub fn next_run_from_cron<Tz: TimeZone>(expression: &str, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    CronSpec::parse(expression)?.next_after(after)
}

/// A parsed 5-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSpec {
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>,
    dom_any: bool,
    dow_any: bool,
}

impl CronSpec {
    pub fn parse(expression: &str) -> Option<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            tracing::warn!(
                "Invalid cron expression: '{}' (need 5 fields: MIN HOUR DOM MON DOW)",
                expression
            );
            return None;
        }

        // 7 is an alias for Sunday.
        let mut days_of_week = parse_field(parts[4], 0, 7)?;
        for d in days_of_week.iter_mut() {
            if *d == 7 {
                *d = 0;
            }
        }
        days_of_week.sort_unstable();
        days_of_week.dedup();

        Some(Self {
            minutes: parse_field(parts[0], 0, 59)?,
            hours: parse_field(parts[1], 0, 23)?,
            days_of_month: parse_field(parts[2], 1, 31)?,
            months: parse_field(parts[3], 1, 12)?,
            days_of_week,
            dom_any: parts[2] == "*",
            dow_any: parts[4] == "*",
        })
    }

    fn matches_date(&self, date: NaiveDate) -> bool {
        if !self.months.contains(&date.month()) {
            return false;
        }
        let dom = self.days_of_month.contains(&date.day());
        let dow = self
            .days_of_week
            .contains(&date.weekday().num_days_from_sunday());
        // Classic cron: when both day fields are restricted, either may match.
        match (self.dom_any, self.dow_any) {
            (false, false) => dom || dow,
            _ => dom && dow,
        }
    }

    /// Next matching minute strictly after `after`, searching about a year ahead.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let local = after.naive_local() + Duration::minutes(1);
        let start = local.with_second(0)?.with_nanosecond(0)?;

        let mut date = start.date();
        for _ in 0..=366 {
            if self.matches_date(date) {
                for &h in &self.hours {
                    for &m in &self.minutes {
                        let candidate = date.and_hms_opt(h, m, 0)?;
                        if candidate < start {
                            continue;
                        }
                        // Skipped local times (DST gaps) have no mapping.
                        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
                            return Some(dt);
                        }
                    }
                }
            }
            date = date.succ_opt()?;
        }

        None
    }
}

/// Parse a cron field into a sorted list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    let mut values = Vec::new();
    for part in field.split(',') {
        values.extend(parse_part(part.trim(), min, max)?);
    }
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    values.dedup();
    Some(values)
}

fn parse_part(part: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    let (range, step) = match part.split_once('/') {
        Some((r, s)) => {
            let n: u32 = s.parse().ok()?;
            if n == 0 {
                return None;
            }
            (r, n)
        }
        None => (part, 1),
    };

    let (lo, hi) = if range == "*" {
        (min, max)
    } else if let Some((a, b)) = range.split_once('-') {
        (a.parse().ok()?, b.parse().ok()?)
    } else {
        let n: u32 = range.parse().ok()?;
        // "N/step" runs from N to the end of the field.
        if step > 1 { (n, max) } else { (n, n) }
    };

    if lo < min || hi > max || lo > hi {
        return None;
    }
    Some((lo..=hi).step_by(step as usize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Utc, Weekday};

    #[test]
    fn test_every_hour() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 10, 30, 0).unwrap();
        let next = next_run_from_cron("0 * * * *", &after).unwrap();
        assert_eq!(next.hour(), 11);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn test_specific_time() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 7, 0, 0).unwrap();
        let next = next_run_from_cron("0 17 * * *", &after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 22, 17, 0, 0).unwrap());
    }

    #[test]
    fn test_daily_rolls_to_next_day() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 17, 0, 0).unwrap();
        let next = next_run_from_cron("0 17 * * *", &after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 23, 17, 0, 0).unwrap());
    }

    #[test]
    fn test_every_15_minutes() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 10, 2, 0).unwrap();
        let next = next_run_from_cron("*/15 * * * *", &after).unwrap();
        assert_eq!(next.minute(), 15);
    }

    #[test]
    fn test_weekdays_only() {
        // 2026-02-21 is a Saturday.
        let after = Utc.with_ymd_and_hms(2026, 2, 21, 9, 0, 0).unwrap();
        let next = next_run_from_cron("0 17 * * 1-5", &after).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(next.day(), 23);
    }

    #[test]
    fn test_sunday_alias() {
        let after = Utc.with_ymd_and_hms(2026, 2, 20, 9, 0, 0).unwrap();
        let a = next_run_from_cron("0 8 * * 0", &after).unwrap();
        let b = next_run_from_cron("0 8 * * 7", &after).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.weekday(), Weekday::Sun);
    }

    #[test]
    fn test_comma_list_and_range() {
        assert_eq!(parse_field("0,30", 0, 59), Some(vec![0, 30]));
        assert_eq!(parse_field("8-10", 0, 23), Some(vec![8, 9, 10]));
        assert_eq!(parse_field("0-30/10", 0, 59), Some(vec![0, 10, 20, 30]));
        assert_eq!(parse_field("60", 0, 59), None);
        assert_eq!(parse_field("*/0", 0, 59), None);
    }

    #[test]
    fn test_invalid_expression() {
        let after = Utc::now();
        assert!(next_run_from_cron("bad", &after).is_none());
        assert!(next_run_from_cron("0 25 * * *", &after).is_none());
    }
}
