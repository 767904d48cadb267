// src/tracker/analytics.rs
//! Aggregates over automation records. Pure functions; the caller loads the records.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::tracker::AutomationRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalTime {
    pub engineer_id: Option<String>,
    pub total_seconds: i64,
    pub total_hours: f64,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolUsage {
    pub tool_name: String,
    pub total_seconds: i64,
    pub uses: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub total_seconds: i64,
    pub uses: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub generated_at: DateTime<Utc>,
    pub total: TotalTime,
    pub tools: Vec<ToolUsage>,
    pub by_date: Vec<DailyUsage>,
    pub top_tool: Option<String>,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn total_time(engineer_id: Option<&str>, records: &[AutomationRecord]) -> TotalTime {
    let total_seconds: i64 = records.iter().map(AutomationRecord::duration_secs).sum();
    TotalTime {
        engineer_id: engineer_id.map(str::to_string),
        total_seconds,
        total_hours: round2(total_seconds as f64 / 3600.0),
        record_count: records.len(),
    }
}

/// Per-tool totals, most time first; ties broken by name.
pub fn tools_usage(records: &[AutomationRecord]) -> Vec<ToolUsage> {
    let mut by_tool: BTreeMap<&str, (i64, usize)> = BTreeMap::new();
    for r in records {
        let e = by_tool.entry(r.tool_name.as_str()).or_default();
        e.0 += r.duration_secs();
        e.1 += 1;
    }
    let mut out: Vec<ToolUsage> = by_tool
        .into_iter()
        .map(|(tool, (secs, uses))| ToolUsage {
            tool_name: tool.to_string(),
            total_seconds: secs,
            uses,
        })
        .collect();
    out.sort_by(|a, b| {
        b.total_seconds
            .cmp(&a.total_seconds)
            .then_with(|| a.tool_name.cmp(&b.tool_name))
    });
    out
}

/// Per-day totals keyed by the UTC date of `start_time`, oldest first.
pub fn usage_by_date(records: &[AutomationRecord]) -> Vec<DailyUsage> {
    let mut by_day: BTreeMap<NaiveDate, (i64, usize)> = BTreeMap::new();
    for r in records {
        let e = by_day.entry(r.start_time.date_naive()).or_default();
        e.0 += r.duration_secs();
        e.1 += 1;
    }
    by_day
        .into_iter()
        .map(|(date, (total_seconds, uses))| DailyUsage {
            date,
            total_seconds,
            uses,
        })
        .collect()
}

pub fn generate_report(engineer_id: Option<&str>, records: &[AutomationRecord]) -> UsageReport {
    let tools = tools_usage(records);
    UsageReport {
        generated_at: Utc::now(),
        total: total_time(engineer_id, records),
        top_tool: tools.first().map(|t| t.tool_name.clone()),
        tools,
        by_date: usage_by_date(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rec(id: i64, tool: &str, day: u32, minutes: i64) -> AutomationRecord {
        let start = Utc.with_ymd_and_hms(2024, 6, day, 9, 0, 0).unwrap();
        AutomationRecord {
            id,
            engineer_id: "eng-1".into(),
            tool_name: tool.into(),
            start_time: start,
            end_time: start + chrono::Duration::minutes(minutes),
            description: None,
            created_at: start,
        }
    }

    #[test]
    fn totals_sum_durations() {
        let rs = vec![rec(1, "copilot", 1, 90), rec(2, "chatgpt", 1, 30)];
        let t = total_time(Some("eng-1"), &rs);
        assert_eq!(t.total_seconds, 2 * 3600);
        assert_eq!(t.total_hours, 2.0);
        assert_eq!(t.record_count, 2);
        assert_eq!(total_time(None, &[]).total_seconds, 0);
    }

    #[test]
    fn tools_sorted_by_time_then_name() {
        let rs = vec![
            rec(1, "b-tool", 1, 10),
            rec(2, "a-tool", 1, 10),
            rec(3, "copilot", 2, 60),
            rec(4, "b-tool", 3, 5),
        ];
        let names: Vec<_> = tools_usage(&rs).into_iter().map(|t| t.tool_name).collect();
        assert_eq!(names, vec!["copilot", "b-tool", "a-tool"]);
    }

    #[test]
    fn report_groups_by_day_and_picks_top_tool() {
        let rs = vec![
            rec(1, "copilot", 2, 60),
            rec(2, "copilot", 1, 15),
            rec(3, "chatgpt", 2, 20),
        ];
        let report = generate_report(None, &rs);
        assert_eq!(report.top_tool.as_deref(), Some("copilot"));
        assert_eq!(report.by_date.len(), 2);
        assert_eq!(report.by_date[0].date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(report.by_date[1].uses, 2);
        assert_eq!(report.by_date[1].total_seconds, 80 * 60);
    }
}
