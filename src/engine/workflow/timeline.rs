// ==========================================
// 车间绩效系统 - 工单流转时间线
// ==========================================
// 输入: 审计日志 (可含其他工单)
// 输出: 按时间排序的流转记录 + 各状态停留时长
// ==========================================

use crate::domain::types::WorkOrderStatus;
use crate::domain::work_order::WorkflowTransitionLogEntry;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSegment {
    pub status: WorkOrderStatus,
    pub entered_at: NaiveDateTime,
    pub exited_at: Option<NaiveDateTime>, // 当前所处状态为 None
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionTimeline {
    pub work_order_id: String,
    pub entries: Vec<WorkflowTransitionLogEntry>,
    pub segments: Vec<TimelineSegment>,
    pub hours_by_status: BTreeMap<WorkOrderStatus, f64>,
}

impl TransitionTimeline {
    pub fn current_status(&self) -> Option<WorkOrderStatus> {
        self.segments.last().map(|s| s.status)
    }
}

/// 构建工单流转时间线
///
/// 首段起点由首条日志的 hours_since_received 反推接收时刻;
/// 末段 (当前状态) 计到 now 为止。
pub fn transition_timeline(
    log_entries: &[WorkflowTransitionLogEntry],
    work_order_id: &str,
    now: NaiveDateTime,
) -> TransitionTimeline {
    let mut entries: Vec<WorkflowTransitionLogEntry> = log_entries
        .iter()
        .filter(|e| e.work_order_id == work_order_id)
        .cloned()
        .collect();
    entries.sort_by_key(|e| e.transitioned_at);

    let mut segments = Vec::with_capacity(entries.len() + 1);
    if let Some(first) = entries.first() {
        let received_at = first.transitioned_at
            - Duration::seconds((first.hours_since_received * 3600.0).round() as i64);
        segments.push(segment(first.from_status, received_at, Some(first.transitioned_at)));
    }
    for (i, entry) in entries.iter().enumerate() {
        let exited_at = entries.get(i + 1).map(|next| next.transitioned_at);
        let mut seg = segment(entry.to_status, entry.transitioned_at, exited_at);
        if exited_at.is_none() {
            seg.hours = hours(entry.transitioned_at, now.max(entry.transitioned_at));
        }
        segments.push(seg);
    }

    let mut hours_by_status = BTreeMap::new();
    for seg in &segments {
        *hours_by_status.entry(seg.status).or_insert(0.0) += seg.hours;
    }

    TransitionTimeline {
        work_order_id: work_order_id.to_string(),
        entries,
        segments,
        hours_by_status,
    }
}

fn segment(
    status: WorkOrderStatus,
    entered_at: NaiveDateTime,
    exited_at: Option<NaiveDateTime>,
) -> TimelineSegment {
    TimelineSegment {
        status,
        entered_at,
        exited_at,
        hours: exited_at.map(|end| hours(entered_at, end)).unwrap_or(0.0),
    }
}

fn hours(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    (end - start).num_seconds() as f64 / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::TriggerSource;
    use chrono::NaiveDate;
    use WorkOrderStatus::*;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn entry(id: &str, from: WorkOrderStatus, to: WorkOrderStatus, when: NaiveDateTime) -> WorkflowTransitionLogEntry {
        WorkflowTransitionLogEntry {
            entry_id: format!("{id}-{to}"),
            work_order_id: id.to_string(),
            from_status: from,
            to_status: to,
            actor: "op".to_string(),
            transitioned_at: when,
            hours_since_received: hours(at(1, 0), when),
            hours_since_previous: None,
            trigger_source: TriggerSource::Manual,
            notes: None,
        }
    }

    #[test]
    fn test_timeline_orders_entries_and_sums_hours() {
        let log = vec![
            entry("WO-1", Released, InProgress, at(2, 12)),
            entry("WO-1", Received, Released, at(2, 0)),
            entry("WO-2", Received, Released, at(1, 6)),
            entry("WO-1", InProgress, OnHold, at(3, 0)),
            entry("WO-1", OnHold, InProgress, at(4, 0)),
        ];
        let timeline = transition_timeline(&log, "WO-1", at(5, 0));

        assert_eq!(timeline.entries.len(), 4);
        assert_eq!(timeline.entries[0].to_status, Released);
        assert_eq!(timeline.current_status(), Some(InProgress));
        assert_eq!(timeline.hours_by_status[&Received], 24.0);
        assert_eq!(timeline.hours_by_status[&Released], 12.0);
        assert_eq!(timeline.hours_by_status[&OnHold], 24.0);
        // 12h + 24h (当前段到 now)
        assert_eq!(timeline.hours_by_status[&InProgress], 36.0);
    }

    #[test]
    fn test_empty_timeline() {
        let timeline = transition_timeline(&[], "WO-1", at(5, 0));
        assert!(timeline.segments.is_empty());
        assert_eq!(timeline.current_status(), None);
    }
}
