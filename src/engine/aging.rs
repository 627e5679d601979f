// ==========================================
// 车间绩效系统 - 在制账龄聚合器 (Aging Aggregator)
// ==========================================
// 职责: 工单暂停历史 + 当前时刻 → 净在制时长
// 规则:
// 1) 起算点: 实际开工日 → 首条关联生产记录日 → 计划开工日 → 接收日
// 2) 截止点: 已完工工单冻结在完工时刻,否则为 now
// 3) 暂停时长 = Σ 已结束暂停 (end − start),按起止区间截取
// 4) 净账龄 = max(0, 总时长 − 暂停时长)
// 口径: 未结束暂停默认不扣减 (AgingPolicy.include_open_holds 可开启)
// ==========================================

use crate::config::client_config::AgingPolicy;
use crate::domain::records::ProductionRecord;
use crate::domain::types::WorkOrderStatus;
use crate::domain::work_order::{HoldRecord, WorkOrder};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 86_400.0;

// ==========================================
// 账龄起算来源
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgingAnchor {
    ActualStart,     // 实际开工日
    FirstProduction, // 首条生产记录日
    PlannedStart,    // 计划开工日
    Received,        // 接收日
}

impl AgingAnchor {
    /// 是否为推断的起算点
    pub fn is_inferred(&self) -> bool {
        !matches!(self, AgingAnchor::ActualStart)
    }
}

// ==========================================
// AgingResult - 单工单账龄
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingResult {
    pub work_order_id: String,
    pub anchor: AgingAnchor,
    pub anchor_time: NaiveDateTime,
    pub measured_until: NaiveDateTime,
    pub frozen: bool, // 已冻结于完工时刻
    pub gross_days: f64,
    pub hold_days: f64,
    pub net_days: f64,
}

// ==========================================
// AgingAggregator - 在制账龄聚合器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct AgingAggregator {
    policy: AgingPolicy,
}

impl AgingAggregator {
    pub fn new(policy: AgingPolicy) -> Self {
        Self { policy }
    }

    /// 计算单工单净账龄
    ///
    /// # 参数
    /// - work_order: 工单
    /// - hold_records: 暂停记录（可含其他工单的记录，按 work_order_id 过滤）
    /// - production_records: 生产记录（用于回退起算点）
    /// - now: 当前时刻
    pub fn compute_aging(
        &self,
        work_order: &WorkOrder,
        hold_records: &[HoldRecord],
        production_records: &[ProductionRecord],
        now: NaiveDateTime,
    ) -> AgingResult {
        let (anchor, anchor_time) = Self::resolve_anchor(work_order, production_records);
        let (measured_until, frozen) = Self::measurement_end(work_order, now);

        let gross_seconds = (measured_until - anchor_time).num_seconds().max(0);
        let hold_seconds: i64 = hold_records
            .iter()
            .filter(|h| h.work_order_id == work_order.work_order_id)
            .filter_map(|h| {
                let end = match h.end_time {
                    Some(end) => end,
                    None if self.policy.include_open_holds => measured_until,
                    None => return None,
                };
                // 按 [anchor, measured_until] 截取
                let start = h.start_time.max(anchor_time);
                let end = end.min(measured_until);
                Some((end - start).num_seconds().max(0))
            })
            .sum();

        let gross_days = gross_seconds as f64 / SECONDS_PER_DAY;
        let hold_days = hold_seconds as f64 / SECONDS_PER_DAY;
        let net_days = (gross_days - hold_days).max(0.0);

        tracing::debug!(
            work_order_id = %work_order.work_order_id,
            anchor = ?anchor,
            gross_days,
            hold_days,
            net_days,
            frozen,
            "在制账龄计算完成"
        );

        AgingResult {
            work_order_id: work_order.work_order_id.clone(),
            anchor,
            anchor_time,
            measured_until,
            frozen,
            gross_days,
            hold_days,
            net_days,
        }
    }

    /// 起算点回退链
    fn resolve_anchor(
        work_order: &WorkOrder,
        production_records: &[ProductionRecord],
    ) -> (AgingAnchor, NaiveDateTime) {
        if let Some(date) = work_order.actual_start_date {
            return (AgingAnchor::ActualStart, start_of_day(date));
        }

        let first_production = production_records
            .iter()
            .filter(|r| r.work_order_id.as_deref() == Some(work_order.work_order_id.as_str()))
            .map(|r| r.production_date)
            .min();
        if let Some(date) = first_production {
            return (AgingAnchor::FirstProduction, start_of_day(date));
        }

        if let Some(date) = work_order.planned_start_date {
            return (AgingAnchor::PlannedStart, start_of_day(date));
        }

        (AgingAnchor::Received, work_order.received_at())
    }

    /// 截止点: 已完工工单冻结于完工时刻
    fn measurement_end(work_order: &WorkOrder, now: NaiveDateTime) -> (NaiveDateTime, bool) {
        if let Some(completed_at) = work_order.completed_at {
            return (completed_at.min(now), true);
        }
        if work_order.status == WorkOrderStatus::Completed {
            if let Some(at) = work_order.last_transition_at {
                return (at.min(now), true);
            }
        }
        (now, false)
    }
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::HoldReason;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        start_of_day(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn hold(start: NaiveDateTime, end: Option<NaiveDateTime>) -> HoldRecord {
        HoldRecord {
            hold_id: "H1".to_string(),
            work_order_id: "WO-1".to_string(),
            reason: HoldReason::MaterialShortage,
            detail: None,
            start_time: start,
            end_time: end,
            placed_by: "planner".to_string(),
            resumed_by: None,
        }
    }

    fn work_order() -> WorkOrder {
        WorkOrder::new("WO-1", "ACME", NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(), 100)
    }

    #[test]
    fn test_aging_subtracts_resolved_hold() {
        let wo = work_order();
        let holds = vec![hold(dt(2025, 12, 3), Some(dt(2025, 12, 4)))];
        let r = AgingAggregator::default().compute_aging(&wo, &holds, &[], dt(2025, 12, 7));
        assert_eq!(r.anchor, AgingAnchor::Received);
        assert!((r.gross_days - 6.0).abs() < 1e-9);
        assert!((r.hold_days - 1.0).abs() < 1e-9);
        assert!((r.net_days - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_open_hold_ignored_by_default() {
        let wo = work_order();
        let holds = vec![hold(dt(2025, 12, 5), None)];
        let r = AgingAggregator::default().compute_aging(&wo, &holds, &[], dt(2025, 12, 7));
        assert_eq!(r.hold_days, 0.0);
        assert!((r.net_days - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_open_hold_counted_when_policy_enabled() {
        let wo = work_order();
        let holds = vec![hold(dt(2025, 12, 5), None)];
        let aggregator = AgingAggregator::new(AgingPolicy {
            include_open_holds: true,
        });
        let r = aggregator.compute_aging(&wo, &holds, &[], dt(2025, 12, 7));
        assert!((r.net_days - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_anchor_fallback_chain() {
        let mut wo = work_order();
        wo.planned_start_date = NaiveDate::from_ymd_opt(2025, 12, 2);
        let records = vec![ProductionRecord {
            record_id: "P1".to_string(),
            production_date: NaiveDate::from_ymd_opt(2025, 12, 3).unwrap(),
            work_order_id: Some("WO-1".to_string()),
            ..Default::default()
        }];

        let aggregator = AgingAggregator::default();
        let r = aggregator.compute_aging(&wo, &[], &records, dt(2025, 12, 7));
        assert_eq!(r.anchor, AgingAnchor::FirstProduction);

        let r = aggregator.compute_aging(&wo, &[], &[], dt(2025, 12, 7));
        assert_eq!(r.anchor, AgingAnchor::PlannedStart);

        wo.actual_start_date = NaiveDate::from_ymd_opt(2025, 12, 4);
        let r = aggregator.compute_aging(&wo, &[], &records, dt(2025, 12, 7));
        assert_eq!(r.anchor, AgingAnchor::ActualStart);
        assert!((r.net_days - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_completed_order_aging_is_frozen() {
        let mut wo = work_order();
        wo.status = WorkOrderStatus::Completed;
        wo.completed_at = Some(dt(2025, 12, 5));
        let aggregator = AgingAggregator::default();
        let early = aggregator.compute_aging(&wo, &[], &[], dt(2025, 12, 7));
        let late = aggregator.compute_aging(&wo, &[], &[], dt(2026, 1, 30));
        assert!(early.frozen);
        assert_eq!(early.net_days, late.net_days);
        assert!((late.net_days - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_aging_clipped_at_zero() {
        let mut wo = work_order();
        wo.planned_start_date = NaiveDate::from_ymd_opt(2026, 2, 1);
        let r = AgingAggregator::default().compute_aging(&wo, &[], &[], dt(2025, 12, 7));
        assert_eq!(r.net_days, 0.0);
    }

    #[test]
    fn test_holds_of_other_orders_ignored() {
        let wo = work_order();
        let mut other = hold(dt(2025, 12, 3), Some(dt(2025, 12, 5)));
        other.work_order_id = "WO-2".to_string();
        let r = AgingAggregator::default().compute_aging(&wo, &[other], &[], dt(2025, 12, 7));
        assert_eq!(r.hold_days, 0.0);
    }
}
