// ==========================================
// 车间绩效系统 - 在制账龄指标
// ==========================================
// 输入: Aging Aggregator 的逐单净账龄
// 输出: 平均净账龄 (天) + 账龄分段
// 估算: 任一工单起算点为推断值 → 标记估算
// ==========================================

use crate::domain::calculation::CalculationResult;
use crate::domain::types::{KpiMetric, MetricUnit};
use crate::engine::aging::AgingResult;
use serde::{Deserialize, Serialize};

// ==========================================
// 账龄分段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgingBucket {
    UpTo7Days,
    Days8To14,
    Days15To30,
    Over30Days,
}

impl AgingBucket {
    pub fn for_days(days: f64) -> Self {
        if days <= 7.0 {
            AgingBucket::UpTo7Days
        } else if days <= 14.0 {
            AgingBucket::Days8To14
        } else if days <= 30.0 {
            AgingBucket::Days15To30
        } else {
            AgingBucket::Over30Days
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WipAgingReport {
    pub result: CalculationResult,
    pub orders: Vec<AgingResult>,
    pub buckets: Vec<(AgingBucket, usize)>,
}

pub fn calculate_wip_aging(orders: Vec<AgingResult>) -> WipAgingReport {
    let total: f64 = orders.iter().map(|o| o.net_days).sum();
    let average = if orders.is_empty() {
        0.0
    } else {
        total / orders.len() as f64
    };

    let mut buckets = vec![
        (AgingBucket::UpTo7Days, 0usize),
        (AgingBucket::Days8To14, 0),
        (AgingBucket::Days15To30, 0),
        (AgingBucket::Over30Days, 0),
    ];
    for order in &orders {
        let bucket = AgingBucket::for_days(order.net_days);
        if let Some(entry) = buckets.iter_mut().find(|(b, _)| *b == bucket) {
            entry.1 += 1;
        }
    }

    let mut result =
        CalculationResult::from_inputs(KpiMetric::WipAging, average, MetricUnit::Days, vec![]);
    if orders.is_empty() {
        result = result.with_note("no work in progress");
    }
    let inferred: Vec<&str> = orders
        .iter()
        .filter(|o| o.anchor.is_inferred())
        .map(|o| o.work_order_id.as_str())
        .collect();
    if !inferred.is_empty() {
        result = result.mark_estimated(format!(
            "start date inferred for: {}",
            inferred.join(", ")
        ));
    }

    WipAgingReport {
        result,
        orders,
        buckets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ConfidenceLevel;
    use crate::engine::aging::AgingAnchor;
    use chrono::NaiveDate;

    fn aging(id: &str, net_days: f64, anchor: AgingAnchor) -> AgingResult {
        let t = NaiveDate::from_ymd_opt(2025, 12, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        AgingResult {
            work_order_id: id.to_string(),
            anchor,
            anchor_time: t,
            measured_until: t,
            frozen: false,
            gross_days: net_days,
            hold_days: 0.0,
            net_days,
        }
    }

    #[test]
    fn test_average_and_buckets() {
        let report = calculate_wip_aging(vec![
            aging("A", 5.0, AgingAnchor::ActualStart),
            aging("B", 10.0, AgingAnchor::ActualStart),
            aging("C", 45.0, AgingAnchor::ActualStart),
        ]);
        assert!((report.result.value - 20.0).abs() < 1e-9);
        assert!(!report.result.is_estimated);
        assert_eq!(report.buckets[0], (AgingBucket::UpTo7Days, 1));
        assert_eq!(report.buckets[1], (AgingBucket::Days8To14, 1));
        assert_eq!(report.buckets[3], (AgingBucket::Over30Days, 1));
    }

    #[test]
    fn test_inferred_anchor_marks_estimated() {
        let report = calculate_wip_aging(vec![aging("A", 5.0, AgingAnchor::PlannedStart)]);
        assert!(report.result.is_estimated);
        assert!(report.result.confidence.level < ConfidenceLevel::High);
        assert_eq!(report.result.confidence.inferred_inputs, 1);
    }

    #[test]
    fn test_actual_anchor_keeps_high_confidence() {
        let report = calculate_wip_aging(vec![aging("A", 5.0, AgingAnchor::ActualStart)]);
        assert_eq!(report.result.confidence.level, ConfidenceLevel::High);
        assert_eq!(report.result.confidence.inferred_inputs, 0);
    }

    #[test]
    fn test_empty_wip_is_zero() {
        let report = calculate_wip_aging(vec![]);
        assert_eq!(report.result.value, 0.0);
    }
}
