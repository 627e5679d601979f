// ==========================================
// 车间绩效系统 - 准时交付率 (OTD / True-OTD)
// ==========================================
// OTD: 准时单数 / 已交付单数 × 100
// True-OTD: (准时 ∧ 足量) 单数 / 足量交付单数 × 100
// 承诺日回退链: 计划发运日 → 客户要求日 → 计划开工日 + 理想节拍 × 数量
// 边界: 分母为 0 → 0; 无承诺日的工单不参与统计并标记估算
// ==========================================

use crate::domain::calculation::{CalculationResult, InputResolution};
use crate::domain::types::{KpiMetric, MetricUnit};
use crate::domain::work_order::WorkOrder;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::safe_ratio;

// ==========================================
// 承诺日来源
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromiseSource {
    PlannedShipDate,
    RequiredDate,
    PlannedStartPlusCycleTime,
}

#[derive(Debug, Clone)]
pub struct DeliveryInputs<'a> {
    pub work_order: &'a WorkOrder,
    /// 仅在需要第三级回退时使用
    pub ideal_cycle_time: Option<InputResolution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResults {
    pub otd: CalculationResult,
    pub true_otd: CalculationResult,
}

/// 计算工单承诺日
pub fn promised_date(
    work_order: &WorkOrder,
    ideal_cycle_time: Option<&InputResolution>,
) -> Option<(NaiveDate, PromiseSource)> {
    if let Some(date) = work_order.planned_ship_date {
        return Some((date, PromiseSource::PlannedShipDate));
    }
    if let Some(date) = work_order.required_date {
        return Some((date, PromiseSource::RequiredDate));
    }
    let start = work_order.planned_start_date?;
    let cycle = ideal_cycle_time?;
    let minutes = (cycle.value * work_order.planned_quantity.max(0) as f64 * 60.0).round();
    // 超出日期范围视为无承诺日
    if !minutes.is_finite() || minutes < 0.0 || minutes >= i64::MAX as f64 {
        return None;
    }
    let offset = Duration::try_minutes(minutes as i64)?;
    let due_at = start.and_hms_opt(0, 0, 0)?.checked_add_signed(offset)?;
    Some((due_at.date(), PromiseSource::PlannedStartPlusCycleTime))
}

pub fn calculate_delivery(orders: &[DeliveryInputs<'_>]) -> DeliveryResults {
    let mut delivered = 0usize;
    let mut on_time = 0usize;
    let mut complete = 0usize;
    let mut on_time_complete = 0usize;
    let mut resolved: Vec<InputResolution> = Vec::new();
    let mut fallback_orders = Vec::new();
    let mut unpromised_orders = Vec::new();

    for input in orders {
        let wo = input.work_order;
        let Some(shipped_on) = wo.actual_ship_date else {
            continue;
        };

        let Some((promised, source)) = promised_date(wo, input.ideal_cycle_time.as_ref()) else {
            unpromised_orders.push(wo.work_order_id.clone());
            continue;
        };
        match source {
            PromiseSource::PlannedShipDate => {}
            PromiseSource::RequiredDate => fallback_orders.push(wo.work_order_id.clone()),
            PromiseSource::PlannedStartPlusCycleTime => {
                fallback_orders.push(wo.work_order_id.clone());
                if let Some(cycle) = input.ideal_cycle_time {
                    resolved.push(cycle);
                }
            }
        }

        let is_on_time = shipped_on <= promised;
        let is_complete = wo.shipped_quantity >= wo.planned_quantity;

        delivered += 1;
        if is_on_time {
            on_time += 1;
        }
        if is_complete {
            complete += 1;
            if is_on_time {
                on_time_complete += 1;
            }
        }
    }

    let otd_value = safe_ratio(on_time as f64, delivered as f64) * 100.0;
    let true_otd_value = safe_ratio(on_time_complete as f64, complete as f64) * 100.0;

    let decorate = |mut result: CalculationResult| {
        if !fallback_orders.is_empty() {
            result = result.mark_estimated(format!(
                "promised date inferred for: {}",
                fallback_orders.join(", ")
            ));
        }
        if !unpromised_orders.is_empty() {
            result = result.mark_estimated(format!(
                "excluded without promised date: {}",
                unpromised_orders.join(", ")
            ));
        }
        result
    };

    DeliveryResults {
        otd: decorate(CalculationResult::from_inputs(
            KpiMetric::OnTimeDelivery,
            otd_value,
            MetricUnit::Percent,
            resolved.clone(),
        )),
        true_otd: decorate(CalculationResult::from_inputs(
            KpiMetric::TrueOnTimeDelivery,
            true_otd_value,
            MetricUnit::Percent,
            resolved,
        )),
    }
}
