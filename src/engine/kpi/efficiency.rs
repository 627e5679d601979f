// ==========================================
// 车间绩效系统 - 效率计算
// ==========================================
// 公式: (产量 × 理想节拍) / (在岗人数 × 计划工时) × 100
// 边界: 人数或工时为 0 → 0; 上限 150%
// ==========================================

use super::{ensure_non_negative, safe_ratio};
use crate::config::defaults::PERCENT_CAP;
use crate::domain::calculation::{CalculationResult, InputResolution};
use crate::domain::types::{KpiMetric, MetricUnit};
use crate::engine::error::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct EfficiencyInputs {
    pub units_produced: Option<i64>, // 不可推断
    pub ideal_cycle_time: InputResolution,
    pub employees: InputResolution,
    pub scheduled_hours: InputResolution,
}

pub fn calculate_efficiency(inputs: &EfficiencyInputs) -> EngineResult<CalculationResult> {
    let units = inputs
        .units_produced
        .ok_or_else(|| EngineError::validation("units_produced", "units_produced is required"))?
        as f64;
    ensure_non_negative("units_produced", units)?;
    ensure_non_negative("employees", inputs.employees.value)?;
    ensure_non_negative("scheduled_hours", inputs.scheduled_hours.value)?;

    let earned_hours = units * inputs.ideal_cycle_time.value;
    let available_hours = inputs.employees.value * inputs.scheduled_hours.value;
    let value = safe_ratio(earned_hours, available_hours) * 100.0;

    Ok(CalculationResult::from_inputs(
        KpiMetric::Efficiency,
        value,
        MetricUnit::Percent,
        vec![
            inputs.ideal_cycle_time,
            inputs.employees,
            inputs.scheduled_hours,
        ],
    )
    .with_cap(PERCENT_CAP))
}
