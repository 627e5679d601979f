// ==========================================
// 车间绩效系统 - 质量率 / 可用率 / OEE
// ==========================================
// 质量率: 良品 / 总数 × 100 (总数为 0 → 0)
// 可用率: (计划时间 − 非计划停机) / 计划时间 × 100,
//         计划时间 = 班次工时 − 计划停机
// OEE: 可用率 × 性能 × 质量率 (均按小数相乘)
// 红线: OEE 中性能按 1.0 截断,OEE 不超过 100%
// ==========================================

use super::{ensure_non_negative, ensure_not_above, safe_ratio};
use crate::domain::calculation::{CalculationResult, InputResolution};
use crate::domain::types::{KpiMetric, MetricUnit};
use crate::engine::error::{EngineError, EngineResult};

// ==========================================
// 质量率
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct QualityRateInputs {
    pub total_units: i64,
    pub good_units: i64,
}

pub fn calculate_quality_rate(inputs: &QualityRateInputs) -> EngineResult<CalculationResult> {
    ensure_non_negative("total_units", inputs.total_units as f64)?;
    ensure_non_negative("good_units", inputs.good_units as f64)?;
    ensure_not_above(
        "good_units",
        inputs.good_units,
        "total_units",
        inputs.total_units,
    )?;

    let value = safe_ratio(inputs.good_units as f64, inputs.total_units as f64) * 100.0;
    Ok(CalculationResult::from_inputs(
        KpiMetric::QualityRate,
        value,
        MetricUnit::Percent,
        vec![],
    ))
}

// ==========================================
// 可用率
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityInputs {
    pub scheduled_hours: InputResolution,
    pub planned_downtime_hours: f64,
    pub unplanned_downtime_hours: f64,
}

pub fn calculate_availability(inputs: &AvailabilityInputs) -> EngineResult<CalculationResult> {
    ensure_non_negative("planned_downtime_hours", inputs.planned_downtime_hours)?;
    ensure_non_negative("unplanned_downtime_hours", inputs.unplanned_downtime_hours)?;

    let planned_time = (inputs.scheduled_hours.value - inputs.planned_downtime_hours).max(0.0);
    let operating_time = (planned_time - inputs.unplanned_downtime_hours).max(0.0);
    let value = safe_ratio(operating_time, planned_time) * 100.0;

    Ok(CalculationResult::from_inputs(
        KpiMetric::Availability,
        value,
        MetricUnit::Percent,
        vec![inputs.scheduled_hours],
    ))
}

// ==========================================
// OEE
// ==========================================
pub fn calculate_oee(
    availability: &CalculationResult,
    performance: &CalculationResult,
    quality: &CalculationResult,
) -> EngineResult<CalculationResult> {
    for (expected, part) in [
        (KpiMetric::Availability, availability),
        (KpiMetric::Performance, performance),
        (KpiMetric::QualityRate, quality),
    ] {
        if part.metric != expected {
            return Err(EngineError::validation(
                "oee_component",
                format!("expected {} component, got {}", expected, part.metric),
            ));
        }
    }

    let a = (availability.value / 100.0).clamp(0.0, 1.0);
    let p = (performance.value / 100.0).clamp(0.0, 1.0);
    let q = (quality.value / 100.0).clamp(0.0, 1.0);

    let inputs: Vec<InputResolution> = availability
        .inputs
        .iter()
        .chain(performance.inputs.iter())
        .chain(quality.inputs.iter())
        .copied()
        .collect();

    let mut result =
        CalculationResult::from_inputs(KpiMetric::Oee, a * p * q * 100.0, MetricUnit::Percent, inputs);
    if performance.value > 100.0 {
        result = result.with_note("performance clamped to 100% for OEE");
    }
    if availability.is_estimated || performance.is_estimated || quality.is_estimated {
        result.is_estimated = true;
    }
    Ok(result)
}
