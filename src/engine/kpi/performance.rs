// ==========================================
// 车间绩效系统 - 性能计算
// ==========================================
// 公式: (理想节拍 × 产量) / 运行工时 × 100
// 边界: 运行工时为 0 → 0; 上限 150%
// 推断: 运行工时缺失时以 计划工时 − 停机工时 估算
// ==========================================

use super::{ensure_non_negative, safe_ratio};
use crate::config::defaults::PERCENT_CAP;
use crate::domain::calculation::{CalculationResult, InputResolution};
use crate::domain::types::{KpiMetric, MetricUnit};
use crate::engine::error::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct PerformanceInputs {
    pub units_produced: Option<i64>,
    pub ideal_cycle_time: InputResolution,
    pub run_time_hours: Option<f64>,
    pub scheduled_hours: InputResolution,
    pub downtime_hours: f64,
}

pub fn calculate_performance(inputs: &PerformanceInputs) -> EngineResult<CalculationResult> {
    let units = inputs
        .units_produced
        .ok_or_else(|| EngineError::validation("units_produced", "units_produced is required"))?
        as f64;
    ensure_non_negative("units_produced", units)?;
    ensure_non_negative("downtime_hours", inputs.downtime_hours)?;

    let mut resolved = vec![inputs.ideal_cycle_time];
    let (run_time, inferred_run_time) = match inputs.run_time_hours {
        Some(hours) => {
            ensure_non_negative("run_time_hours", hours)?;
            (hours, false)
        }
        None => {
            resolved.push(inputs.scheduled_hours);
            (
                (inputs.scheduled_hours.value - inputs.downtime_hours).max(0.0),
                true,
            )
        }
    };

    let value = safe_ratio(inputs.ideal_cycle_time.value * units, run_time) * 100.0;

    let mut result =
        CalculationResult::from_inputs(KpiMetric::Performance, value, MetricUnit::Percent, resolved)
            .with_cap(PERCENT_CAP);
    if inferred_run_time {
        result = result.mark_estimated("run time inferred as scheduled hours minus downtime");
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::InferableParameter;

    fn inputs(run_time: Option<f64>) -> PerformanceInputs {
        PerformanceInputs {
            units_produced: Some(100),
            ideal_cycle_time: InputResolution::from_record(InferableParameter::IdealCycleTime, 0.1),
            run_time_hours: run_time,
            scheduled_hours: InputResolution::from_record(InferableParameter::ShiftHours, 8.0),
            downtime_hours: 3.0,
        }
    }

    #[test]
    fn test_performance_formula() {
        let r = calculate_performance(&inputs(Some(12.5))).unwrap();
        assert!((r.value - 80.0).abs() < 1e-9);
        assert!(!r.is_estimated);
    }

    #[test]
    fn test_performance_zero_run_time_is_zero() {
        let r = calculate_performance(&inputs(Some(0.0))).unwrap();
        assert_eq!(r.value, 0.0);
    }

    #[test]
    fn test_performance_infers_run_time() {
        let r = calculate_performance(&inputs(None)).unwrap();
        // 10 / (8 - 3) × 100 = 200, 截断到 150
        assert_eq!(r.value, 150.0);
        assert!(r.capped);
        assert!(r.is_estimated);
        assert_eq!(r.inputs.len(), 2);
    }
}
