// ==========================================
// 车间绩效系统 - 指标计算器
// ==========================================
// 职责: 十项制造绩效指标的纯函数计算
// 输入: 已由 Config Resolver 推断完成的输入
// 输出: CalculationResult (值 / 估算标记 / 置信度 / 来源)
// 红线: 可推断输入缺失不报错,只标记估算; 不可推断输入缺失才报 Validation
// 红线: 比值分母先校验非负,零分母返回文档约定的默认值
// ==========================================

pub mod absenteeism;
pub mod defect_rate;
pub mod delivery;
pub mod efficiency;
pub mod performance;
pub mod quality;
pub mod wip_aging;
pub mod yield_rate;

pub use absenteeism::calculate_absenteeism;
pub use defect_rate::{calculate_dpmo, calculate_ppm, DpmoInputs, PpmInputs};
pub use delivery::{
    calculate_delivery, promised_date, DeliveryInputs, DeliveryResults, PromiseSource,
};
pub use efficiency::{calculate_efficiency, EfficiencyInputs};
pub use performance::{calculate_performance, PerformanceInputs};
pub use quality::{
    calculate_availability, calculate_oee, calculate_quality_rate, AvailabilityInputs,
    QualityRateInputs,
};
pub use wip_aging::{calculate_wip_aging, AgingBucket, WipAgingReport};
pub use yield_rate::{calculate_fpy, calculate_rty, FpyInputs, ProcessStepYield};

use crate::engine::error::{EngineError, EngineResult};

/// 比值 (分母 ≤ 0 时返回 0)
pub(crate) fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// 校验数量非负
pub(crate) fn ensure_non_negative(field: &str, value: f64) -> EngineResult<()> {
    if value < 0.0 || value.is_nan() {
        return Err(EngineError::validation(
            field,
            format!("value must be non-negative, got {}", value),
        ));
    }
    Ok(())
}

/// 校验子集数量不超过总量 (如 units_passed ≤ units_inspected)
pub(crate) fn ensure_not_above(
    field: &str,
    value: i64,
    limit_field: &str,
    limit: i64,
) -> EngineResult<()> {
    if value > limit {
        return Err(EngineError::validation(
            field,
            format!("{}={} exceeds {}={}", field, value, limit_field, limit),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_ratio_zero_denominator() {
        assert_eq!(safe_ratio(5.0, 0.0), 0.0);
        assert_eq!(safe_ratio(5.0, -1.0), 0.0);
        assert_eq!(safe_ratio(5.0, 10.0), 0.5);
    }

    #[test]
    fn test_ensure_non_negative() {
        assert!(ensure_non_negative("units", 0.0).is_ok());
        assert!(ensure_non_negative("units", -1.0).is_err());
        assert!(ensure_non_negative("units", f64::NAN).is_err());
    }
}
