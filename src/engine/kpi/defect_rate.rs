// ==========================================
// 车间绩效系统 - PPM / DPMO
// ==========================================
// PPM: 不良件数 / 检验数 × 1,000,000 (检验数为 0 → 0)
// DPMO: 缺陷数 / (件数 × 单件机会数) × 1,000,000
//       单件机会数经 Config Resolver 推断,系统默认 10
// ==========================================

use super::{ensure_non_negative, ensure_not_above, safe_ratio};
use crate::domain::calculation::{CalculationResult, InputResolution};
use crate::domain::types::{KpiMetric, MetricUnit};
use crate::engine::error::EngineResult;

const PER_MILLION: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy)]
pub struct PpmInputs {
    pub units_inspected: i64,
    pub units_defective: i64,
}

pub fn calculate_ppm(inputs: &PpmInputs) -> EngineResult<CalculationResult> {
    ensure_non_negative("units_inspected", inputs.units_inspected as f64)?;
    ensure_non_negative("units_defective", inputs.units_defective as f64)?;
    ensure_not_above(
        "units_defective",
        inputs.units_defective,
        "units_inspected",
        inputs.units_inspected,
    )?;

    let value =
        safe_ratio(inputs.units_defective as f64, inputs.units_inspected as f64) * PER_MILLION;
    Ok(CalculationResult::from_inputs(
        KpiMetric::Ppm,
        value,
        MetricUnit::PartsPerMillion,
        vec![],
    ))
}

#[derive(Debug, Clone, Copy)]
pub struct DpmoInputs {
    pub defect_count: i64,
    pub units: i64,
    pub opportunities_per_unit: InputResolution,
}

pub fn calculate_dpmo(inputs: &DpmoInputs) -> EngineResult<CalculationResult> {
    ensure_non_negative("defect_count", inputs.defect_count as f64)?;
    ensure_non_negative("units", inputs.units as f64)?;
    ensure_non_negative(
        "opportunities_per_unit",
        inputs.opportunities_per_unit.value,
    )?;

    let opportunities = inputs.units as f64 * inputs.opportunities_per_unit.value;
    let value = safe_ratio(inputs.defect_count as f64, opportunities) * PER_MILLION;
    Ok(CalculationResult::from_inputs(
        KpiMetric::Dpmo,
        value,
        MetricUnit::DefectsPerMillionOpportunities,
        vec![inputs.opportunities_per_unit],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{InferableParameter, ResolutionSource};

    #[test]
    fn test_ppm() {
        let r = calculate_ppm(&PpmInputs {
            units_inspected: 500,
            units_defective: 5,
        })
        .unwrap();
        assert!((r.value - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_ppm_zero_inspected() {
        let r = calculate_ppm(&PpmInputs {
            units_inspected: 0,
            units_defective: 0,
        })
        .unwrap();
        assert_eq!(r.value, 0.0);
    }

    #[test]
    fn test_dpmo_with_default_opportunities() {
        let r = calculate_dpmo(&DpmoInputs {
            defect_count: 25,
            units: 1000,
            opportunities_per_unit: InputResolution::new(
                InferableParameter::OpportunitiesPerUnit,
                10.0,
                ResolutionSource::SystemDefault,
            ),
        })
        .unwrap();
        assert!((r.value - 2_500.0).abs() < 1e-6);
        assert!(r.is_estimated);
    }

    #[test]
    fn test_dpmo_zero_units() {
        let r = calculate_dpmo(&DpmoInputs {
            defect_count: 3,
            units: 0,
            opportunities_per_unit: InputResolution::from_record(
                InferableParameter::OpportunitiesPerUnit,
                4.0,
            ),
        })
        .unwrap();
        assert_eq!(r.value, 0.0);
    }
}
