// ==========================================
// 车间绩效系统 - 一次合格率 / 累计直通率
// ==========================================
// FPY: 一次合格 / 检验数 × 100 (检验数为 0 → 0)
//      一次合格 = 最终合格 − 返工 − 返修
// RTY: 各工序 FPY (小数) 按顺序连乘; 空管线 → 100%; 全部工序无数据 → 0
// ==========================================

use super::{ensure_non_negative, ensure_not_above, safe_ratio};
use crate::domain::calculation::{CalculationResult, Confidence};
use crate::domain::types::{KpiMetric, MetricUnit};
use crate::engine::error::EngineResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct FpyInputs {
    pub units_inspected: i64,
    pub units_passed: i64,
    pub units_rework: i64,
    pub units_repair: i64,
}

impl FpyInputs {
    fn validate(&self) -> EngineResult<()> {
        ensure_non_negative("units_inspected", self.units_inspected as f64)?;
        ensure_non_negative("units_passed", self.units_passed as f64)?;
        ensure_non_negative("units_rework", self.units_rework as f64)?;
        ensure_non_negative("units_repair", self.units_repair as f64)?;
        ensure_not_above(
            "units_passed",
            self.units_passed,
            "units_inspected",
            self.units_inspected,
        )
    }

    /// 一次合格件数
    pub fn first_pass_units(&self) -> i64 {
        (self.units_passed - self.units_rework - self.units_repair).max(0)
    }

    fn ratio(&self) -> f64 {
        safe_ratio(self.first_pass_units() as f64, self.units_inspected as f64)
    }
}

pub fn calculate_fpy(inputs: &FpyInputs) -> EngineResult<CalculationResult> {
    inputs.validate()?;
    Ok(CalculationResult::from_inputs(
        KpiMetric::FirstPassYield,
        inputs.ratio() * 100.0,
        MetricUnit::Percent,
        vec![],
    ))
}

/// 工序良率
#[derive(Debug, Clone)]
pub struct ProcessStepYield {
    pub step_name: String,
    pub sequence: i32,
    pub inputs: FpyInputs,
}

/// 计算累计直通率
///
/// 无检验数据的工序不参与连乘（否则整条管线归零），结果标记为估算
///
/// 空管线为 100%；有工序但全部无检验数据时为 0 且低置信
pub fn calculate_rty(steps: &[ProcessStepYield]) -> EngineResult<CalculationResult> {
    let mut ordered: Vec<&ProcessStepYield> = steps.iter().collect();
    ordered.sort_by_key(|s| s.sequence);

    let mut rty = 1.0;
    let mut skipped = Vec::new();
    for step in &ordered {
        step.inputs.validate()?;
        if step.inputs.units_inspected == 0 {
            skipped.push(step.step_name.clone());
            continue;
        }
        rty *= step.inputs.ratio();
    }

    let mut result = CalculationResult::from_inputs(
        KpiMetric::RolledThroughputYield,
        rty * 100.0,
        MetricUnit::Percent,
        vec![],
    );
    if ordered.is_empty() {
        result = result.with_note("empty pipeline");
    } else if skipped.len() == ordered.len() {
        result.value = 0.0;
        result.confidence = Confidence::no_data();
    }
    if !skipped.is_empty() {
        result = result.mark_estimated(format!(
            "steps without inspection data skipped: {}",
            skipped.join(", ")
        ));
    }
    Ok(result)
}
