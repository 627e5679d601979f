// ==========================================
// 车间绩效系统 - 指标计算结果
// ==========================================
// 职责: 计算结果、输入推断来源、置信度
// 用途: isEstimated 与置信度驱动报表上的"估算"标记
// ==========================================

use crate::domain::types::{
    ConfidenceLevel, InferableParameter, KpiMetric, MetricUnit, ResolutionSource,
};
use serde::{Deserialize, Serialize};

/// 中等置信阈值
pub const MEDIUM_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// 整体估算 (非参数推断) 计为一项推断输入时的权重
pub const ESTIMATION_WEIGHT: f64 = 0.6;

// ==========================================
// InputResolution - 单个输入的推断结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputResolution {
    pub parameter: InferableParameter,
    pub value: f64,
    pub source: ResolutionSource,
}

impl InputResolution {
    pub fn new(parameter: InferableParameter, value: f64, source: ResolutionSource) -> Self {
        Self {
            parameter,
            value,
            source,
        }
    }

    /// 记录上直接给出的值
    pub fn from_record(parameter: InferableParameter, value: f64) -> Self {
        Self::new(parameter, value, ResolutionSource::RecordValue)
    }

    pub fn is_estimated(&self) -> bool {
        !self.source.is_authoritative()
    }
}

// ==========================================
// Confidence - 置信度
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub score: f64,
    pub level: ConfidenceLevel,
    pub inferred_inputs: usize,
    pub total_inputs: usize,
}

impl Confidence {
    /// 无推断输入时的满置信
    pub fn full() -> Self {
        Self {
            score: 1.0,
            level: ConfidenceLevel::High,
            inferred_inputs: 0,
            total_inputs: 0,
        }
    }

    /// 由各输入来源汇总置信度
    ///
    /// 规则:
    /// - score = 各来源权重的平均值
    /// - 全部权威来源 → HIGH
    /// - score ≥ 0.6 → MEDIUM
    /// - 其他 → LOW
    pub fn from_sources(sources: &[ResolutionSource]) -> Self {
        if sources.is_empty() {
            return Self::full();
        }

        let total_inputs = sources.len();
        let inferred_inputs = sources.iter().filter(|s| !s.is_authoritative()).count();
        let score =
            sources.iter().map(|s| s.confidence_weight()).sum::<f64>() / total_inputs as f64;

        let level = if inferred_inputs == 0 {
            ConfidenceLevel::High
        } else if score >= MEDIUM_CONFIDENCE_THRESHOLD {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };

        Self {
            score,
            level,
            inferred_inputs,
            total_inputs,
        }
    }

    /// 追加一项整体估算
    ///
    /// 估算计入推断输入,分数只降不升,等级最高为 MEDIUM
    pub fn with_estimation(self) -> Self {
        let total_inputs = self.total_inputs + 1;
        let blended =
            (self.score * self.total_inputs as f64 + ESTIMATION_WEIGHT) / total_inputs as f64;
        let score = blended.min(self.score);
        let level = if score >= MEDIUM_CONFIDENCE_THRESHOLD {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };
        Self {
            score,
            level: level.min(self.level),
            inferred_inputs: self.inferred_inputs + 1,
            total_inputs,
        }
    }

    /// 数据整体缺失时的低置信 (如无考勤数据)
    pub fn no_data() -> Self {
        Self {
            score: 0.0,
            level: ConfidenceLevel::Low,
            inferred_inputs: 0,
            total_inputs: 0,
        }
    }
}

// ==========================================
// CalculationResult - 指标计算结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub metric: KpiMetric,
    pub value: f64,
    pub unit: MetricUnit,
    pub is_estimated: bool,
    pub confidence: Confidence,
    pub inputs: Vec<InputResolution>, // 每个推断输入使用的来源 (审计用)
    pub capped: bool,                 // 是否触发上限截断
    pub notes: Vec<String>,
}

impl CalculationResult {
    /// 由输入推断结果构造计算结果
    pub fn from_inputs(
        metric: KpiMetric,
        value: f64,
        unit: MetricUnit,
        inputs: Vec<InputResolution>,
    ) -> Self {
        let sources: Vec<ResolutionSource> = inputs.iter().map(|i| i.source).collect();
        let confidence = Confidence::from_sources(&sources);
        Self {
            metric,
            value,
            unit,
            is_estimated: inputs.iter().any(|i| i.is_estimated()),
            confidence,
            inputs,
            capped: false,
            notes: Vec::new(),
        }
    }

    /// 截断到上限
    pub fn with_cap(mut self, cap: f64) -> Self {
        if self.value > cap {
            self.notes
                .push(format!("value {:.2} capped at {:.0}", self.value, cap));
            self.value = cap;
            self.capped = true;
        }
        self
    }

    /// 标记为估算 (数据整体缺失等非参数推断场景)
    pub fn mark_estimated(mut self, note: impl Into<String>) -> Self {
        self.is_estimated = true;
        self.confidence = self.confidence.with_estimation();
        self.notes.push(note.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// 推断来源汇总 (如 "2 of 3 inputs inferred")
    pub fn inference_summary(&self) -> String {
        format!(
            "{} of {} inputs inferred",
            self.confidence.inferred_inputs, self.confidence.total_inputs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_all_authoritative_is_high() {
        let c = Confidence::from_sources(&[
            ResolutionSource::RecordValue,
            ResolutionSource::LineStandard,
        ]);
        assert_eq!(c.level, ConfidenceLevel::High);
        assert_eq!(c.inferred_inputs, 0);
        assert_eq!(c.total_inputs, 2);
    }

    #[test]
    fn test_confidence_with_system_default_is_low() {
        let c = Confidence::from_sources(&[
            ResolutionSource::SystemDefault,
            ResolutionSource::HistoricalAverage,
        ]);
        assert_eq!(c.level, ConfidenceLevel::Low);
        assert_eq!(c.inferred_inputs, 2);
    }

    #[test]
    fn test_confidence_mixed_is_medium() {
        let c = Confidence::from_sources(&[
            ResolutionSource::RecordValue,
            ResolutionSource::ClientDefault,
        ]);
        assert_eq!(c.level, ConfidenceLevel::Medium);
        assert!((c.score - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_mark_estimated_lowers_confidence() {
        let r = CalculationResult::from_inputs(
            KpiMetric::WipAging,
            12.0,
            MetricUnit::Days,
            vec![],
        );
        assert_eq!(r.confidence.level, ConfidenceLevel::High);

        let r = r.mark_estimated("anchor inferred");
        assert!(r.is_estimated);
        assert_eq!(r.confidence.level, ConfidenceLevel::Medium);
        assert_eq!(r.confidence.inferred_inputs, 1);
        assert_eq!(r.confidence.total_inputs, 1);
        assert!(r.confidence.score < 1.0);
        assert_eq!(r.inference_summary(), "1 of 1 inputs inferred");
    }

    #[test]
    fn test_estimation_never_raises_confidence() {
        let mut r = CalculationResult::from_inputs(
            KpiMetric::Absenteeism,
            0.0,
            MetricUnit::Percent,
            vec![],
        );
        r.confidence = Confidence::no_data();
        let r = r.mark_estimated("no attendance data");
        assert_eq!(r.confidence.level, ConfidenceLevel::Low);
        assert_eq!(r.confidence.score, 0.0);

        let authoritative = Confidence::from_sources(&[
            ResolutionSource::RecordValue,
            ResolutionSource::RecordValue,
        ])
        .with_estimation();
        assert_eq!(authoritative.level, ConfidenceLevel::Medium);
        assert!((authoritative.score - 2.6 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_with_cap() {
        let r = CalculationResult::from_inputs(
            KpiMetric::Efficiency,
            180.0,
            MetricUnit::Percent,
            vec![],
        )
        .with_cap(150.0);
        assert_eq!(r.value, 150.0);
        assert!(r.capped);
        assert!(!r.is_estimated);
    }
}
