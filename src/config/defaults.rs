// ==========================================
// 车间绩效系统 - 系统默认值与配置键
// ==========================================
// 职责: 推断链末端的硬编码系统默认值
// 红线: 系统默认值缺失属于致命配置缺陷,必须中止计算,不得猜测
// ==========================================

use crate::domain::types::InferableParameter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 理想节拍系统默认值（小时/件）
pub const DEFAULT_IDEAL_CYCLE_TIME_HOURS: f64 = 0.25;

/// 单件缺陷机会数系统默认值
pub const DEFAULT_OPPORTUNITIES_PER_UNIT: f64 = 10.0;

/// 在岗人数系统默认值
pub const DEFAULT_EMPLOYEE_COUNT: f64 = 1.0;

/// 班次计划工时系统默认值（小时）
pub const DEFAULT_SHIFT_HOURS: f64 = 8.0;

/// 历史均值查询超时（毫秒）
pub const DEFAULT_HISTORY_TIMEOUT_MS: u64 = 2_000;

/// 历史均值回看窗口（天）
pub const DEFAULT_HISTORY_WINDOW_DAYS: i64 = 30;

/// 效率/性能上限（%）
pub const PERCENT_CAP: f64 = 150.0;

// ==========================================
// SystemDefaults - 推断链末端默认值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDefaults {
    values: BTreeMap<InferableParameter, f64>,
}

impl SystemDefaults {
    /// 空默认表（仅用于测试配置缺陷场景）
    pub fn empty() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, parameter: InferableParameter) -> Option<f64> {
        self.values.get(&parameter).copied()
    }

    pub fn with_value(mut self, parameter: InferableParameter, value: f64) -> Self {
        self.values.insert(parameter, value);
        self
    }

    pub fn without(mut self, parameter: InferableParameter) -> Self {
        self.values.remove(&parameter);
        self
    }

    /// 校验每个可推断参数都有末端默认值
    pub fn missing_parameters(&self) -> Vec<InferableParameter> {
        InferableParameter::ALL
            .iter()
            .filter(|p| !self.values.contains_key(p))
            .copied()
            .collect()
    }
}

impl Default for SystemDefaults {
    fn default() -> Self {
        Self::empty()
            .with_value(
                InferableParameter::IdealCycleTime,
                DEFAULT_IDEAL_CYCLE_TIME_HOURS,
            )
            .with_value(
                InferableParameter::OpportunitiesPerUnit,
                DEFAULT_OPPORTUNITIES_PER_UNIT,
            )
            .with_value(InferableParameter::EmployeeCount, DEFAULT_EMPLOYEE_COUNT)
            .with_value(InferableParameter::ShiftHours, DEFAULT_SHIFT_HOURS)
    }
}

// ==========================================
// 配置键常量 (config_kv 扁平格式)
// ==========================================
pub mod config_keys {
    // 客户默认参数
    pub const DEFAULT_CYCLE_TIME_HOURS: &str = "default_cycle_time_hours";
    pub const DEFAULT_OPPORTUNITIES_PER_UNIT: &str = "default_opportunities_per_unit";
    pub const DEFAULT_EMPLOYEE_COUNT: &str = "default_employee_count";
    pub const DEFAULT_SHIFT_HOURS: &str = "default_shift_hours";

    // 工单流转
    pub const WORKFLOW_TEMPLATE_ID: &str = "workflow_template_id";
    pub const WORKFLOW_TEMPLATE: &str = "workflow_template"; // 覆写模板 (JSON)
    pub const CLOSURE_TRIGGER: &str = "closure_trigger";

    // 在制账龄
    pub const AGING_INCLUDE_OPEN_HOLDS: &str = "aging_include_open_holds";

    // 历史均值
    pub const HISTORY_TIMEOUT_MS: &str = "history_timeout_ms";
    pub const HISTORY_WINDOW_DAYS: &str = "history_window_days";

    // 款式覆写 / 产线标准 (JSON)
    pub const STYLE_OVERRIDES: &str = "style_overrides";
    pub const LINE_STANDARDS: &str = "line_standards";
}
