// ==========================================
// 车间绩效系统 - 客户配置快照
// ==========================================
// 职责: 租户级默认参数、工单模板选择、推断设置
// 红线: 快照不可变,每次调用传入; 引擎不修改、不拉取配置
// ==========================================

use crate::config::defaults::{
    config_keys, DEFAULT_HISTORY_TIMEOUT_MS, DEFAULT_HISTORY_WINDOW_DAYS,
};
use crate::config::workflow_profile::WorkflowTemplateOverride;
use crate::domain::types::{ClosureTrigger, InferableParameter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ==========================================
// ParameterValues - 一组可推断参数取值
// ==========================================
// 用于款式覆写、产线/班次标准
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ParameterValues {
    #[serde(default)]
    pub ideal_cycle_time_hours: Option<f64>,

    #[serde(default)]
    pub opportunities_per_unit: Option<f64>,

    #[serde(default)]
    pub employee_count: Option<f64>,

    #[serde(default)]
    pub shift_hours: Option<f64>,
}

impl ParameterValues {
    pub fn get(&self, parameter: InferableParameter) -> Option<f64> {
        match parameter {
            InferableParameter::IdealCycleTime => self.ideal_cycle_time_hours,
            InferableParameter::OpportunitiesPerUnit => self.opportunities_per_unit,
            InferableParameter::EmployeeCount => self.employee_count,
            InferableParameter::ShiftHours => self.shift_hours,
        }
    }
}

// ==========================================
// AgingPolicy - 在制账龄口径
// ==========================================
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct AgingPolicy {
    /// 未结束的暂停是否也从账龄中扣除（截至 now）
    #[serde(default)]
    pub include_open_holds: bool,
}

// ==========================================
// ResolverSettings - 推断设置
// ==========================================
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ResolverSettings {
    /// 历史均值查询超时（毫秒）
    #[serde(default = "default_history_timeout_ms")]
    pub history_timeout_ms: u64,

    /// 历史均值回看窗口（天）
    #[serde(default = "default_history_window_days")]
    pub history_window_days: i64,
}

fn default_history_timeout_ms() -> u64 {
    DEFAULT_HISTORY_TIMEOUT_MS
}

fn default_history_window_days() -> i64 {
    DEFAULT_HISTORY_WINDOW_DAYS
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            history_timeout_ms: default_history_timeout_ms(),
            history_window_days: default_history_window_days(),
        }
    }
}

impl ResolverSettings {
    pub fn history_timeout(&self) -> Duration {
        Duration::from_millis(self.history_timeout_ms)
    }
}

// ==========================================
// ClientConfig - 客户配置快照
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClientConfig {
    pub client_id: String,

    // ===== 客户默认参数 =====
    #[serde(default)]
    pub defaults: ParameterValues,

    /// 款式 → 参数覆写
    #[serde(default)]
    pub style_overrides: HashMap<String, ParameterValues>,

    /// 产线/班次 → 标准参数
    #[serde(default)]
    pub line_standards: HashMap<String, ParameterValues>,

    // ===== 工单流转 =====
    #[serde(default)]
    pub workflow_template_id: Option<String>,

    #[serde(default)]
    pub workflow_template: Option<WorkflowTemplateOverride>,

    #[serde(default)]
    pub closure_trigger: ClosureTrigger,

    // ===== 口径 =====
    #[serde(default)]
    pub aging_policy: AgingPolicy,

    #[serde(default)]
    pub resolver: ResolverSettings,
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Default::default()
        }
    }

    /// 从 JSON 快照加载
    pub fn from_json_snapshot(snapshot_json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(snapshot_json)
    }

    /// 导出 JSON 快照（用于结果审计）
    pub fn to_json_snapshot(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 从扁平 key-value 配置构建快照
    ///
    /// 格式错误的值记录告警后回落到默认值，不中断加载。
    pub fn from_kv(client_id: &str, kv: &HashMap<String, String>) -> Self {
        let mut config = Self::new(client_id);

        config.defaults = ParameterValues {
            ideal_cycle_time_hours: parse_f64(kv, config_keys::DEFAULT_CYCLE_TIME_HOURS),
            opportunities_per_unit: parse_f64(kv, config_keys::DEFAULT_OPPORTUNITIES_PER_UNIT),
            employee_count: parse_f64(kv, config_keys::DEFAULT_EMPLOYEE_COUNT),
            shift_hours: parse_f64(kv, config_keys::DEFAULT_SHIFT_HOURS),
        };

        config.workflow_template_id = kv
            .get(config_keys::WORKFLOW_TEMPLATE_ID)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        config.workflow_template = parse_json(kv, config_keys::WORKFLOW_TEMPLATE);

        if let Some(raw) = kv.get(config_keys::CLOSURE_TRIGGER) {
            config.closure_trigger = match raw.trim().to_uppercase().as_str() {
                "AT_SHIPMENT" => ClosureTrigger::AtShipment,
                "AT_COMPLETION" => ClosureTrigger::AtCompletion,
                "AT_CLIENT_RECEIPT" => ClosureTrigger::AtClientReceipt,
                "MANUAL" => ClosureTrigger::Manual,
                _ => {
                    tracing::warn!(
                        config_key = config_keys::CLOSURE_TRIGGER,
                        raw_value = %raw,
                        "关闭触发方式配置无法识别，使用默认 AT_SHIPMENT"
                    );
                    ClosureTrigger::AtShipment
                }
            };
        }

        config.aging_policy.include_open_holds = kv
            .get(config_keys::AGING_INCLUDE_OPEN_HOLDS)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        if let Some(ms) = kv
            .get(config_keys::HISTORY_TIMEOUT_MS)
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.resolver.history_timeout_ms = ms;
        }
        if let Some(days) = kv
            .get(config_keys::HISTORY_WINDOW_DAYS)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|d| *d > 0)
        {
            config.resolver.history_window_days = days;
        }

        config.style_overrides =
            parse_json(kv, config_keys::STYLE_OVERRIDES).unwrap_or_default();
        config.line_standards = parse_json(kv, config_keys::LINE_STANDARDS).unwrap_or_default();

        config
    }

    /// 生效的关闭触发方式（模板覆写优先）
    pub fn effective_closure_trigger(&self) -> ClosureTrigger {
        self.workflow_template
            .as_ref()
            .and_then(|t| t.closure_trigger)
            .unwrap_or(self.closure_trigger)
    }
}

fn parse_f64(kv: &HashMap<String, String>, key: &str) -> Option<f64> {
    let raw = kv.get(key)?;
    match raw.trim().parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(config_key = key, raw_value = %raw, "数值配置格式错误，忽略该项");
            None
        }
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(
    kv: &HashMap<String, String>,
    key: &str,
) -> Option<T> {
    let raw = kv.get(key)?;
    match serde_json::from_str(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(config_key = key, raw_value = %raw, error = %e, "JSON 配置格式错误，忽略该项");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_snapshot_uses_defaults() {
        let config = ClientConfig::from_json_snapshot(
            r#"{"client_id":"ACME","defaults":{"ideal_cycle_time_hours":0.5}}"#,
        )
        .unwrap();
        assert_eq!(config.client_id, "ACME");
        assert_eq!(config.defaults.ideal_cycle_time_hours, Some(0.5));
        assert_eq!(config.defaults.opportunities_per_unit, None);
        assert_eq!(config.closure_trigger, ClosureTrigger::AtShipment);
        assert_eq!(config.resolver.history_window_days, 30);
        assert!(!config.aging_policy.include_open_holds);
    }

    #[test]
    fn test_from_kv() {
        let mut kv = HashMap::new();
        kv.insert("default_cycle_time_hours".to_string(), "0.4".to_string());
        kv.insert("default_shift_hours".to_string(), "abc".to_string());
        kv.insert("closure_trigger".to_string(), "at_completion".to_string());
        kv.insert("aging_include_open_holds".to_string(), "true".to_string());
        kv.insert(
            "style_overrides".to_string(),
            r#"{"STYLE-A":{"ideal_cycle_time_hours":0.1}}"#.to_string(),
        );

        let config = ClientConfig::from_kv("ACME", &kv);
        assert_eq!(config.defaults.ideal_cycle_time_hours, Some(0.4));
        assert_eq!(config.defaults.shift_hours, None);
        assert_eq!(config.closure_trigger, ClosureTrigger::AtCompletion);
        assert!(config.aging_policy.include_open_holds);
        assert_eq!(
            config.style_overrides["STYLE-A"].get(InferableParameter::IdealCycleTime),
            Some(0.1)
        );
    }

    #[test]
    fn test_template_closure_trigger_takes_precedence() {
        let mut config = ClientConfig::new("ACME");
        config.closure_trigger = ClosureTrigger::AtShipment;
        config.workflow_template = Some(WorkflowTemplateOverride {
            template_id: "T1".to_string(),
            closure_trigger: Some(ClosureTrigger::Manual),
            ..Default::default()
        });
        assert_eq!(config.effective_closure_trigger(), ClosureTrigger::Manual);
    }
}
