// ==========================================
// 车间绩效系统 - 工单流转模板
// ==========================================
// 职责: 默认流转表 + 客户覆写合并 + 加载期校验
// 红线: 默认表为不可变值,合并时按值复制,不原地修改
// 校验:
// 1) 终态集合非空
// 2) 每个非终态至少一条出边 (只计流转表)
// 3) 覆写引用的状态必须属于模板状态集
// 4) 可选状态必须属于状态集且非终态
// ==========================================

use crate::config::client_config::ClientConfig;
use crate::config::workflow_profile::WorkflowTemplateOverride;
use crate::domain::types::{ClosureTrigger, WorkOrderStatus};
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_TEMPLATE_ID: &str = "DEFAULT";

// ==========================================
// WorkflowTemplate - 生效的流转模板
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub template_id: String,
    statuses: BTreeSet<WorkOrderStatus>,
    /// 目标状态 → 允许的来源状态
    transitions: BTreeMap<WorkOrderStatus, BTreeSet<WorkOrderStatus>>,
    optional_statuses: BTreeSet<WorkOrderStatus>,
    closure_trigger: ClosureTrigger,
}

impl Default for WorkflowTemplate {
    fn default() -> Self {
        Self::standard()
    }
}

impl WorkflowTemplate {
    /// 默认流转表
    pub fn standard() -> Self {
        use WorkOrderStatus::*;

        let table: [(WorkOrderStatus, &[WorkOrderStatus]); 9] = [
            (Released, &[Received]),
            (InProgress, &[Released]),
            (Completed, &[InProgress]),
            (Shipped, &[Completed]),
            (Closed, &[Shipped, Completed]),
            (OnHold, &[Received, Released, InProgress]),
            (Demoted, &[Released]),
            (Cancelled, &[Received, Released, InProgress, OnHold, Demoted]),
            (Rejected, &[InProgress, Completed]),
        ];

        Self {
            template_id: DEFAULT_TEMPLATE_ID.to_string(),
            statuses: WorkOrderStatus::ALL.iter().copied().collect(),
            transitions: table
                .iter()
                .map(|(target, sources)| (*target, sources.iter().copied().collect()))
                .collect(),
            optional_statuses: BTreeSet::new(),
            closure_trigger: ClosureTrigger::default(),
        }
    }

    /// 按客户配置构建模板（含校验）
    pub fn from_client_config(config: &ClientConfig) -> EngineResult<Self> {
        let template = match &config.workflow_template {
            Some(template_override) => Self::standard().merged(template_override)?,
            None => {
                let mut template = Self::standard();
                if let Some(id) = &config.workflow_template_id {
                    template.template_id = id.clone();
                }
                template
            }
        };
        Ok(template.with_closure_trigger(config.effective_closure_trigger()))
    }

    /// 合并客户覆写，返回新模板
    pub fn merged(&self, template_override: &WorkflowTemplateOverride) -> EngineResult<Self> {
        let template_id = if template_override.template_id.trim().is_empty() {
            self.template_id.clone()
        } else {
            template_override.template_id.clone()
        };
        let invalid = |message: String| EngineError::TemplateInvalid {
            template_id: template_id.clone(),
            message,
        };

        let statuses: BTreeSet<WorkOrderStatus> = match &template_override.statuses {
            Some(list) => list.iter().copied().collect(),
            None => self.statuses.clone(),
        };

        for (target, sources) in &template_override.transitions {
            if !statuses.contains(target) {
                return Err(invalid(format!("transition target {} is not in status set", target)));
            }
            if let Some(unknown) = sources.iter().find(|s| !statuses.contains(s)) {
                return Err(invalid(format!(
                    "transition source {} (target {}) is not in status set",
                    unknown, target
                )));
            }
        }

        // 默认表按状态集裁剪后逐目标覆写
        let mut transitions: BTreeMap<WorkOrderStatus, BTreeSet<WorkOrderStatus>> =
            if template_override.replace_table {
                BTreeMap::new()
            } else {
                self.transitions
                    .iter()
                    .filter(|(target, _)| statuses.contains(target))
                    .map(|(target, sources)| {
                        let kept = sources.iter().copied().filter(|s| statuses.contains(s)).collect();
                        (*target, kept)
                    })
                    .collect()
            };
        for (target, sources) in &template_override.transitions {
            transitions.insert(*target, sources.iter().copied().collect());
        }

        let merged = Self {
            template_id,
            statuses,
            transitions,
            optional_statuses: template_override.optional_statuses.iter().copied().collect(),
            closure_trigger: template_override
                .closure_trigger
                .unwrap_or(self.closure_trigger),
        };
        merged.validate()?;
        Ok(merged)
    }

    pub fn with_closure_trigger(mut self, closure_trigger: ClosureTrigger) -> Self {
        self.closure_trigger = closure_trigger;
        self
    }

    /// 加载期校验
    pub fn validate(&self) -> EngineResult<()> {
        let invalid = |message: String| {
            tracing::warn!(template_id = %self.template_id, %message, "工单模板校验失败");
            EngineError::TemplateInvalid {
                template_id: self.template_id.clone(),
                message,
            }
        };

        if !self.statuses.iter().any(|s| s.is_terminal()) {
            return Err(invalid("terminal status set is empty".to_string()));
        }

        for status in &self.optional_statuses {
            if !self.statuses.contains(status) {
                return Err(invalid(format!("optional status {} is not in status set", status)));
            }
            if status.is_terminal() {
                return Err(invalid(format!("terminal status {} cannot be optional", status)));
            }
        }

        for status in self.statuses.iter().filter(|s| !s.is_terminal()) {
            if self.direct_targets(*status).is_empty() {
                return Err(invalid(format!("non-terminal status {} has no outgoing transition", status)));
            }
        }

        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn contains(&self, status: WorkOrderStatus) -> bool {
        self.statuses.contains(&status)
    }

    pub fn statuses(&self) -> impl Iterator<Item = WorkOrderStatus> + '_ {
        self.statuses.iter().copied()
    }

    pub fn is_optional(&self, status: WorkOrderStatus) -> bool {
        self.optional_statuses.contains(&status)
    }

    pub fn closure_trigger(&self) -> ClosureTrigger {
        self.closure_trigger
    }

    /// 流转表中的直接边
    pub fn has_direct_edge(&self, from: WorkOrderStatus, to: WorkOrderStatus) -> bool {
        self.transitions
            .get(&to)
            .map(|sources| sources.contains(&from))
            .unwrap_or(false)
    }

    /// 流转表可达 (直接边,或经过一个可选状态跳过)
    pub fn table_allows(&self, from: WorkOrderStatus, to: WorkOrderStatus) -> bool {
        if !self.contains(from) || !self.contains(to) {
            return false;
        }
        if self.has_direct_edge(from, to) {
            return true;
        }
        self.optional_statuses
            .iter()
            .filter(|s| **s != from && **s != to)
            .any(|skipped| self.has_direct_edge(from, *skipped) && self.has_direct_edge(*skipped, to))
    }

    fn direct_targets(&self, from: WorkOrderStatus) -> Vec<WorkOrderStatus> {
        self.transitions
            .iter()
            .filter(|(target, sources)| self.statuses.contains(target) && sources.contains(&from))
            .map(|(target, _)| *target)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use WorkOrderStatus::*;

    #[test]
    fn test_standard_template_is_valid() {
        let template = WorkflowTemplate::standard();
        assert!(template.validate().is_ok());
        assert!(template.has_direct_edge(Received, Released));
        assert!(template.has_direct_edge(Completed, Closed));
        assert!(!template.has_direct_edge(Received, Completed));
    }

    #[test]
    fn test_merge_does_not_mutate_default() {
        let base = WorkflowTemplate::standard();
        let mut transitions = BTreeMap::new();
        transitions.insert(Completed, vec![InProgress, Released]);
        let merged = base
            .merged(&WorkflowTemplateOverride {
                template_id: "FAST".to_string(),
                transitions,
                ..Default::default()
            })
            .unwrap();

        assert!(merged.has_direct_edge(Released, Completed));
        assert!(!base.has_direct_edge(Released, Completed));
        assert_eq!(base, WorkflowTemplate::standard());
    }

    #[test]
    fn test_reject_template_without_terminal_status() {
        let err = WorkflowTemplate::standard()
            .merged(&WorkflowTemplateOverride {
                template_id: "BAD".to_string(),
                statuses: Some(vec![Received, Released, InProgress]),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::TemplateInvalid { .. }));
    }

    #[test]
    fn test_reject_dead_end_status() {
        // 替换整表后 IN_PROGRESS 无出边
        let mut transitions = BTreeMap::new();
        transitions.insert(Released, vec![Received]);
        transitions.insert(InProgress, vec![Released]);
        transitions.insert(Closed, vec![Released]);
        let err = WorkflowTemplate::standard()
            .merged(&WorkflowTemplateOverride {
                template_id: "DEAD_END".to_string(),
                statuses: Some(vec![Received, Released, InProgress, Closed]),
                transitions,
                replace_table: true,
                ..Default::default()
            })
            .unwrap_err();
        match err {
            EngineError::TemplateInvalid { message, .. } => assert!(message.contains("IN_PROGRESS")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_reject_unknown_status_reference() {
        let mut transitions = BTreeMap::new();
        transitions.insert(Closed, vec![Demoted]);
        let err = WorkflowTemplate::standard()
            .merged(&WorkflowTemplateOverride {
                template_id: "X".to_string(),
                statuses: Some(vec![Received, Released, InProgress, Completed, Closed]),
                transitions,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::TemplateInvalid { .. }));
    }

    #[test]
    fn test_reduced_status_set_drops_default_edges() {
        let merged = WorkflowTemplate::standard()
            .merged(&WorkflowTemplateOverride {
                template_id: "LEAN".to_string(),
                statuses: Some(vec![
                    Received, Released, InProgress, Completed, Closed, OnHold, Cancelled,
                ]),
                ..Default::default()
            })
            .unwrap();
        assert!(!merged.contains(Shipped));
        assert!(merged.table_allows(Completed, Closed));
        assert!(!merged.table_allows(Completed, Shipped));
    }

    #[test]
    fn test_optional_status_allows_skip() {
        let merged = WorkflowTemplate::standard()
            .merged(&WorkflowTemplateOverride {
                template_id: "SKIP_RELEASE".to_string(),
                optional_statuses: vec![Released],
                ..Default::default()
            })
            .unwrap();
        assert!(merged.table_allows(Received, InProgress));
        assert!(!WorkflowTemplate::standard().table_allows(Received, InProgress));
    }

    #[test]
    fn test_from_client_config_uses_closure_trigger() {
        let mut config = ClientConfig::new("ACME");
        config.closure_trigger = ClosureTrigger::AtClientReceipt;
        let template = WorkflowTemplate::from_client_config(&config).unwrap();
        assert_eq!(template.closure_trigger(), ClosureTrigger::AtClientReceipt);
        assert_eq!(template.template_id, DEFAULT_TEMPLATE_ID);
    }
}
