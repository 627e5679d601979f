use crate::domain::types::{ClosureTrigger, WorkOrderStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 客户自定义工单流转模板（覆写结构）
///
/// 在模板加载时与默认流转表合并并校验，合并过程不修改默认表。
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WorkflowTemplateOverride {
    /// 模板 ID（用于选择/引用）
    pub template_id: String,

    /// 显示名称
    #[serde(default)]
    pub name: Option<String>,

    /// 状态集合（缺省沿用默认全集，可裁剪）
    #[serde(default)]
    pub statuses: Option<Vec<WorkOrderStatus>>,

    /// 覆写的流转表: 目标状态 → 允许的来源状态
    ///
    /// 仅覆写出现的目标状态，其余目标沿用默认表。
    #[serde(default)]
    pub transitions: BTreeMap<WorkOrderStatus, Vec<WorkOrderStatus>>,

    /// 是否以覆写表完全替换默认表（而非逐目标合并）
    #[serde(default)]
    pub replace_table: bool,

    /// 可跳过的状态
    #[serde(default)]
    pub optional_statuses: Vec<WorkOrderStatus>,

    /// 关闭触发方式
    #[serde(default)]
    pub closure_trigger: Option<ClosureTrigger>,
}
