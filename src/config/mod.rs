// ==========================================
// 车间绩效系统 - 配置层
// ==========================================
// 职责: 客户配置快照、工单模板覆写、系统默认值
// 红线: 快照不可变,引擎只读
// ==========================================

pub mod client_config;
pub mod defaults;
pub mod workflow_profile;

// 重导出核心配置类型
pub use client_config::{AgingPolicy, ClientConfig, ParameterValues, ResolverSettings};
pub use defaults::{config_keys, SystemDefaults};
pub use workflow_profile::WorkflowTemplateOverride;
