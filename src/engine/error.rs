// ==========================================
// 车间绩效系统 - 引擎层错误类型
// ==========================================
// 错误分类:
// - Validation: 不可推断的必需输入缺失或越界
// - InvalidTransition: 目标状态在当前模板下不可达,或当前为终态
// - BusinessRuleViolation: 流转表允许但被业务闸门拦截
// - Conflict: 乐观锁校验失败,调用方须重新读取后重试
// - ConfigResolutionExhausted: 系统默认值缺失,致命配置缺陷
// ==========================================

use crate::domain::types::{InferableParameter, WorkOrderStatus};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("输入校验失败 (field={field}): {message}")]
    Validation { field: String, message: String },

    #[error("无效的状态流转: from={from} to={to} ({reason})")]
    InvalidTransition {
        from: WorkOrderStatus,
        to: WorkOrderStatus,
        reason: String,
        allowed_transitions: Vec<WorkOrderStatus>,
    },

    #[error("业务规则违反: target={target}, {condition}")]
    BusinessRuleViolation {
        target: WorkOrderStatus,
        condition: String,
        allowed_transitions: Vec<WorkOrderStatus>,
    },

    #[error("并发冲突: work_order_id={work_order_id}, expected_revision={expected}, actual_revision={actual}")]
    Conflict {
        work_order_id: String,
        expected: i32,
        actual: i32,
    },

    #[error("参数推断链耗尽 (parameter={parameter}): 系统默认值缺失")]
    ConfigResolutionExhausted { parameter: InferableParameter },

    #[error("工单模板无效 (template_id={template_id}): {message}")]
    TemplateInvalid {
        template_id: String,
        message: String,
    },

    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error(transparent)]
    Repository(RepositoryError),
}

impl EngineError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 调用方可用于恢复的允许流转集合
    pub fn allowed_transitions(&self) -> Option<&[WorkOrderStatus]> {
        match self {
            EngineError::InvalidTransition {
                allowed_transitions,
                ..
            }
            | EngineError::BusinessRuleViolation {
                allowed_transitions,
                ..
            } => Some(allowed_transitions),
            _ => None,
        }
    }

    /// 是否为致命配置缺陷（须中止整批计算）
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::ConfigResolutionExhausted { .. })
    }
}

// 乐观锁冲突 → ConflictError; 记录未找到 → NotFound
impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                work_order_id,
                expected,
                actual,
            } => EngineError::Conflict {
                work_order_id,
                expected,
                actual,
            },
            RepositoryError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Repository(other),
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
