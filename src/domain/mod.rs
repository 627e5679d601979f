// ==========================================
// 车间绩效系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、计算结果
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod calculation;
pub mod records;
pub mod types;
pub mod work_order;

// 重导出核心类型
pub use calculation::{CalculationResult, Confidence, InputResolution};
pub use records::{AttendanceRecord, DowntimeRecord, ProductionRecord, QualityRecord};
pub use types::{
    ClosureTrigger, ConfidenceLevel, HoldReason, InferableParameter, KpiMetric, MetricUnit,
    ResolutionSource, TriggerSource, WorkOrderStatus,
};
pub use work_order::{HoldRecord, WorkOrder, WorkflowTransitionLogEntry};
