// ==========================================
// 车间绩效系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + Tokio
// 系统定位: 指标推断计算 + 工单流转状态机
// 红线: 缺失输入逐级推断并标注为估算值,不静默补零
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 配置层 - 客户配置快照与系统默认值
pub mod config;

// 引擎层 - 推断 / 指标 / 账龄 / 流转
pub mod engine;

// 数据仓储层 - 数据访问
pub mod repository;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ClosureTrigger, HoldReason, InferableParameter, KpiMetric, ResolutionSource, TriggerSource,
    WorkOrderStatus,
};

// 领域实体
pub use domain::{
    AttendanceRecord, CalculationResult, Confidence, DowntimeRecord, HoldRecord, InputResolution,
    ProductionRecord, QualityRecord, WorkOrder, WorkflowTransitionLogEntry,
};

// 配置
pub use config::{ClientConfig, SystemDefaults, WorkflowTemplateOverride};

// 引擎
pub use engine::{
    AgingAggregator, ConfigResolver, EngineError, EngineResult, KpiBatch, KpiOrchestrator,
    KpiReport, WorkflowService, WorkflowStateMachine, WorkflowTemplate,
};

// 仓储
pub use repository::{ProductionHistoryRepository, RepositoryError, WorkOrderRepository};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "车间绩效系统";
