// ==========================================
// 车间绩效系统 - 引擎层
// ==========================================
// 职责: 参数推断 / 指标计算 / 在制账龄 / 工单流转
// 红线: Engine 不拼 SQL; 存储经由 WorkOrderStore / HistoricalDataSource 接口
// ==========================================

pub mod aging;
pub mod error;
pub mod kpi;
pub mod orchestrator;
pub mod resolver;
pub mod workflow;

// 重导出核心引擎
pub use aging::{AgingAggregator, AgingAnchor, AgingResult};
pub use error::{EngineError, EngineResult};
pub use orchestrator::{KpiBatch, KpiOrchestrator, KpiReport, MetricFailure};
pub use resolver::history::{HistoricalDataSource, HistoryQuery, NoHistory};
pub use resolver::{ConfigResolver, ResolutionContext};
pub use workflow::{
    transition_timeline, BulkTransitionReport, InMemoryWorkOrderStore, TransitionOutcome,
    TransitionRequest, TransitionTimeline, TransitionValidation, WorkOrderStore,
    WorkflowService, WorkflowStateMachine, WorkflowTemplate,
};
