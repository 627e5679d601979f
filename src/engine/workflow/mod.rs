// ==========================================
// 车间绩效系统 - 工单流转
// ==========================================
// 职责: 流转模板 / 状态机 / 原子流转服务 / 时间线
// ==========================================

pub mod service;
pub mod state_machine;
pub mod template;
pub mod timeline;

pub use service::{
    BulkTransitionItem, BulkTransitionReport, InMemoryWorkOrderStore, WorkOrderStore,
    WorkflowService,
};
pub use state_machine::{
    TransitionOutcome, TransitionRequest, TransitionValidation, WorkflowStateMachine,
};
pub use template::{WorkflowTemplate, DEFAULT_TEMPLATE_ID};
pub use timeline::{transition_timeline, TimelineSegment, TransitionTimeline};
