// ==========================================
// 车间绩效系统 - 工单状态机
// ==========================================
// 职责: 流转校验 / 流转执行 / 暂停与恢复 / 审计日志
// 规则:
// 1) 终态 (CLOSED/CANCELLED/REJECTED) 不接受任何流转
// 2) ON_HOLD / CANCELLED 对任意非终态普遍可达 (目标须在模板状态集内)
// 3) 从 ON_HOLD 出来只能回到暂停时记录的 previous_status,或取消
// 4) 业务闸门: COMPLETED 需实际数量 > 0; SHIPPED 需 QC 审批;
//    客户签收关闭模式下 CLOSED 需客户签收确认
// 红线: 状态机只返回新值,不做持久化; 持久化由调用方按 revision 提交
// ==========================================

use super::template::WorkflowTemplate;
use crate::domain::types::{ClosureTrigger, HoldReason, TriggerSource, WorkOrderStatus};
use crate::domain::work_order::{HoldRecord, WorkOrder, WorkflowTransitionLogEntry};
use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

const UNIVERSAL_TARGETS: [WorkOrderStatus; 2] = [WorkOrderStatus::OnHold, WorkOrderStatus::Cancelled];

// ==========================================
// 校验结果 / 流转请求 / 流转产出
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionValidation {
    pub valid: bool,
    pub reason: Option<String>,
    pub allowed_transitions: Vec<WorkOrderStatus>,
}

#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub target: WorkOrderStatus,
    pub actor: String,
    pub notes: Option<String>,
    pub trigger_source: TriggerSource,
    pub at: NaiveDateTime,
}

impl TransitionRequest {
    pub fn new(target: WorkOrderStatus, actor: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            target,
            actor: actor.into(),
            notes: None,
            trigger_source: TriggerSource::Manual,
            at,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_trigger_source(mut self, trigger_source: TriggerSource) -> Self {
        self.trigger_source = trigger_source;
        self
    }
}

/// 一次成功流转的全部写入内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub work_order: WorkOrder,
    pub log_entry: WorkflowTransitionLogEntry,
    pub opened_hold: Option<HoldRecord>,
    pub closed_hold: Option<HoldRecord>,
}

// ==========================================
// WorkflowStateMachine - 工单状态机
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct WorkflowStateMachine {
    template: WorkflowTemplate,
}

impl WorkflowStateMachine {
    /// 模板须已通过加载期校验
    pub fn new(template: WorkflowTemplate) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &WorkflowTemplate {
        &self.template
    }

    /// 流转预检（无副作用）
    pub fn validate_transition(
        &self,
        work_order: &WorkOrder,
        target: WorkOrderStatus,
    ) -> TransitionValidation {
        match self.check(work_order, target) {
            Ok(()) => TransitionValidation {
                valid: true,
                reason: None,
                allowed_transitions: self.allowed_transitions(work_order),
            },
            Err(err) => {
                let reason = match &err {
                    EngineError::InvalidTransition { reason, .. } => reason.clone(),
                    EngineError::BusinessRuleViolation { condition, .. } => condition.clone(),
                    other => other.to_string(),
                };
                TransitionValidation {
                    valid: false,
                    reason: Some(reason),
                    allowed_transitions: err
                        .allowed_transitions()
                        .map(|a| a.to_vec())
                        .unwrap_or_default(),
                }
            }
        }
    }

    /// 当前可执行的流转目标（已通过流转表与业务闸门）
    pub fn allowed_transitions(&self, work_order: &WorkOrder) -> Vec<WorkOrderStatus> {
        self.template
            .statuses()
            .filter(|target| self.check(work_order, *target).is_ok())
            .collect()
    }

    /// 执行流转
    #[instrument(skip(self, work_order, hold_records, request), fields(
        work_order_id = %work_order.work_order_id,
        from = %work_order.status,
        to = %request.target
    ))]
    pub fn apply_transition(
        &self,
        work_order: &WorkOrder,
        hold_records: &[HoldRecord],
        request: &TransitionRequest,
    ) -> EngineResult<TransitionOutcome> {
        self.check(work_order, request.target)?;
        let hold = (request.target == WorkOrderStatus::OnHold)
            .then(|| (HoldReason::Other, request.notes.clone()));
        self.commit_transition(work_order, hold_records, request, hold)
    }

    /// 暂停: 记录 previous_status,开启暂停记录,转入 ON_HOLD
    pub fn place_on_hold(
        &self,
        work_order: &WorkOrder,
        hold_records: &[HoldRecord],
        reason: HoldReason,
        detail: Option<String>,
        approver: &str,
        at: NaiveDateTime,
    ) -> EngineResult<TransitionOutcome> {
        let request = TransitionRequest {
            target: WorkOrderStatus::OnHold,
            actor: approver.to_string(),
            notes: detail.clone(),
            trigger_source: TriggerSource::Manual,
            at,
        };
        self.check(work_order, request.target)?;
        self.commit_transition(work_order, hold_records, &request, Some((reason, detail)))
    }

    /// 恢复: 关闭暂停记录,回到 previous_status
    pub fn resume(
        &self,
        work_order: &WorkOrder,
        hold_records: &[HoldRecord],
        approver: &str,
        at: NaiveDateTime,
    ) -> EngineResult<TransitionOutcome> {
        if work_order.status != WorkOrderStatus::OnHold {
            return Err(EngineError::InvalidTransition {
                from: work_order.status,
                to: work_order.previous_status.unwrap_or(work_order.status),
                reason: "work order is not on hold".to_string(),
                allowed_transitions: self.allowed_transitions(work_order),
            });
        }
        let previous = work_order.previous_status.ok_or_else(|| {
            EngineError::validation("previous_status", "on-hold work order has no previous status")
        })?;

        let request = TransitionRequest::new(previous, approver, at);
        self.check(work_order, previous)?;
        self.commit_transition(work_order, hold_records, &request, None)
    }

    /// 按关闭触发方式判断是否应自动关闭
    pub fn closure_due(&self, work_order: &WorkOrder) -> bool {
        let triggered = match self.template.closure_trigger() {
            ClosureTrigger::AtShipment => work_order.status == WorkOrderStatus::Shipped,
            ClosureTrigger::AtCompletion => work_order.status == WorkOrderStatus::Completed,
            ClosureTrigger::AtClientReceipt => {
                work_order.status == WorkOrderStatus::Shipped && work_order.client_receipt_confirmed
            }
            ClosureTrigger::Manual => false,
        };
        triggered && self.check(work_order, WorkOrderStatus::Closed).is_ok()
    }

    // ==========================================
    // 内部: 校验
    // ==========================================

    fn check(&self, work_order: &WorkOrder, target: WorkOrderStatus) -> EngineResult<()> {
        let from = work_order.status;
        let invalid = |reason: &str| EngineError::InvalidTransition {
            from,
            to: target,
            reason: reason.to_string(),
            allowed_transitions: self.table_targets(work_order),
        };

        if from.is_terminal() {
            return Err(EngineError::InvalidTransition {
                from,
                to: target,
                reason: format!("{} is a terminal status", from),
                allowed_transitions: vec![],
            });
        }
        if !self.template.contains(from) {
            return Err(invalid("current status is not part of the active template"));
        }
        if !self.template.contains(target) {
            return Err(invalid("target status is not part of the active template"));
        }
        if from == target {
            return Err(invalid("work order is already in the target status"));
        }

        if from == WorkOrderStatus::OnHold {
            if target == WorkOrderStatus::Cancelled {
                return Ok(());
            }
            return match work_order.previous_status {
                // 恢复是透明暂停,不重新校验业务闸门
                Some(previous) if previous == target => Ok(()),
                _ => Err(invalid("resume must return to the status recorded when the hold began")),
            };
        }

        if !UNIVERSAL_TARGETS.contains(&target) && !self.template.table_allows(from, target) {
            return Err(invalid("transition not allowed by the active transition table"));
        }

        if let Some(condition) = self.unmet_gate(work_order, target) {
            return Err(EngineError::BusinessRuleViolation {
                target,
                condition: condition.to_string(),
                allowed_transitions: self.universal_targets(from),
            });
        }

        Ok(())
    }

    fn unmet_gate(&self, work_order: &WorkOrder, target: WorkOrderStatus) -> Option<&'static str> {
        match target {
            WorkOrderStatus::Completed if work_order.actual_quantity <= 0 => {
                Some("actual quantity must be greater than zero")
            }
            WorkOrderStatus::Shipped if !work_order.qc_approved => Some("QC approval required"),
            WorkOrderStatus::Closed
                if self.template.closure_trigger() == ClosureTrigger::AtClientReceipt
                    && !work_order.client_receipt_confirmed =>
            {
                Some("client receipt confirmation required")
            }
            _ => None,
        }
    }

    fn universal_targets(&self, from: WorkOrderStatus) -> Vec<WorkOrderStatus> {
        UNIVERSAL_TARGETS
            .iter()
            .copied()
            .filter(|t| *t != from && self.template.contains(*t))
            .collect()
    }

    /// 流转表层面可达的目标（不含业务闸门）
    fn table_targets(&self, work_order: &WorkOrder) -> Vec<WorkOrderStatus> {
        let from = work_order.status;
        if from.is_terminal() {
            return vec![];
        }
        self.template
            .statuses()
            .filter(|target| *target != from)
            .filter(|target| {
                if from == WorkOrderStatus::OnHold {
                    *target == WorkOrderStatus::Cancelled
                        || Some(*target) == work_order.previous_status
                } else {
                    UNIVERSAL_TARGETS.contains(target) || self.template.table_allows(from, *target)
                }
            })
            .collect()
    }

    // ==========================================
    // 内部: 写入
    // ==========================================

    fn commit_transition(
        &self,
        work_order: &WorkOrder,
        hold_records: &[HoldRecord],
        request: &TransitionRequest,
        hold: Option<(HoldReason, Option<String>)>,
    ) -> EngineResult<TransitionOutcome> {
        let from = work_order.status;
        let to = request.target;
        let at = request.at;

        if let Some(last) = work_order.last_transition_at {
            if at < last {
                return Err(EngineError::validation(
                    "at",
                    format!("transition time {} precedes previous transition {}", at, last),
                ));
            }
        }

        let mut next = work_order.clone();
        next.status = to;
        next.revision = work_order.revision + 1;
        next.last_transition_at = Some(at);

        // ===== 暂停进入 =====
        let opened_hold = match hold {
            Some((reason, detail)) => {
                if hold_records
                    .iter()
                    .any(|h| h.work_order_id == work_order.work_order_id && h.is_open())
                {
                    return Err(EngineError::validation(
                        "hold_records",
                        format!("work order {} already has an open hold", work_order.work_order_id),
                    ));
                }
                next.previous_status = Some(from);
                Some(HoldRecord {
                    hold_id: Uuid::new_v4().to_string(),
                    work_order_id: work_order.work_order_id.clone(),
                    reason,
                    detail,
                    start_time: at,
                    end_time: None,
                    placed_by: request.actor.clone(),
                    resumed_by: None,
                })
            }
            None => None,
        };

        // ===== 暂停结束 (恢复或取消) =====
        let closed_hold = if from == WorkOrderStatus::OnHold {
            next.previous_status = None;
            hold_records
                .iter()
                .find(|h| h.work_order_id == work_order.work_order_id && h.is_open())
                .map(|open| {
                    let mut closed = open.clone();
                    closed.end_time = Some(at.max(open.start_time));
                    closed.resumed_by = Some(request.actor.clone());
                    closed
                })
        } else {
            None
        };

        // ===== 状态副作用 =====
        match to {
            WorkOrderStatus::InProgress => {
                next.actual_start_date.get_or_insert(at.date());
            }
            WorkOrderStatus::Completed => {
                next.completed_at = Some(at);
            }
            WorkOrderStatus::Shipped => {
                next.actual_ship_date.get_or_insert(at.date());
            }
            _ => {}
        }

        let log_entry = WorkflowTransitionLogEntry {
            entry_id: Uuid::new_v4().to_string(),
            work_order_id: work_order.work_order_id.clone(),
            from_status: from,
            to_status: to,
            actor: request.actor.clone(),
            transitioned_at: at,
            hours_since_received: hours_between(work_order.received_at(), at),
            hours_since_previous: work_order.last_transition_at.map(|last| hours_between(last, at)),
            trigger_source: request.trigger_source,
            notes: request.notes.clone(),
        };

        tracing::info!(
            work_order_id = %work_order.work_order_id,
            from = %from,
            to = %to,
            actor = %request.actor,
            revision = next.revision,
            "工单状态流转完成"
        );

        Ok(TransitionOutcome {
            work_order: next,
            log_entry,
            opened_hold,
            closed_hold,
        })
    }
}

fn hours_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    (end - start).num_seconds() as f64 / 3600.0
}
