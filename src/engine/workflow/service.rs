// ==========================================
// 车间绩效系统 - 工单流转服务
// ==========================================
// 职责: 读取 → 校验 → 按 revision 提交 的原子流转单元
// 规则:
// 1) 调用方持有的 revision 与存储不一致 → Conflict,调用方重新读取后重试
// 2) 提交时存储再次校验 revision,并发写入同样得到 Conflict
// 3) 批量流转逐单独立处理,单个失败不影响其他工单
// 红线: 不做静默重试,不自动纠正
// ==========================================

use super::state_machine::{TransitionOutcome, TransitionRequest, TransitionValidation, WorkflowStateMachine};
use super::timeline::{transition_timeline, TransitionTimeline};
use crate::domain::types::{HoldReason, TriggerSource, WorkOrderStatus};
use crate::domain::work_order::{HoldRecord, WorkOrder, WorkflowTransitionLogEntry};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::instrument;

// ==========================================
// WorkOrderStore Trait
// ==========================================
// 实现者: InMemoryWorkOrderStore / WorkOrderRepository (rusqlite)
#[async_trait]
pub trait WorkOrderStore: Send + Sync {
    /// 读取工单及其暂停记录
    async fn load(&self, work_order_id: &str) -> RepositoryResult<(WorkOrder, Vec<HoldRecord>)>;

    /// 提交一次流转（工单 + 暂停记录 + 审计日志同一事务）
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: 存储中的 revision 已不是 expected_revision
    async fn commit(&self, outcome: &TransitionOutcome, expected_revision: i32) -> RepositoryResult<()>;

    /// 查询工单审计日志
    async fn transition_log(&self, work_order_id: &str) -> RepositoryResult<Vec<WorkflowTransitionLogEntry>>;
}

// ==========================================
// InMemoryWorkOrderStore - 内存存储
// ==========================================
#[derive(Default)]
struct StoreState {
    orders: HashMap<String, WorkOrder>,
    holds: Vec<HoldRecord>,
    log: Vec<WorkflowTransitionLogEntry>,
}

#[derive(Default)]
pub struct InMemoryWorkOrderStore {
    state: Mutex<StoreState>,
}

impl InMemoryWorkOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, work_order: WorkOrder) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        state
            .orders
            .insert(work_order.work_order_id.clone(), work_order);
        Ok(())
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl WorkOrderStore for InMemoryWorkOrderStore {
    async fn load(&self, work_order_id: &str) -> RepositoryResult<(WorkOrder, Vec<HoldRecord>)> {
        let state = self.lock()?;
        let work_order = state
            .orders
            .get(work_order_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "WorkOrder".to_string(),
                id: work_order_id.to_string(),
            })?;
        let holds = state
            .holds
            .iter()
            .filter(|h| h.work_order_id == work_order_id)
            .cloned()
            .collect();
        Ok((work_order, holds))
    }

    async fn commit(&self, outcome: &TransitionOutcome, expected_revision: i32) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        let id = &outcome.work_order.work_order_id;
        let actual = state
            .orders
            .get(id)
            .map(|wo| wo.revision)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "WorkOrder".to_string(),
                id: id.clone(),
            })?;
        if actual != expected_revision {
            return Err(RepositoryError::OptimisticLockFailure {
                work_order_id: id.clone(),
                expected: expected_revision,
                actual,
            });
        }

        state.orders.insert(id.clone(), outcome.work_order.clone());
        if let Some(closed) = &outcome.closed_hold {
            if let Some(existing) = state.holds.iter_mut().find(|h| h.hold_id == closed.hold_id) {
                *existing = closed.clone();
            }
        }
        if let Some(opened) = &outcome.opened_hold {
            state.holds.push(opened.clone());
        }
        state.log.push(outcome.log_entry.clone());
        Ok(())
    }

    async fn transition_log(&self, work_order_id: &str) -> RepositoryResult<Vec<WorkflowTransitionLogEntry>> {
        let state = self.lock()?;
        Ok(state
            .log
            .iter()
            .filter(|e| e.work_order_id == work_order_id)
            .cloned()
            .collect())
    }
}

// ==========================================
// 批量流转结果
// ==========================================
#[derive(Debug)]
pub struct BulkTransitionItem {
    pub work_order_id: String,
    pub result: EngineResult<WorkOrder>,
}

#[derive(Debug, Default)]
pub struct BulkTransitionReport {
    pub items: Vec<BulkTransitionItem>,
}

impl BulkTransitionReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &WorkOrder> {
        self.items.iter().filter_map(|i| i.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &EngineError)> {
        self.items
            .iter()
            .filter_map(|i| i.result.as_ref().err().map(|e| (i.work_order_id.as_str(), e)))
    }
}

// ==========================================
// WorkflowService - 工单流转服务
// ==========================================
pub struct WorkflowService<S: WorkOrderStore> {
    store: Arc<S>,
    machine: WorkflowStateMachine,
}

impl<S: WorkOrderStore> WorkflowService<S> {
    pub fn new(store: Arc<S>, machine: WorkflowStateMachine) -> Self {
        Self { store, machine }
    }

    pub fn machine(&self) -> &WorkflowStateMachine {
        &self.machine
    }

    pub async fn validate(&self, work_order_id: &str, target: WorkOrderStatus) -> EngineResult<TransitionValidation> {
        let (work_order, _) = self.store.load(work_order_id).await?;
        Ok(self.machine.validate_transition(&work_order, target))
    }

    pub async fn allowed_transitions(&self, work_order_id: &str) -> EngineResult<Vec<WorkOrderStatus>> {
        let (work_order, _) = self.store.load(work_order_id).await?;
        Ok(self.machine.allowed_transitions(&work_order))
    }

    /// 流转工单
    ///
    /// expected_revision 为调用方读取时的版本号; None 表示以当前存储版本为准
    #[instrument(skip(self, request), fields(to = %request.target))]
    pub async fn transition(
        &self,
        work_order_id: &str,
        expected_revision: Option<i32>,
        request: &TransitionRequest,
    ) -> EngineResult<TransitionOutcome> {
        self.run(work_order_id, expected_revision, |wo, holds| {
            self.machine.apply_transition(wo, holds, request)
        })
        .await
    }

    pub async fn place_on_hold(
        &self,
        work_order_id: &str,
        expected_revision: Option<i32>,
        reason: HoldReason,
        detail: Option<String>,
        approver: &str,
        at: NaiveDateTime,
    ) -> EngineResult<TransitionOutcome> {
        self.run(work_order_id, expected_revision, |wo, holds| {
            self.machine
                .place_on_hold(wo, holds, reason, detail.clone(), approver, at)
        })
        .await
    }

    pub async fn resume(
        &self,
        work_order_id: &str,
        expected_revision: Option<i32>,
        approver: &str,
        at: NaiveDateTime,
    ) -> EngineResult<TransitionOutcome> {
        self.run(work_order_id, expected_revision, |wo, holds| {
            self.machine.resume(wo, holds, approver, at)
        })
        .await
    }

    /// 按关闭触发方式自动关闭; 未到关闭条件返回 None
    pub async fn close_if_due(
        &self,
        work_order_id: &str,
        actor: &str,
        at: NaiveDateTime,
    ) -> EngineResult<Option<TransitionOutcome>> {
        let (work_order, _) = self.store.load(work_order_id).await?;
        if !self.machine.closure_due(&work_order) {
            return Ok(None);
        }
        let request = TransitionRequest::new(WorkOrderStatus::Closed, actor, at)
            .with_trigger_source(TriggerSource::Automatic);
        self.transition(work_order_id, Some(work_order.revision), &request)
            .await
            .map(Some)
    }

    /// 批量流转（逐单独立）
    #[instrument(skip(self, work_order_ids, request), fields(count = work_order_ids.len(), to = %request.target))]
    pub async fn bulk_transition(
        &self,
        work_order_ids: &[String],
        request: &TransitionRequest,
    ) -> BulkTransitionReport {
        let request = request.clone().with_trigger_source(TriggerSource::Bulk);
        let results = join_all(work_order_ids.iter().map(|id| {
            let request = &request;
            async move {
                let result = self
                    .transition(id, None, request)
                    .await
                    .map(|outcome| outcome.work_order);
                BulkTransitionItem {
                    work_order_id: id.clone(),
                    result,
                }
            }
        }))
        .await;

        let report = BulkTransitionReport { items: results };
        tracing::info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            "批量流转完成"
        );
        report
    }

    pub async fn timeline(&self, work_order_id: &str, now: NaiveDateTime) -> EngineResult<TransitionTimeline> {
        let log = self.store.transition_log(work_order_id).await?;
        Ok(transition_timeline(&log, work_order_id, now))
    }

    // 读取 → 校验 → 提交
    async fn run<F>(
        &self,
        work_order_id: &str,
        expected_revision: Option<i32>,
        apply: F,
    ) -> EngineResult<TransitionOutcome>
    where
        F: FnOnce(&WorkOrder, &[HoldRecord]) -> EngineResult<TransitionOutcome>,
    {
        let (work_order, holds) = self.store.load(work_order_id).await?;
        if let Some(expected) = expected_revision {
            if expected != work_order.revision {
                return Err(EngineError::Conflict {
                    work_order_id: work_order_id.to_string(),
                    expected,
                    actual: work_order.revision,
                });
            }
        }

        let outcome = apply(&work_order, &holds)?;
        self.store.commit(&outcome, work_order.revision).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use WorkOrderStatus::*;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, day)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn service_with(orders: Vec<WorkOrder>) -> WorkflowService<InMemoryWorkOrderStore> {
        let store = InMemoryWorkOrderStore::new();
        for wo in orders {
            store.insert(wo).unwrap();
        }
        WorkflowService::new(Arc::new(store), WorkflowStateMachine::default())
    }

    fn order(id: &str, status: WorkOrderStatus) -> WorkOrder {
        let mut wo = WorkOrder::new(id, "ACME", NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(), 10);
        wo.status = status;
        wo
    }

    #[tokio::test]
    async fn test_transition_persists_and_logs() {
        let service = service_with(vec![order("WO-1", Received)]);
        let outcome = service
            .transition("WO-1", Some(0), &TransitionRequest::new(Released, "planner", at(2)))
            .await
            .unwrap();
        assert_eq!(outcome.work_order.revision, 1);

        let (stored, _) = service.store.load("WO-1").await.unwrap();
        assert_eq!(stored.status, Released);
        assert_eq!(service.store.transition_log("WO-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_revision_is_conflict() {
        let service = service_with(vec![order("WO-1", Received)]);
        service
            .transition("WO-1", Some(0), &TransitionRequest::new(Released, "a", at(2)))
            .await
            .unwrap();

        // 另一调用方仍持有 revision 0
        let err = service
            .transition("WO-1", Some(0), &TransitionRequest::new(Cancelled, "b", at(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict { expected: 0, actual: 1, .. }));

        let (stored, _) = service.store.load("WO-1").await.unwrap();
        assert_eq!(stored.status, Released);
    }

    #[tokio::test]
    async fn test_hold_resume_round_trip_through_store() {
        let service = service_with(vec![order("WO-1", InProgress)]);
        service
            .place_on_hold("WO-1", None, HoldReason::QualityIssue, Some("burr".into()), "sup", at(3))
            .await
            .unwrap();
        let (held, holds) = service.store.load("WO-1").await.unwrap();
        assert_eq!(held.status, OnHold);
        assert_eq!(holds.len(), 1);
        assert!(holds[0].is_open());

        let resumed = service.resume("WO-1", Some(held.revision), "sup", at(4)).await.unwrap();
        assert_eq!(resumed.work_order.status, InProgress);
        let (_, holds) = service.store.load("WO-1").await.unwrap();
        assert_eq!(holds[0].end_time, Some(at(4)));
    }

    #[tokio::test]
    async fn test_bulk_transition_isolates_failures() {
        let service = service_with(vec![
            order("WO-1", Received),
            order("WO-2", Closed),
            order("WO-3", Received),
        ]);
        let ids = vec![
            "WO-1".to_string(),
            "WO-2".to_string(),
            "WO-MISSING".to_string(),
            "WO-3".to_string(),
        ];
        let report = service
            .bulk_transition(&ids, &TransitionRequest::new(Released, "planner", at(2)))
            .await;

        assert_eq!(report.items.len(), 4);
        assert_eq!(report.succeeded().count(), 2);
        let failed: Vec<_> = report.failed().collect();
        assert!(matches!(failed[0], ("WO-2", EngineError::InvalidTransition { .. })));
        assert!(matches!(failed[1], ("WO-MISSING", EngineError::NotFound { .. })));

        let log = service.store.transition_log("WO-3").await.unwrap();
        assert_eq!(log[0].trigger_source, TriggerSource::Bulk);
    }

    #[tokio::test]
    async fn test_close_if_due() {
        let mut shipped = order("WO-1", Shipped);
        shipped.qc_approved = true;
        let service = service_with(vec![shipped, order("WO-2", InProgress)]);

        let closed = service.close_if_due("WO-1", "system", at(6)).await.unwrap().unwrap();
        assert_eq!(closed.work_order.status, Closed);
        assert_eq!(closed.log_entry.trigger_source, TriggerSource::Automatic);
        assert!(service.close_if_due("WO-2", "system", at(6)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_timeline_from_store() {
        let service = service_with(vec![order("WO-1", Received)]);
        service
            .transition("WO-1", None, &TransitionRequest::new(Released, "p", at(2)))
            .await
            .unwrap();
        let timeline = service.timeline("WO-1", at(3)).await.unwrap();
        assert_eq!(timeline.current_status(), Some(Released));
        assert_eq!(timeline.hours_by_status[&Released], 24.0);
    }
}
