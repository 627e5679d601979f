// ==========================================
// 工单流转持久化集成测试
// ==========================================
// 职责: WorkflowService + WorkOrderRepository (SQLite) 端到端验证
// ==========================================


#[cfg(test)]
mod workflow_persistence_test {
    use crate::test_helpers::*;
    use shopfloor_kpi::engine::workflow::TransitionRequest;
    use shopfloor_kpi::{
        EngineError, HoldReason, TriggerSource, WorkOrderRepository, WorkOrderStatus,
        WorkflowService, WorkflowStateMachine,
    };
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    use WorkOrderStatus::*;

    fn setup() -> (
        NamedTempFile,
        Arc<WorkOrderRepository>,
        WorkflowService<WorkOrderRepository>,
    ) {
        shopfloor_kpi::logging::init_test();
        let (temp_file, conn) = create_test_db().unwrap();
        let repo = Arc::new(WorkOrderRepository::new(conn));
        let service = WorkflowService::new(repo.clone(), WorkflowStateMachine::default());
        (temp_file, repo, service)
    }

    // ==========================================
    // 完整生命周期 + 审计日志 + 时间线
    // ==========================================
    #[tokio::test]
    async fn test_lifecycle_with_hold_is_audited() {
        let (_tmp, repo, service) = setup();
        repo.insert(
            &WorkOrderBuilder::new("WO-1", date(2025, 12, 1))
                .actual_quantity(100)
                .qc_approved(true)
                .build(),
        )
        .unwrap();

        let steps = [
            (Released, datetime(2025, 12, 1, 8)),
            (InProgress, datetime(2025, 12, 2, 8)),
        ];
        for (target, at) in steps {
            service
                .transition("WO-1", None, &TransitionRequest::new(target, "planner", at))
                .await
                .unwrap();
        }

        service
            .place_on_hold(
                "WO-1",
                Some(2),
                HoldReason::QualityIssue,
                Some("fabric defect".to_string()),
                "supervisor",
                datetime(2025, 12, 3, 8),
            )
            .await
            .unwrap();
        let resumed = service
            .resume("WO-1", Some(3), "supervisor", datetime(2025, 12, 4, 8))
            .await
            .unwrap();
        assert_eq!(resumed.work_order.status, InProgress);
        assert_eq!(resumed.work_order.previous_status, None);

        for (target, at) in [
            (Completed, datetime(2025, 12, 5, 8)),
            (Shipped, datetime(2025, 12, 6, 8)),
        ] {
            service
                .transition("WO-1", None, &TransitionRequest::new(target, "planner", at))
                .await
                .unwrap();
        }

        // 发运即关闭
        let closed = service
            .close_if_due("WO-1", "system", datetime(2025, 12, 6, 9))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed.work_order.status, Closed);
        assert_eq!(closed.log_entry.trigger_source, TriggerSource::Automatic);

        let stored = repo.find_by_id("WO-1").unwrap().unwrap();
        assert_eq!(stored.status, Closed);
        assert_eq!(stored.revision, 7);
        assert_eq!(stored.actual_start_date, Some(date(2025, 12, 2)));
        assert_eq!(stored.actual_ship_date, Some(date(2025, 12, 6)));

        let log = repo.find_transition_log("WO-1").unwrap();
        assert_eq!(log.len(), 7);
        assert_eq!(log[0].from_status, Received);
        assert_eq!(log[0].hours_since_previous, None);
        assert!((log[1].hours_since_received - 32.0).abs() < 1e-9);
        assert_eq!(log[1].hours_since_previous, Some(24.0));

        let holds = repo.find_holds("WO-1").unwrap();
        assert_eq!(holds.len(), 1);
        assert_eq!(holds[0].reason, HoldReason::QualityIssue);
        assert!(!holds[0].is_open());

        let timeline = service
            .timeline("WO-1", datetime(2025, 12, 7, 0))
            .await
            .unwrap();
        assert_eq!(timeline.current_status(), Some(Closed));
        assert!((timeline.hours_by_status[&OnHold] - 24.0).abs() < 1e-9);
    }

    // ==========================================
    // 质检未放行不得发运
    // ==========================================
    #[tokio::test]
    async fn test_shipping_without_qc_approval_is_rejected() {
        let (_tmp, repo, service) = setup();
        repo.insert(
            &WorkOrderBuilder::new("WO-1", date(2025, 12, 1))
                .status(Completed)
                .actual_quantity(100)
                .qc_approved(false)
                .build(),
        )
        .unwrap();

        let err = service
            .transition(
                "WO-1",
                None,
                &TransitionRequest::new(Shipped, "planner", datetime(2025, 12, 6, 8)),
            )
            .await
            .unwrap_err();

        match err {
            EngineError::BusinessRuleViolation {
                condition,
                allowed_transitions,
                ..
            } => {
                assert_eq!(condition, "QC approval required");
                assert_eq!(allowed_transitions, vec![OnHold, Cancelled]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // 未提交任何变更
        let stored = repo.find_by_id("WO-1").unwrap().unwrap();
        assert_eq!(stored.status, Completed);
        assert_eq!(stored.revision, 0);
        assert!(repo.find_transition_log("WO-1").unwrap().is_empty());
    }

    // ==========================================
    // 终态工单不可流转
    // ==========================================
    #[tokio::test]
    async fn test_closed_order_rejects_every_transition() {
        let (_tmp, repo, service) = setup();
        repo.insert(
            &WorkOrderBuilder::new("WO-1", date(2025, 12, 1))
                .status(Closed)
                .build(),
        )
        .unwrap();

        assert!(service.allowed_transitions("WO-1").await.unwrap().is_empty());
        for target in [Released, InProgress, OnHold, Cancelled, Shipped] {
            let err = service
                .transition(
                    "WO-1",
                    None,
                    &TransitionRequest::new(target, "planner", datetime(2025, 12, 6, 8)),
                )
                .await
                .unwrap_err();
            assert!(
                matches!(err, EngineError::InvalidTransition { from: Closed, .. }),
                "target {target:?} gave {err:?}"
            );
        }
    }

    // ==========================================
    // 过期 revision → 冲突
    // ==========================================
    #[tokio::test]
    async fn test_stale_revision_is_conflict() {
        let (_tmp, repo, service) = setup();
        repo.insert(&WorkOrderBuilder::new("WO-1", date(2025, 12, 1)).build())
            .unwrap();

        service
            .transition(
                "WO-1",
                Some(0),
                &TransitionRequest::new(Released, "a", datetime(2025, 12, 1, 8)),
            )
            .await
            .unwrap();
        let err = service
            .transition(
                "WO-1",
                Some(0),
                &TransitionRequest::new(Cancelled, "b", datetime(2025, 12, 1, 9)),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Conflict {
                expected: 0,
                actual: 1,
                ..
            }
        ));
        assert_eq!(repo.find_by_id("WO-1").unwrap().unwrap().status, Released);
    }

    // ==========================================
    // 批量流转逐单独立
    // ==========================================
    #[tokio::test]
    async fn test_bulk_transition_reports_per_order() {
        let (_tmp, repo, service) = setup();
        repo.insert(&WorkOrderBuilder::new("WO-1", date(2025, 12, 1)).build())
            .unwrap();
        repo.insert(
            &WorkOrderBuilder::new("WO-2", date(2025, 12, 1))
                .status(Released)
                .build(),
        )
        .unwrap();

        let ids = vec!["WO-1".to_string(), "WO-2".to_string(), "WO-404".to_string()];
        let report = service
            .bulk_transition(
                &ids,
                &TransitionRequest::new(Released, "planner", datetime(2025, 12, 2, 8)),
            )
            .await;

        assert_eq!(report.succeeded().count(), 1);
        let failed: Vec<_> = report.failed().map(|(id, _)| id.to_string()).collect();
        assert_eq!(failed, vec!["WO-2".to_string(), "WO-404".to_string()]);

        let log = repo.find_transition_log("WO-1").unwrap();
        assert_eq!(log[0].trigger_source, TriggerSource::Bulk);
    }
}
