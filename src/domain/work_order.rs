// ==========================================
// 车间绩效系统 - 工单领域模型
// ==========================================
// 职责: 工单、暂停记录、流转审计日志
// 红线: 工单状态只能经由工单状态机修改; 工单不删除(外部软停用)
// 红线: 流转审计日志只追加,不修改、不删除
// ==========================================

use crate::domain::types::{HoldReason, TriggerSource, WorkOrderStatus};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// WorkOrder - 工单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    // ===== 主键 =====
    pub work_order_id: String,
    pub client_id: String,

    // ===== 状态 =====
    pub status: WorkOrderStatus,
    pub previous_status: Option<WorkOrderStatus>, // 仅暂停期间有值
    pub revision: i32,                            // 乐观锁版本号

    // ===== 日期 =====
    pub received_date: NaiveDate,
    pub planned_start_date: Option<NaiveDate>,
    pub actual_start_date: Option<NaiveDate>,
    pub planned_ship_date: Option<NaiveDate>,
    pub required_date: Option<NaiveDate>,
    pub actual_ship_date: Option<NaiveDate>,
    pub completed_at: Option<NaiveDateTime>,       // 完工时刻 (冻结在制账龄)
    pub last_transition_at: Option<NaiveDateTime>, // 最近一次流转时刻

    // ===== 数量 =====
    pub planned_quantity: i64,
    pub actual_quantity: i64,
    pub shipped_quantity: i64,

    // ===== 业务标记 =====
    pub product_style: Option<String>,
    pub line_id: Option<String>,
    pub qc_approved: bool,
    pub client_receipt_confirmed: bool,
}

impl WorkOrder {
    /// 创建新接收的工单
    pub fn new(
        work_order_id: impl Into<String>,
        client_id: impl Into<String>,
        received_date: NaiveDate,
        planned_quantity: i64,
    ) -> Self {
        Self {
            work_order_id: work_order_id.into(),
            client_id: client_id.into(),
            status: WorkOrderStatus::Received,
            previous_status: None,
            revision: 0,
            received_date,
            planned_start_date: None,
            actual_start_date: None,
            planned_ship_date: None,
            required_date: None,
            actual_ship_date: None,
            completed_at: None,
            last_transition_at: None,
            planned_quantity,
            actual_quantity: 0,
            shipped_quantity: 0,
            product_style: None,
            line_id: None,
            qc_approved: false,
            client_receipt_confirmed: false,
        }
    }

    /// 接收时刻 (接收日 00:00)
    pub fn received_at(&self) -> NaiveDateTime {
        self.received_date.and_hms_opt(0, 0, 0).unwrap_or_default()
    }
}

// ==========================================
// HoldRecord - 暂停记录
// ==========================================
// 约束: end_time 一旦设置必须 ≥ start_time
// 约束: 同一工单的多条暂停记录互不重叠
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldRecord {
    pub hold_id: String,
    pub work_order_id: String,
    pub reason: HoldReason,
    pub detail: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub placed_by: String,
    pub resumed_by: Option<String>,
}

impl HoldRecord {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

// ==========================================
// WorkflowTransitionLogEntry - 流转审计日志
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTransitionLogEntry {
    pub entry_id: String,
    pub work_order_id: String,
    pub from_status: WorkOrderStatus,
    pub to_status: WorkOrderStatus,
    pub actor: String,
    pub transitioned_at: NaiveDateTime,
    pub hours_since_received: f64,
    pub hours_since_previous: Option<f64>, // 首次流转为 None
    pub trigger_source: TriggerSource,
    pub notes: Option<String>,
}
