// ==========================================
// 车间绩效系统 - 工单仓储
// ==========================================
// 职责: 工单 / 暂停记录 / 流转审计日志的 SQLite 读写
// 并发: 乐观锁 (revision 字段),提交时 WHERE revision = expected
// 红线: Repository 不含业务规则; 审计日志只追加
// ==========================================

use crate::domain::types::{HoldReason, TriggerSource, WorkOrderStatus};
use crate::domain::work_order::{HoldRecord, WorkOrder, WorkflowTransitionLogEntry};
use crate::engine::workflow::{TransitionOutcome, WorkOrderStore};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Arc, Mutex};

const WORK_ORDER_COLUMNS: &str = r#"work_order_id, client_id, status, previous_status, revision,
    received_date, planned_start_date, actual_start_date, planned_ship_date, required_date,
    actual_ship_date, completed_at, last_transition_at,
    planned_quantity, actual_quantity, shipped_quantity,
    product_style, line_id, qc_approved, client_receipt_confirmed"#;

// ==========================================
// WorkOrderRepository - 工单仓储
// ==========================================
pub struct WorkOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkOrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建工单
    pub fn insert(&self, work_order: &WorkOrder) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO work_order ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
                WORK_ORDER_COLUMNS
            ),
            params![
                &work_order.work_order_id,
                &work_order.client_id,
                work_order.status.to_db_str(),
                work_order.previous_status.map(|s| s.to_db_str()),
                work_order.revision,
                work_order.received_date,
                work_order.planned_start_date,
                work_order.actual_start_date,
                work_order.planned_ship_date,
                work_order.required_date,
                work_order.actual_ship_date,
                work_order.completed_at,
                work_order.last_transition_at,
                work_order.planned_quantity,
                work_order.actual_quantity,
                work_order.shipped_quantity,
                &work_order.product_style,
                &work_order.line_id,
                work_order.qc_approved,
                work_order.client_receipt_confirmed,
            ],
        )?;
        Ok(())
    }

    /// 按 work_order_id 查询
    pub fn find_by_id(&self, work_order_id: &str) -> RepositoryResult<Option<WorkOrder>> {
        let conn = self.get_conn()?;
        Self::find_by_id_with(&conn, work_order_id)
    }

    /// 查询客户在制工单
    pub fn find_wip_by_client(&self, client_id: &str) -> RepositoryResult<Vec<WorkOrder>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM work_order WHERE client_id = ? AND status IN ('RELEASED', 'IN_PROGRESS', 'ON_HOLD', 'DEMOTED') ORDER BY work_order_id",
            WORK_ORDER_COLUMNS
        ))?;
        let orders = stmt
            .query_map(params![client_id], map_work_order)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    /// 查询工单暂停记录（按开始时间排序）
    pub fn find_holds(&self, work_order_id: &str) -> RepositoryResult<Vec<HoldRecord>> {
        let conn = self.get_conn()?;
        Self::find_holds_with(&conn, work_order_id)
    }

    /// 查询工单审计日志（按流转时间排序）
    pub fn find_transition_log(&self, work_order_id: &str) -> RepositoryResult<Vec<WorkflowTransitionLogEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT entry_id, work_order_id, from_status, to_status, actor, transitioned_at,
                      hours_since_received, hours_since_previous, trigger_source, notes
               FROM workflow_transition_log
               WHERE work_order_id = ?
               ORDER BY transitioned_at, rowid"#,
        )?;
        let entries = stmt
            .query_map(params![work_order_id], |row| {
                let trigger_source: String = row.get(8)?;
                Ok(WorkflowTransitionLogEntry {
                    entry_id: row.get(0)?,
                    work_order_id: row.get(1)?,
                    from_status: parse_status(row, 2)?,
                    to_status: parse_status(row, 3)?,
                    actor: row.get(4)?,
                    transitioned_at: row.get(5)?,
                    hours_since_received: row.get(6)?,
                    hours_since_previous: row.get(7)?,
                    trigger_source: TriggerSource::from_str(&trigger_source),
                    notes: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// 提交一次流转（事务）
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision 不匹配（其他调用方已流转）
    /// - `RepositoryError::NotFound`: work_order_id 不存在
    pub fn commit_transition(&self, outcome: &TransitionOutcome, expected_revision: i32) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let wo = &outcome.work_order;
        let rows_affected = tx.execute(
            r#"UPDATE work_order
               SET status = ?, previous_status = ?, revision = ?,
                   actual_start_date = ?, actual_ship_date = ?, completed_at = ?,
                   last_transition_at = ?
               WHERE work_order_id = ? AND revision = ?"#,
            params![
                wo.status.to_db_str(),
                wo.previous_status.map(|s| s.to_db_str()),
                wo.revision,
                wo.actual_start_date,
                wo.actual_ship_date,
                wo.completed_at,
                wo.last_transition_at,
                &wo.work_order_id,
                expected_revision,
            ],
        )?;

        if rows_affected == 0 {
            // 判断是记录不存在还是 revision 冲突
            let actual: Option<i32> = tx
                .query_row(
                    "SELECT revision FROM work_order WHERE work_order_id = ?",
                    params![&wo.work_order_id],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match actual {
                Some(actual) => RepositoryError::OptimisticLockFailure {
                    work_order_id: wo.work_order_id.clone(),
                    expected: expected_revision,
                    actual,
                },
                None => RepositoryError::NotFound {
                    entity: "WorkOrder".to_string(),
                    id: wo.work_order_id.clone(),
                },
            });
        }

        if let Some(closed) = &outcome.closed_hold {
            tx.execute(
                "UPDATE hold_record SET end_time = ?, resumed_by = ? WHERE hold_id = ?",
                params![closed.end_time, &closed.resumed_by, &closed.hold_id],
            )?;
        }
        if let Some(opened) = &outcome.opened_hold {
            Self::insert_hold_tx(&tx, opened)?;
        }
        Self::insert_log_tx(&tx, &outcome.log_entry)?;

        tx.commit()?;
        Ok(())
    }

    fn insert_hold_tx(tx: &Transaction, hold: &HoldRecord) -> RepositoryResult<()> {
        tx.execute(
            r#"INSERT INTO hold_record (
                hold_id, work_order_id, reason, detail, start_time, end_time, placed_by, resumed_by
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &hold.hold_id,
                &hold.work_order_id,
                hold.reason.as_str(),
                &hold.detail,
                hold.start_time,
                hold.end_time,
                &hold.placed_by,
                &hold.resumed_by,
            ],
        )?;
        Ok(())
    }

    fn insert_log_tx(tx: &Transaction, entry: &WorkflowTransitionLogEntry) -> RepositoryResult<()> {
        tx.execute(
            r#"INSERT INTO workflow_transition_log (
                entry_id, work_order_id, from_status, to_status, actor, transitioned_at,
                hours_since_received, hours_since_previous, trigger_source, notes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &entry.entry_id,
                &entry.work_order_id,
                entry.from_status.to_db_str(),
                entry.to_status.to_db_str(),
                &entry.actor,
                entry.transitioned_at,
                entry.hours_since_received,
                entry.hours_since_previous,
                entry.trigger_source.as_str(),
                &entry.notes,
            ],
        )?;
        Ok(())
    }

    fn find_by_id_with(conn: &Connection, work_order_id: &str) -> RepositoryResult<Option<WorkOrder>> {
        match conn.query_row(
            &format!("SELECT {} FROM work_order WHERE work_order_id = ?", WORK_ORDER_COLUMNS),
            params![work_order_id],
            map_work_order,
        ) {
            Ok(wo) => Ok(Some(wo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn find_holds_with(conn: &Connection, work_order_id: &str) -> RepositoryResult<Vec<HoldRecord>> {
        let mut stmt = conn.prepare(
            r#"SELECT hold_id, work_order_id, reason, detail, start_time, end_time, placed_by, resumed_by
               FROM hold_record
               WHERE work_order_id = ?
               ORDER BY start_time"#,
        )?;
        let holds = stmt
            .query_map(params![work_order_id], |row| {
                let reason: String = row.get(2)?;
                Ok(HoldRecord {
                    hold_id: row.get(0)?,
                    work_order_id: row.get(1)?,
                    reason: HoldReason::from_str(&reason),
                    detail: row.get(3)?,
                    start_time: row.get(4)?,
                    end_time: row.get(5)?,
                    placed_by: row.get(6)?,
                    resumed_by: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(holds)
    }
}

#[async_trait]
impl WorkOrderStore for WorkOrderRepository {
    async fn load(&self, work_order_id: &str) -> RepositoryResult<(WorkOrder, Vec<HoldRecord>)> {
        let conn = self.get_conn()?;
        let work_order = Self::find_by_id_with(&conn, work_order_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "WorkOrder".to_string(),
                id: work_order_id.to_string(),
            }
        })?;
        let holds = Self::find_holds_with(&conn, work_order_id)?;
        Ok((work_order, holds))
    }

    async fn commit(&self, outcome: &TransitionOutcome, expected_revision: i32) -> RepositoryResult<()> {
        self.commit_transition(outcome, expected_revision)
    }

    async fn transition_log(&self, work_order_id: &str) -> RepositoryResult<Vec<WorkflowTransitionLogEntry>> {
        self.find_transition_log(work_order_id)
    }
}

/// 映射数据库行到 WorkOrder
fn map_work_order(row: &rusqlite::Row) -> rusqlite::Result<WorkOrder> {
    let previous_status: Option<String> = row.get(3)?;
    Ok(WorkOrder {
        work_order_id: row.get(0)?,
        client_id: row.get(1)?,
        status: parse_status(row, 2)?,
        previous_status: previous_status
            .map(|s| s.parse::<WorkOrderStatus>())
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?,
        revision: row.get(4)?,
        received_date: row.get(5)?,
        planned_start_date: row.get(6)?,
        actual_start_date: row.get(7)?,
        planned_ship_date: row.get(8)?,
        required_date: row.get(9)?,
        actual_ship_date: row.get(10)?,
        completed_at: row.get(11)?,
        last_transition_at: row.get(12)?,
        planned_quantity: row.get(13)?,
        actual_quantity: row.get(14)?,
        shipped_quantity: row.get(15)?,
        product_style: row.get(16)?,
        line_id: row.get(17)?,
        qc_approved: row.get(18)?,
        client_receipt_confirmed: row.get(19)?,
    })
}

fn parse_status(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<WorkOrderStatus> {
    let raw: String = row.get(idx)?;
    raw.parse::<WorkOrderStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}
