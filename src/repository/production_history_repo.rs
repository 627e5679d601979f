// ==========================================
// 车间绩效系统 - 生产历史仓储
// ==========================================
// 职责: 生产历史写入 + 回看窗口均值查询 (HistoricalDataSource)
// 窗口: production_date ∈ [window_start, window_end)
// 取消: 调用方超时后中断执行中的查询
// ==========================================

use crate::domain::records::ProductionRecord;
use crate::domain::types::InferableParameter;
use crate::engine::resolver::history::{HistoricalDataSource, HistoryQuery};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, InterruptHandle};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tracing::debug;

// ==========================================
// ProductionHistoryRepository - 生产历史仓储
// ==========================================
pub struct ProductionHistoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionHistoryRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入一条生产记录（同 record_id 覆盖）
    pub fn insert(&self, client_id: &str, record: &ProductionRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT OR REPLACE INTO production_history (
                record_id, client_id, production_date, line_id, product_style,
                units_produced, run_time_hours, employees_assigned, scheduled_hours
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &record.record_id,
                client_id,
                record.production_date,
                &record.line_id,
                &record.product_style,
                record.units_produced,
                record.run_time_hours,
                record.employees_assigned,
                record.scheduled_hours,
            ],
        )?;
        Ok(())
    }

    /// 批量写入（单事务）
    pub fn insert_batch(&self, client_id: &str, records: &[ProductionRecord]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"INSERT OR REPLACE INTO production_history (
                    record_id, client_id, production_date, line_id, product_style,
                    units_produced, run_time_hours, employees_assigned, scheduled_hours
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )?;
            for record in records {
                stmt.execute(params![
                    &record.record_id,
                    client_id,
                    record.production_date,
                    &record.line_id,
                    &record.product_style,
                    record.units_produced,
                    record.run_time_hours,
                    record.employees_assigned,
                    record.scheduled_hours,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// 同步查询窗口均值
    ///
    /// - IdealCycleTime: Σ运行工时 / Σ产量 (产量 > 0)
    /// - EmployeeCount: 在岗人数均值
    /// - ShiftHours: 计划工时均值
    /// - OpportunitiesPerUnit: 生产历史不记录,返回 None
    pub fn average(&self, query: &HistoryQuery) -> RepositoryResult<Option<f64>> {
        let conn = self.get_conn()?;
        query_average(&conn, query)
    }
}

fn query_average(conn: &Connection, query: &HistoryQuery) -> RepositoryResult<Option<f64>> {
    let aggregate = match query.parameter {
        InferableParameter::IdealCycleTime => {
            "SUM(run_time_hours) / SUM(units_produced) FROM production_history \
             WHERE units_produced > 0 AND run_time_hours IS NOT NULL AND"
        }
        InferableParameter::EmployeeCount => {
            "AVG(employees_assigned) FROM production_history WHERE employees_assigned IS NOT NULL AND"
        }
        InferableParameter::ShiftHours => {
            "AVG(scheduled_hours) FROM production_history WHERE scheduled_hours IS NOT NULL AND"
        }
        InferableParameter::OpportunitiesPerUnit => return Ok(None),
    };

    let sql = format!(
        "SELECT {} client_id = ?1 AND production_date >= ?2 AND production_date < ?3 \
         AND (?4 IS NULL OR line_id = ?4) AND (?5 IS NULL OR product_style = ?5)",
        aggregate
    );
    let value: Option<f64> = conn.query_row(
        &sql,
        params![
            &query.client_id,
            query.window_start,
            query.window_end,
            &query.line_id,
            &query.product_style,
        ],
        |row| row.get(0),
    )?;

    // 0 或非正值不作为有效均值
    Ok(value.filter(|v| v.is_finite() && *v > 0.0))
}

// ==========================================
// 可取消的阻塞查询
// ==========================================
// 调用方放弃等待 (如超时) 时:
// - 尚未开始的查询直接跳过
// - 正在执行的查询经 InterruptHandle 中断,释放连接
// ==========================================

#[derive(Default)]
struct CancelState {
    cancelled: bool,
    running: Option<InterruptHandle>,
}

/// 随 future 一起析构,未完成时取消查询
struct CancelOnDrop {
    state: Arc<Mutex<CancelState>>,
    armed: bool,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            state.cancelled = true;
            if let Some(handle) = &state.running {
                handle.interrupt();
            }
        }
    }
}

/// 在阻塞线程池上执行查询,future 被丢弃时中断查询
async fn run_cancellable<T, F>(conn: Arc<Mutex<Connection>>, work: F) -> RepositoryResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> RepositoryResult<T> + Send + 'static,
{
    let state = Arc::new(Mutex::new(CancelState::default()));
    let mut guard = CancelOnDrop {
        state: Arc::clone(&state),
        armed: true,
    };

    let task = tokio::task::spawn_blocking(move || -> RepositoryResult<T> {
        let conn = conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        {
            let mut state = state
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            if state.cancelled {
                return Err(RepositoryError::InternalError("query cancelled".to_string()));
            }
            state.running = Some(conn.get_interrupt_handle());
        }

        let outcome = work(&conn);

        // 释放连接前注销,避免中断后续无关查询
        if let Ok(mut state) = state.lock() {
            state.running = None;
        }
        outcome
    });

    let outcome = task
        .await
        .map_err(|e| RepositoryError::InternalError(e.to_string()));
    guard.armed = false;
    outcome?
}

#[async_trait]
impl HistoricalDataSource for ProductionHistoryRepository {
    async fn trailing_average(
        &self,
        query: &HistoryQuery,
    ) -> Result<Option<f64>, Box<dyn Error + Send + Sync>> {
        let owned = query.clone();
        let value = run_cancellable(Arc::clone(&self.conn), move |conn| {
            query_average(conn, &owned)
        })
        .await?;

        debug!(
            parameter = %query.parameter,
            client_id = %query.client_id,
            found = value.is_some(),
            "历史均值查询完成"
        );
        Ok(value)
    }
}
