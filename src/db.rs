// ==========================================
// 车间绩效系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供工单流转与历史均值所需的最小表结构
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS work_order (
    work_order_id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL,
    status TEXT NOT NULL,
    previous_status TEXT,
    revision INTEGER NOT NULL DEFAULT 0,
    received_date TEXT NOT NULL,
    planned_start_date TEXT,
    actual_start_date TEXT,
    planned_ship_date TEXT,
    required_date TEXT,
    actual_ship_date TEXT,
    completed_at TEXT,
    last_transition_at TEXT,
    planned_quantity INTEGER NOT NULL DEFAULT 0,
    actual_quantity INTEGER NOT NULL DEFAULT 0,
    shipped_quantity INTEGER NOT NULL DEFAULT 0,
    product_style TEXT,
    line_id TEXT,
    qc_approved INTEGER NOT NULL DEFAULT 0,
    client_receipt_confirmed INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS hold_record (
    hold_id TEXT PRIMARY KEY,
    work_order_id TEXT NOT NULL REFERENCES work_order(work_order_id),
    reason TEXT NOT NULL,
    detail TEXT,
    start_time TEXT NOT NULL,
    end_time TEXT,
    placed_by TEXT NOT NULL,
    resumed_by TEXT,
    CHECK (end_time IS NULL OR end_time >= start_time)
);
CREATE INDEX IF NOT EXISTS idx_hold_record_wo ON hold_record(work_order_id);

CREATE TABLE IF NOT EXISTS workflow_transition_log (
    entry_id TEXT PRIMARY KEY,
    work_order_id TEXT NOT NULL REFERENCES work_order(work_order_id),
    from_status TEXT NOT NULL,
    to_status TEXT NOT NULL,
    actor TEXT NOT NULL,
    transitioned_at TEXT NOT NULL,
    hours_since_received REAL NOT NULL,
    hours_since_previous REAL,
    trigger_source TEXT NOT NULL,
    notes TEXT
);
CREATE INDEX IF NOT EXISTS idx_transition_log_wo ON workflow_transition_log(work_order_id, transitioned_at);

CREATE TABLE IF NOT EXISTS production_history (
    record_id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL,
    production_date TEXT NOT NULL,
    line_id TEXT,
    product_style TEXT,
    units_produced INTEGER,
    run_time_hours REAL,
    employees_assigned INTEGER,
    scheduled_hours REAL
);
CREATE INDEX IF NOT EXISTS idx_production_history_client_date
    ON production_history(client_id, production_date);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库（测试 / 一次性计算）
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）并写入 schema_version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    if read_schema_version(conn)?.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;
    }
    Ok(())
}

/// 读取 schema_version（若表不存在或为空则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
