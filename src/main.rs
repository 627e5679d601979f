// ==========================================
// 车间绩效系统 - 命令行入口
// ==========================================
// 用法:
//   shopfloor-kpi <batch.json> [history.db]
//
// batch.json: { "config": ClientConfig, "batch": KpiBatch }
// history.db: 可选,提供生产历史时启用 30 天均值推断
// 输出: KpiReport (JSON, stdout)
// ==========================================

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use shopfloor_kpi::db::{ensure_schema, open_sqlite_connection};
use shopfloor_kpi::engine::{HistoricalDataSource, NoHistory};
use shopfloor_kpi::{
    logging, ClientConfig, ConfigResolver, KpiBatch, KpiOrchestrator, ProductionHistoryRepository,
    SystemDefaults,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Deserialize)]
struct BatchFile {
    config: ClientConfig,
    batch: KpiBatch,
    #[serde(default)]
    system_defaults: Option<SystemDefaults>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let Some(input_path) = args.next() else {
        bail!("用法: shopfloor-kpi <batch.json> [history.db]");
    };

    let raw = std::fs::read_to_string(&input_path)
        .with_context(|| format!("读取输入文件失败: {}", input_path))?;
    let input: BatchFile =
        serde_json::from_str(&raw).with_context(|| format!("解析输入文件失败: {}", input_path))?;

    let history: Arc<dyn HistoricalDataSource> = match args.next() {
        Some(db_path) => {
            let conn = open_sqlite_connection(&db_path)
                .with_context(|| format!("打开历史库失败: {}", db_path))?;
            ensure_schema(&conn)?;
            tracing::info!(db_path = %db_path, "启用历史均值推断");
            Arc::new(ProductionHistoryRepository::new(Arc::new(Mutex::new(conn))))
        }
        None => Arc::new(NoHistory),
    };

    tracing::info!(
        version = shopfloor_kpi::VERSION,
        client_id = %input.config.client_id,
        "{} 开始计算",
        shopfloor_kpi::APP_NAME
    );

    let defaults = input.system_defaults.unwrap_or_default();
    let orchestrator = KpiOrchestrator::new(ConfigResolver::new(defaults, history));
    let report = orchestrator.calculate(&input.config, &input.batch).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
