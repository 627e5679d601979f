// ==========================================
// 车间绩效系统 - 历史数据读取 Trait
// ==========================================
// 职责: 定义历史均值推断所需的只读查询接口（不包含实现）
// 实现者: ProductionHistoryRepository（SQLite）、测试桩
// 红线: 唯一的 I/O 推断步骤,调用方负责超时约束
// ==========================================

use crate::domain::types::InferableParameter;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::error::Error;

/// 历史均值查询
///
/// 窗口为左闭右开区间 [window_start, window_end)
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub client_id: String,
    pub parameter: InferableParameter,
    pub line_id: Option<String>,
    pub product_style: Option<String>,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
}

/// 历史数据源
#[async_trait]
pub trait HistoricalDataSource: Send + Sync {
    /// 查询回看窗口内的参数均值
    ///
    /// # 返回
    /// - Ok(Some(v)): 窗口内有数据
    /// - Ok(None): 窗口内无数据（推断链继续）
    /// - Err: 查询失败（推断链继续）
    async fn trailing_average(
        &self,
        query: &HistoryQuery,
    ) -> Result<Option<f64>, Box<dyn Error + Send + Sync>>;
}

/// 空历史数据源
///
/// 用于不接入历史库的场景（如纯内存计算、单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoHistory;

#[async_trait]
impl HistoricalDataSource for NoHistory {
    async fn trailing_average(
        &self,
        query: &HistoryQuery,
    ) -> Result<Option<f64>, Box<dyn Error + Send + Sync>> {
        tracing::debug!(parameter = %query.parameter, "NoHistory: 跳过历史均值查询");
        Ok(None)
    }
}
