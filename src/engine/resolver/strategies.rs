// ==========================================
// 车间绩效系统 - 参数推断策略
// ==========================================
// 职责: 每个策略只回答"能否从本来源给出取值"
// 红线: 策略不抛错; 查询失败/超时视为未命中
// ==========================================

use super::history::{HistoricalDataSource, HistoryQuery};
use super::ResolutionContext;
use crate::config::defaults::SystemDefaults;
use crate::domain::types::{InferableParameter, ResolutionSource};
use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;

// ==========================================
// ResolutionStrategy Trait
// ==========================================
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    /// 本策略对应的来源层级
    fn source(&self) -> ResolutionSource;

    /// 尝试给出参数取值，None 表示未命中
    async fn try_resolve(
        &self,
        parameter: InferableParameter,
        ctx: &ResolutionContext<'_>,
    ) -> Option<f64>;
}

// ==========================================
// 记录值
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RecordValueStrategy;

#[async_trait]
impl ResolutionStrategy for RecordValueStrategy {
    fn source(&self) -> ResolutionSource {
        ResolutionSource::RecordValue
    }

    async fn try_resolve(
        &self,
        _parameter: InferableParameter,
        ctx: &ResolutionContext<'_>,
    ) -> Option<f64> {
        ctx.record_value
    }
}

// ==========================================
// 款式覆写
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct StyleOverrideStrategy;

#[async_trait]
impl ResolutionStrategy for StyleOverrideStrategy {
    fn source(&self) -> ResolutionSource {
        ResolutionSource::StyleOverride
    }

    async fn try_resolve(
        &self,
        parameter: InferableParameter,
        ctx: &ResolutionContext<'_>,
    ) -> Option<f64> {
        let style = ctx.product_style?;
        ctx.config.style_overrides.get(style)?.get(parameter)
    }
}

// ==========================================
// 班次/产线标准
// ==========================================
// 班次标准优先于产线标准
#[derive(Debug, Clone, Default)]
pub struct LineStandardStrategy;

#[async_trait]
impl ResolutionStrategy for LineStandardStrategy {
    fn source(&self) -> ResolutionSource {
        ResolutionSource::LineStandard
    }

    async fn try_resolve(
        &self,
        parameter: InferableParameter,
        ctx: &ResolutionContext<'_>,
    ) -> Option<f64> {
        let standards = &ctx.config.line_standards;
        ctx.shift_id
            .and_then(|shift| standards.get(shift))
            .and_then(|v| v.get(parameter))
            .or_else(|| {
                ctx.line_id
                    .and_then(|line| standards.get(line))
                    .and_then(|v| v.get(parameter))
            })
    }
}

// ==========================================
// 客户默认
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ClientDefaultStrategy;

#[async_trait]
impl ResolutionStrategy for ClientDefaultStrategy {
    fn source(&self) -> ResolutionSource {
        ResolutionSource::ClientDefault
    }

    async fn try_resolve(
        &self,
        parameter: InferableParameter,
        ctx: &ResolutionContext<'_>,
    ) -> Option<f64> {
        ctx.config.defaults.get(parameter)
    }
}

// ==========================================
// 历史均值 (唯一 I/O 步骤)
// ==========================================
// 超时由 ClientConfig.resolver.history_timeout_ms 约束;
// 超时时丢弃 future 即取消查询
pub struct HistoricalAverageStrategy {
    source: Arc<dyn HistoricalDataSource>,
}

impl HistoricalAverageStrategy {
    pub fn new(source: Arc<dyn HistoricalDataSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ResolutionStrategy for HistoricalAverageStrategy {
    fn source(&self) -> ResolutionSource {
        ResolutionSource::HistoricalAverage
    }

    async fn try_resolve(
        &self,
        parameter: InferableParameter,
        ctx: &ResolutionContext<'_>,
    ) -> Option<f64> {
        let settings = ctx.config.resolver;
        let query = HistoryQuery {
            client_id: ctx.config.client_id.clone(),
            parameter,
            line_id: ctx.line_id.map(str::to_string),
            product_style: ctx.product_style.map(str::to_string),
            window_start: ctx.as_of - Duration::days(settings.history_window_days),
            window_end: ctx.as_of,
        };

        match tokio::time::timeout(
            settings.history_timeout(),
            self.source.trailing_average(&query),
        )
        .await
        {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                tracing::warn!(
                    parameter = %parameter,
                    error = %e,
                    "历史均值查询失败，视为未命中"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    parameter = %parameter,
                    timeout_ms = settings.history_timeout_ms,
                    "历史均值查询超时，视为未命中"
                );
                None
            }
        }
    }
}

// ==========================================
// 系统默认 (推断链末端)
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct SystemDefaultStrategy {
    defaults: SystemDefaults,
}

impl SystemDefaultStrategy {
    pub fn new(defaults: SystemDefaults) -> Self {
        Self { defaults }
    }
}

#[async_trait]
impl ResolutionStrategy for SystemDefaultStrategy {
    fn source(&self) -> ResolutionSource {
        ResolutionSource::SystemDefault
    }

    async fn try_resolve(
        &self,
        parameter: InferableParameter,
        _ctx: &ResolutionContext<'_>,
    ) -> Option<f64> {
        self.defaults.get(parameter)
    }
}
