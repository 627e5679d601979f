// ==========================================
// 车间绩效系统 - 参数推断器 (Config Resolver)
// ==========================================
// 职责: 按参数固定顺序的策略链推断缺失输入
// 规则: 顺序求值,首个命中即返回,命中后不再求值后续策略
// 红线: 推断链末端系统默认值必须存在,否则为致命配置缺陷
// ==========================================

pub mod history;
pub mod strategies;

use crate::config::client_config::ClientConfig;
use crate::config::defaults::SystemDefaults;
use crate::domain::calculation::InputResolution;
use crate::domain::types::{InferableParameter, ResolutionSource};
use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDate;
use history::{HistoricalDataSource, NoHistory};
use std::collections::HashMap;
use std::sync::Arc;
use strategies::{
    ClientDefaultStrategy, HistoricalAverageStrategy, LineStandardStrategy, RecordValueStrategy,
    ResolutionStrategy, StyleOverrideStrategy, SystemDefaultStrategy,
};
use tracing::instrument;

// ==========================================
// ResolutionContext - 推断上下文
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    pub config: &'a ClientConfig,
    pub record_value: Option<f64>, // 记录上直接给出的取值
    pub product_style: Option<&'a str>,
    pub line_id: Option<&'a str>,
    pub shift_id: Option<&'a str>,
    pub as_of: NaiveDate, // 历史窗口截止日
}

impl<'a> ResolutionContext<'a> {
    pub fn new(config: &'a ClientConfig, as_of: NaiveDate) -> Self {
        Self {
            config,
            record_value: None,
            product_style: None,
            line_id: None,
            shift_id: None,
            as_of,
        }
    }

    pub fn with_record_value(mut self, value: Option<f64>) -> Self {
        self.record_value = value;
        self
    }

    pub fn with_style(mut self, style: Option<&'a str>) -> Self {
        self.product_style = style;
        self
    }

    pub fn with_line(mut self, line_id: Option<&'a str>) -> Self {
        self.line_id = line_id;
        self
    }

    pub fn with_shift(mut self, shift_id: Option<&'a str>) -> Self {
        self.shift_id = shift_id;
        self
    }
}

// ==========================================
// ConfigResolver - 参数推断器
// ==========================================
pub struct ConfigResolver {
    chains: HashMap<InferableParameter, Vec<Arc<dyn ResolutionStrategy>>>,
}

impl ConfigResolver {
    /// 使用标准推断链创建推断器
    ///
    /// 推断链:
    /// - 理想节拍: 记录值 → 款式覆写 → 班次/产线标准 → 客户默认 → 30天历史均值 → 系统默认
    /// - 缺陷机会数: 记录值 → 款式覆写 → 客户默认 → 系统默认
    /// - 在岗人数: 记录值 → 班次/产线标准 → 客户默认 → 历史均值 → 系统默认
    /// - 班次工时: 记录值 → 班次/产线标准 → 客户默认 → 历史均值 → 系统默认
    pub fn new(system_defaults: SystemDefaults, history: Arc<dyn HistoricalDataSource>) -> Self {
        let record: Arc<dyn ResolutionStrategy> = Arc::new(RecordValueStrategy);
        let style: Arc<dyn ResolutionStrategy> = Arc::new(StyleOverrideStrategy);
        let line: Arc<dyn ResolutionStrategy> = Arc::new(LineStandardStrategy);
        let client: Arc<dyn ResolutionStrategy> = Arc::new(ClientDefaultStrategy);
        let historical: Arc<dyn ResolutionStrategy> =
            Arc::new(HistoricalAverageStrategy::new(history));
        let system: Arc<dyn ResolutionStrategy> =
            Arc::new(SystemDefaultStrategy::new(system_defaults));

        let mut chains: HashMap<InferableParameter, Vec<Arc<dyn ResolutionStrategy>>> =
            HashMap::new();
        chains.insert(
            InferableParameter::IdealCycleTime,
            vec![
                record.clone(),
                style.clone(),
                line.clone(),
                client.clone(),
                historical.clone(),
                system.clone(),
            ],
        );
        chains.insert(
            InferableParameter::OpportunitiesPerUnit,
            vec![record.clone(), style, client.clone(), system.clone()],
        );
        chains.insert(
            InferableParameter::EmployeeCount,
            vec![
                record.clone(),
                line.clone(),
                client.clone(),
                historical.clone(),
                system.clone(),
            ],
        );
        chains.insert(
            InferableParameter::ShiftHours,
            vec![record, line, client, historical, system],
        );

        Self { chains }
    }

    /// 不接入历史库的推断器
    pub fn without_history(system_defaults: SystemDefaults) -> Self {
        Self::new(system_defaults, Arc::new(NoHistory))
    }

    /// 替换某参数的推断链
    pub fn with_chain(
        mut self,
        parameter: InferableParameter,
        chain: Vec<Arc<dyn ResolutionStrategy>>,
    ) -> Self {
        self.chains.insert(parameter, chain);
        self
    }

    /// 某参数推断链的来源顺序
    pub fn chain_sources(&self, parameter: InferableParameter) -> Vec<ResolutionSource> {
        self.chains
            .get(&parameter)
            .map(|chain| chain.iter().map(|s| s.source()).collect())
            .unwrap_or_default()
    }

    /// 推断参数取值
    ///
    /// # 返回
    /// - Ok(InputResolution): 取值及命中来源
    /// - Err(ConfigResolutionExhausted): 所有策略（含系统默认）均未命中
    ///
    /// # 说明
    /// 非有限值、负值视为未命中; 推断层级的 0 同样视为未命中,
    /// 记录值为 0 则是权威取值 (如当班无人在岗)
    #[instrument(skip(self, ctx), fields(client_id = %ctx.config.client_id))]
    pub async fn resolve(
        &self,
        parameter: InferableParameter,
        ctx: &ResolutionContext<'_>,
    ) -> EngineResult<InputResolution> {
        let chain = self
            .chains
            .get(&parameter)
            .ok_or(EngineError::ConfigResolutionExhausted { parameter })?;

        for strategy in chain {
            match strategy.try_resolve(parameter, ctx).await {
                Some(value) if accepts(strategy.source(), value) => {
                    tracing::debug!(
                        parameter = %parameter,
                        source = %strategy.source(),
                        value,
                        "参数推断命中"
                    );
                    return Ok(InputResolution::new(parameter, value, strategy.source()));
                }
                Some(value) => {
                    tracing::debug!(
                        parameter = %parameter,
                        source = %strategy.source(),
                        value,
                        "参数取值无效，视为未命中"
                    );
                }
                None => {}
            }
        }

        tracing::error!(parameter = %parameter, "参数推断链耗尽: 系统默认值缺失");
        Err(EngineError::ConfigResolutionExhausted { parameter })
    }
}

/// 取值是否可作为命中
fn accepts(source: ResolutionSource, value: f64) -> bool {
    match source {
        ResolutionSource::RecordValue => value.is_finite() && value >= 0.0,
        _ => value.is_finite() && value > 0.0,
    }
}
