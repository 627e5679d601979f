// ==========================================
// 车间绩效系统 - 指标编排器
// ==========================================
// 用途: 一批记录 + 客户配置快照 → 全部指标结果
// 流程:
// 1) 按记录推断缺失参数 (Config Resolver)
// 2) 逐记录计算后按分母加权汇总 (效率/性能/可用率/DPMO)
// 3) 批量求和计算 (质量率/PPM/FPY/RTY/缺勤率)
// 4) 工单类指标 (在制账龄 / OTD)
// 规则: 单项指标校验失败只记录到 failures,不影响其他指标;
//       ConfigResolutionExhausted 为致命错误,中止整批
// ==========================================

use crate::config::client_config::ClientConfig;
use crate::domain::calculation::{CalculationResult, Confidence, InputResolution};
use crate::domain::records::{
    AttendanceRecord, DowntimeRecord, ProductionRecord, QualityRecord,
};
use crate::domain::types::{InferableParameter, KpiMetric, MetricUnit};
use crate::domain::work_order::{HoldRecord, WorkOrder};
use crate::engine::aging::AgingAggregator;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::kpi::{
    calculate_absenteeism, calculate_availability, calculate_delivery, calculate_dpmo,
    calculate_efficiency, calculate_fpy, calculate_oee, calculate_performance, calculate_ppm,
    calculate_quality_rate, calculate_rty, calculate_wip_aging, safe_ratio, AvailabilityInputs,
    DeliveryInputs, DeliveryResults, DpmoInputs, EfficiencyInputs, FpyInputs, PerformanceInputs, PpmInputs,
    ProcessStepYield, QualityRateInputs, WipAgingReport,
};
use crate::engine::resolver::{ConfigResolver, ResolutionContext};
use chrono::{NaiveDate, NaiveDateTime};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument};

// ==========================================
// KpiBatch - 计算批次
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiBatch {
    pub as_of: NaiveDateTime,
    #[serde(default)]
    pub production: Vec<ProductionRecord>,
    #[serde(default)]
    pub quality: Vec<QualityRecord>,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pub downtime: Vec<DowntimeRecord>,
    #[serde(default)]
    pub work_orders: Vec<WorkOrder>,
    #[serde(default)]
    pub hold_records: Vec<HoldRecord>,
}

impl KpiBatch {
    pub fn new(as_of: NaiveDateTime) -> Self {
        Self {
            as_of,
            production: Vec::new(),
            quality: Vec::new(),
            attendance: Vec::new(),
            downtime: Vec::new(),
            work_orders: Vec::new(),
            hold_records: Vec::new(),
        }
    }
}

// ==========================================
// KpiReport - 计算结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricFailure {
    pub metric: KpiMetric,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiReport {
    pub client_id: String,
    pub as_of: NaiveDateTime,
    pub results: Vec<CalculationResult>,
    pub failures: Vec<MetricFailure>,
    pub wip_aging: WipAgingReport,
}

impl KpiReport {
    pub fn result(&self, metric: KpiMetric) -> Option<&CalculationResult> {
        self.results.iter().find(|r| r.metric == metric)
    }

    pub fn failure(&self, metric: KpiMetric) -> Option<&MetricFailure> {
        self.failures.iter().find(|f| f.metric == metric)
    }

    pub fn estimated_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_estimated).count()
    }
}

#[derive(Default)]
struct ReportBuilder {
    results: Vec<CalculationResult>,
    failures: Vec<MetricFailure>,
}

impl ReportBuilder {
    /// 记录单项结果; 致命错误向上传播
    fn push(
        &mut self,
        metric: KpiMetric,
        outcome: EngineResult<CalculationResult>,
    ) -> EngineResult<Option<CalculationResult>> {
        match outcome {
            Ok(result) => {
                self.results.push(result.clone());
                Ok(Some(result))
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                tracing::warn!(metric = %metric, error = %err, "指标计算失败");
                self.failures.push(MetricFailure {
                    metric,
                    error: err.to_string(),
                });
                Ok(None)
            }
        }
    }
}

// 单条生产记录的推断结果
struct ResolvedProduction<'a> {
    record: &'a ProductionRecord,
    ideal_cycle_time: InputResolution,
    employees: InputResolution,
    scheduled_hours: InputResolution,
    planned_downtime: f64,
    unplanned_downtime: f64,
}

type LineDay<'a> = (Option<&'a str>, NaiveDate);

// ==========================================
// KpiOrchestrator - 指标编排器
// ==========================================
pub struct KpiOrchestrator {
    resolver: Arc<ConfigResolver>,
}

impl KpiOrchestrator {
    pub fn new(resolver: ConfigResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// 计算整批指标
    ///
    /// # 错误
    /// - ConfigResolutionExhausted: 系统默认值缺失,整批中止
    #[instrument(skip(self, config, batch), fields(
        client_id = %config.client_id,
        production = batch.production.len(),
        quality = batch.quality.len(),
        work_orders = batch.work_orders.len()
    ))]
    pub async fn calculate(&self, config: &ClientConfig, batch: &KpiBatch) -> EngineResult<KpiReport> {
        let as_of = batch.as_of.date();
        let mut builder = ReportBuilder::default();

        // ==========================================
        // 步骤1: 生产记录参数推断
        // ==========================================
        let production = self.resolve_production(config, batch, as_of).await?;
        debug!(records = production.len(), "生产记录参数推断完成");

        // ==========================================
        // 步骤2: 生产类指标
        // ==========================================
        builder.push(KpiMetric::Efficiency, Self::efficiency(&production))?;
        let performance = builder.push(KpiMetric::Performance, Self::performance(&production))?;
        let availability = builder.push(
            KpiMetric::Availability,
            self.availability(config, batch, &production, as_of).await,
        )?;

        // ==========================================
        // 步骤3: 质量类指标
        // ==========================================
        let quality = builder.push(KpiMetric::QualityRate, Self::quality_rate(batch))?;
        let oee = match (&availability, &performance, &quality) {
            (Some(a), Some(p), Some(q)) => calculate_oee(a, p, q),
            _ => Err(EngineError::validation(
                "oee_component",
                "availability, performance and quality rate are all required",
            )),
        };
        builder.push(KpiMetric::Oee, oee)?;

        let (inspected, defective) = batch
            .quality
            .iter()
            .fold((0, 0), |(i, d), r| (i + r.units_inspected, d + r.units_defective));
        builder.push(
            KpiMetric::Ppm,
            calculate_ppm(&PpmInputs {
                units_inspected: inspected,
                units_defective: defective,
            }),
        )?;
        let dpmo = self.dpmo(config, batch, as_of).await?;
        builder.push(KpiMetric::Dpmo, dpmo)?;
        builder.push(KpiMetric::FirstPassYield, calculate_fpy(&Self::fpy_totals(&batch.quality)))?;
        builder.push(KpiMetric::RolledThroughputYield, calculate_rty(&Self::process_steps(&batch.quality)))?;

        // ==========================================
        // 步骤4: 工单类指标
        // ==========================================
        let aggregator = AgingAggregator::new(config.aging_policy);
        let aging: Vec<_> = batch
            .work_orders
            .iter()
            .filter(|wo| wo.status.is_wip())
            .map(|wo| aggregator.compute_aging(wo, &batch.hold_records, &batch.production, batch.as_of))
            .collect();
        let wip_aging = calculate_wip_aging(aging);
        builder.push(KpiMetric::WipAging, Ok(wip_aging.result.clone()))?;

        let delivery = self.delivery(config, batch, as_of).await?;
        builder.push(KpiMetric::OnTimeDelivery, Ok(delivery.otd))?;
        builder.push(KpiMetric::TrueOnTimeDelivery, Ok(delivery.true_otd))?;

        builder.push(KpiMetric::Absenteeism, calculate_absenteeism(&batch.attendance))?;

        let report = KpiReport {
            client_id: config.client_id.clone(),
            as_of: batch.as_of,
            results: builder.results,
            failures: builder.failures,
            wip_aging,
        };
        info!(
            results = report.results.len(),
            failures = report.failures.len(),
            estimated = report.estimated_count(),
            "指标批次计算完成"
        );
        Ok(report)
    }

    // ==========================================
    // 参数推断
    // ==========================================

    async fn resolve_production<'a>(
        &self,
        config: &ClientConfig,
        batch: &'a KpiBatch,
        as_of: NaiveDate,
    ) -> EngineResult<Vec<ResolvedProduction<'a>>> {
        let resolved = join_all(batch.production.iter().map(|record| async move {
            let base = ResolutionContext::new(config, as_of)
                .with_style(record.product_style.as_deref())
                .with_line(record.line_id.as_deref())
                .with_shift(record.shift_id.as_deref());
            let ideal_cycle_time = self
                .resolver
                .resolve(
                    InferableParameter::IdealCycleTime,
                    &base.with_record_value(record.ideal_cycle_time_hours),
                )
                .await?;
            let employees = self
                .resolver
                .resolve(
                    InferableParameter::EmployeeCount,
                    &base.with_record_value(record.employees_assigned.map(|e| e as f64)),
                )
                .await?;
            let scheduled_hours = self
                .resolver
                .resolve(
                    InferableParameter::ShiftHours,
                    &base.with_record_value(record.scheduled_hours),
                )
                .await?;
            Ok::<_, EngineError>(ResolvedProduction {
                record,
                ideal_cycle_time,
                employees,
                scheduled_hours,
                planned_downtime: 0.0,
                unplanned_downtime: 0.0,
            })
        }))
        .await
        .into_iter()
        .collect::<EngineResult<Vec<_>>>()?;

        Ok(Self::allocate_downtime(resolved, &batch.downtime))
    }

    /// 停机按 产线+日期 归属,同组内按计划工时比例分摊
    fn allocate_downtime<'a>(
        mut resolved: Vec<ResolvedProduction<'a>>,
        downtime: &[DowntimeRecord],
    ) -> Vec<ResolvedProduction<'a>> {
        let mut scheduled_by_group: HashMap<LineDay<'a>, f64> = HashMap::new();
        for r in &resolved {
            *scheduled_by_group
                .entry((r.record.line_id.as_deref(), r.record.production_date))
                .or_insert(0.0) += r.scheduled_hours.value;
        }

        let mut downtime_by_group: HashMap<LineDay<'_>, (f64, f64)> = HashMap::new();
        for d in downtime {
            let entry = downtime_by_group
                .entry((d.line_id.as_deref(), d.downtime_date))
                .or_insert((0.0, 0.0));
            if d.planned {
                entry.0 += d.duration_hours;
            } else {
                entry.1 += d.duration_hours;
            }
        }

        for r in &mut resolved {
            let key = (r.record.line_id.as_deref(), r.record.production_date);
            let Some((planned, unplanned)) = downtime_by_group.get(&key) else {
                continue;
            };
            let share = safe_ratio(
                r.scheduled_hours.value,
                scheduled_by_group.get(&key).copied().unwrap_or(0.0),
            );
            r.planned_downtime = planned * share;
            r.unplanned_downtime = unplanned * share;
        }
        resolved
    }

    // ==========================================
    // 生产类指标
    // ==========================================

    fn efficiency(production: &[ResolvedProduction<'_>]) -> EngineResult<CalculationResult> {
        let parts = production
            .iter()
            .map(|p| {
                let result = calculate_efficiency(&EfficiencyInputs {
                    units_produced: p.record.units_produced,
                    ideal_cycle_time: p.ideal_cycle_time,
                    employees: p.employees,
                    scheduled_hours: p.scheduled_hours,
                })?;
                Ok((result, p.employees.value * p.scheduled_hours.value))
            })
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(combine_weighted(KpiMetric::Efficiency, MetricUnit::Percent, parts))
    }

    fn performance(production: &[ResolvedProduction<'_>]) -> EngineResult<CalculationResult> {
        let parts = production
            .iter()
            .map(|p| {
                let downtime = p.planned_downtime + p.unplanned_downtime;
                let result = calculate_performance(&PerformanceInputs {
                    units_produced: p.record.units_produced,
                    ideal_cycle_time: p.ideal_cycle_time,
                    run_time_hours: p.record.run_time_hours,
                    scheduled_hours: p.scheduled_hours,
                    downtime_hours: downtime,
                })?;
                let run_time = p
                    .record
                    .run_time_hours
                    .unwrap_or(p.scheduled_hours.value - downtime)
                    .max(0.0);
                Ok((result, run_time))
            })
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(combine_weighted(KpiMetric::Performance, MetricUnit::Percent, parts))
    }

    async fn availability(
        &self,
        config: &ClientConfig,
        batch: &KpiBatch,
        production: &[ResolvedProduction<'_>],
        as_of: NaiveDate,
    ) -> EngineResult<CalculationResult> {
        if production.is_empty() {
            // 无生产记录: 计划工时走推断链,停机按整批汇总
            let scheduled_hours = self
                .resolver
                .resolve(
                    InferableParameter::ShiftHours,
                    &ResolutionContext::new(config, as_of),
                )
                .await?;
            let (planned, unplanned) = batch.downtime.iter().fold((0.0, 0.0), |(p, u), d| {
                if d.planned {
                    (p + d.duration_hours, u)
                } else {
                    (p, u + d.duration_hours)
                }
            });
            return calculate_availability(&AvailabilityInputs {
                scheduled_hours,
                planned_downtime_hours: planned,
                unplanned_downtime_hours: unplanned,
            });
        }

        let parts = production
            .iter()
            .map(|p| {
                let result = calculate_availability(&AvailabilityInputs {
                    scheduled_hours: p.scheduled_hours,
                    planned_downtime_hours: p.planned_downtime,
                    unplanned_downtime_hours: p.unplanned_downtime,
                })?;
                Ok((result, (p.scheduled_hours.value - p.planned_downtime).max(0.0)))
            })
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(combine_weighted(KpiMetric::Availability, MetricUnit::Percent, parts))
    }

    // ==========================================
    // 质量类指标
    // ==========================================

    /// 有检验记录时按检验口径,否则按生产记录 (产量 − 报废)
    fn quality_rate(batch: &KpiBatch) -> EngineResult<CalculationResult> {
        if !batch.quality.is_empty() {
            let (total, good) = batch
                .quality
                .iter()
                .fold((0, 0), |(t, g), r| (t + r.units_inspected, g + r.units_passed));
            return calculate_quality_rate(&QualityRateInputs {
                total_units: total,
                good_units: good,
            });
        }

        let (total, scrapped) = batch.production.iter().fold((0, 0), |(t, s), r| {
            (t + r.units_produced.unwrap_or(0), s + r.units_scrapped.unwrap_or(0))
        });
        calculate_quality_rate(&QualityRateInputs {
            total_units: total,
            good_units: total - scrapped,
        })
        .map(|r| r.with_note("quality rate derived from production scrap counts"))
    }

    async fn dpmo(
        &self,
        config: &ClientConfig,
        batch: &KpiBatch,
        as_of: NaiveDate,
    ) -> EngineResult<EngineResult<CalculationResult>> {
        let opportunities = join_all(batch.quality.iter().map(|record| {
            let ctx = ResolutionContext::new(config, as_of)
                .with_record_value(record.opportunities_per_unit.map(|o| o as f64))
                .with_style(record.product_style.as_deref())
                .with_line(record.line_id.as_deref());
            async move {
                self.resolver
                    .resolve(InferableParameter::OpportunitiesPerUnit, &ctx)
                    .await
            }
        }))
        .await
        .into_iter()
        .collect::<EngineResult<Vec<_>>>()?;

        if batch.quality.is_empty() {
            let ctx = ResolutionContext::new(config, as_of);
            let opportunities_per_unit = self
                .resolver
                .resolve(InferableParameter::OpportunitiesPerUnit, &ctx)
                .await?;
            return Ok(calculate_dpmo(&DpmoInputs {
                defect_count: 0,
                units: 0,
                opportunities_per_unit,
            }));
        }

        let parts = batch
            .quality
            .iter()
            .zip(opportunities)
            .map(|(record, opportunities_per_unit)| {
                let result = calculate_dpmo(&DpmoInputs {
                    defect_count: record.defect_count,
                    units: record.units_inspected,
                    opportunities_per_unit,
                })?;
                Ok((result, record.units_inspected as f64 * opportunities_per_unit.value))
            })
            .collect::<EngineResult<Vec<_>>>();
        Ok(parts.map(|parts| {
            combine_weighted(KpiMetric::Dpmo, MetricUnit::DefectsPerMillionOpportunities, parts)
        }))
    }

    fn fpy_totals(quality: &[QualityRecord]) -> FpyInputs {
        quality.iter().fold(FpyInputs::default(), |acc, r| FpyInputs {
            units_inspected: acc.units_inspected + r.units_inspected,
            units_passed: acc.units_passed + r.units_passed,
            units_rework: acc.units_rework + r.units_rework,
            units_repair: acc.units_repair + r.units_repair,
        })
    }

    /// 按工序汇总检验记录 (无工序名的记录不进入 RTY 管线)
    fn process_steps(quality: &[QualityRecord]) -> Vec<ProcessStepYield> {
        let mut steps: BTreeMap<&str, ProcessStepYield> = BTreeMap::new();
        for record in quality {
            let Some(name) = record.process_step.as_deref() else {
                continue;
            };
            let step = steps.entry(name).or_insert_with(|| ProcessStepYield {
                step_name: name.to_string(),
                sequence: record.step_sequence.unwrap_or(i32::MAX),
                inputs: FpyInputs::default(),
            });
            if let Some(seq) = record.step_sequence {
                step.sequence = step.sequence.min(seq);
            }
            step.inputs.units_inspected += record.units_inspected;
            step.inputs.units_passed += record.units_passed;
            step.inputs.units_rework += record.units_rework;
            step.inputs.units_repair += record.units_repair;
        }
        steps.into_values().collect()
    }

    // ==========================================
    // 交付
    // ==========================================

    async fn delivery(
        &self,
        config: &ClientConfig,
        batch: &KpiBatch,
        as_of: NaiveDate,
    ) -> EngineResult<DeliveryResults> {
        // 仅在第三级承诺日回退时需要理想节拍
        let cycle_times = join_all(batch.work_orders.iter().map(|wo| {
            let needs_cycle_time = wo.actual_ship_date.is_some()
                && wo.planned_ship_date.is_none()
                && wo.required_date.is_none()
                && wo.planned_start_date.is_some();
            let ctx = ResolutionContext::new(config, as_of)
                .with_style(wo.product_style.as_deref())
                .with_line(wo.line_id.as_deref());
            async move {
                if !needs_cycle_time {
                    return Ok(None);
                }
                self.resolver
                    .resolve(InferableParameter::IdealCycleTime, &ctx)
                    .await
                    .map(Some)
            }
        }))
        .await
        .into_iter()
        .collect::<EngineResult<Vec<_>>>()?;

        let inputs: Vec<DeliveryInputs<'_>> = batch
            .work_orders
            .iter()
            .zip(cycle_times)
            .map(|(work_order, ideal_cycle_time)| DeliveryInputs {
                work_order,
                ideal_cycle_time,
            })
            .collect();
        Ok(calculate_delivery(&inputs))
    }
}

/// 逐记录结果按分母加权汇总
fn combine_weighted(
    metric: KpiMetric,
    unit: MetricUnit,
    parts: Vec<(CalculationResult, f64)>,
) -> CalculationResult {
    if parts.is_empty() {
        let mut empty = CalculationResult::from_inputs(metric, 0.0, unit, vec![])
            .mark_estimated("no source records");
        empty.confidence = Confidence::no_data();
        return empty;
    }

    let total_weight: f64 = parts.iter().map(|(_, w)| *w).sum();
    let weighted: f64 = parts.iter().map(|(r, w)| r.value * w).sum();
    let inputs: Vec<InputResolution> = parts
        .iter()
        .flat_map(|(r, _)| r.inputs.iter().copied())
        .collect();

    let mut combined =
        CalculationResult::from_inputs(metric, safe_ratio(weighted, total_weight), unit, inputs);
    combined.capped = parts.iter().any(|(r, _)| r.capped);
    // 分项的整体估算不体现在输入来源中,需单独降级
    if !combined.is_estimated && parts.iter().any(|(r, _)| r.is_estimated) {
        combined.is_estimated = true;
        combined.confidence = combined.confidence.with_estimation();
    }
    for note in parts.iter().flat_map(|(r, _)| r.notes.iter()) {
        if !combined.notes.contains(note) {
            combined.notes.push(note.clone());
        }
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::SystemDefaults;
    use crate::domain::types::{ConfidenceLevel, ResolutionSource};

    fn as_of() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, 7)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn production(id: &str, units: i64, line: &str) -> ProductionRecord {
        ProductionRecord {
            record_id: id.to_string(),
            production_date: NaiveDate::from_ymd_opt(2025, 12, 5).unwrap(),
            line_id: Some(line.to_string()),
            units_produced: Some(units),
            ideal_cycle_time_hours: Some(0.25),
            employees_assigned: Some(10),
            scheduled_hours: Some(9.0),
            ..Default::default()
        }
    }

    fn orchestrator() -> KpiOrchestrator {
        KpiOrchestrator::new(ConfigResolver::without_history(SystemDefaults::default()))
    }

    #[test]
    fn test_combine_weighted_matches_aggregate_ratio() {
        let part = |value: f64, weight: f64| {
            (
                CalculationResult::from_inputs(KpiMetric::Efficiency, value, MetricUnit::Percent, vec![]),
                weight,
            )
        };
        // 50% on 10h + 100% on 30h = (5 + 30) / 40
        let combined = combine_weighted(
            KpiMetric::Efficiency,
            MetricUnit::Percent,
            vec![part(50.0, 10.0), part(100.0, 30.0)],
        );
        assert!((combined.value - 87.5).abs() < 1e-9);
    }

    #[test]
    fn test_combine_weighted_keeps_part_estimation_in_confidence() {
        let recorded = vec![InputResolution::new(
            InferableParameter::EmployeeCount,
            10.0,
            ResolutionSource::RecordValue,
        )];
        let exact =
            CalculationResult::from_inputs(KpiMetric::Performance, 80.0, MetricUnit::Percent, recorded.clone());
        let inferred_run_time =
            CalculationResult::from_inputs(KpiMetric::Performance, 90.0, MetricUnit::Percent, recorded)
                .mark_estimated("run time inferred");

        let combined = combine_weighted(
            KpiMetric::Performance,
            MetricUnit::Percent,
            vec![(exact, 1.0), (inferred_run_time, 1.0)],
        );
        assert!(combined.is_estimated);
        assert_eq!(combined.confidence.level, ConfidenceLevel::Medium);
        assert!(combined.confidence.inferred_inputs >= 1);
    }

    #[test]
    fn test_combine_weighted_with_zero_total_weight_is_zero() {
        let part = CalculationResult::from_inputs(KpiMetric::Efficiency, 0.0, MetricUnit::Percent, vec![]);
        let combined = combine_weighted(KpiMetric::Efficiency, MetricUnit::Percent, vec![(part, 0.0)]);
        assert_eq!(combined.value, 0.0);
        assert!(!combined.is_estimated);
    }

    #[tokio::test]
    async fn test_batch_efficiency_across_records() {
        let mut batch = KpiBatch::new(as_of());
        batch.production = vec![production("P1", 100, "L1"), production("P2", 260, "L2")];

        let report = orchestrator()
            .calculate(&ClientConfig::new("ACME"), &batch)
            .await
            .unwrap();
        let eff = report.result(KpiMetric::Efficiency).unwrap();
        // (100 + 260) × 0.25 / (2 × 10 × 9)
        assert!((eff.value - 50.0).abs() < 1e-9);
        assert!(!eff.is_estimated);
    }

    #[tokio::test]
    async fn test_recorded_zero_employees_gives_zero_efficiency() {
        let mut batch = KpiBatch::new(as_of());
        let mut record = production("P1", 100, "L1");
        record.employees_assigned = Some(0);
        batch.production = vec![record];

        let report = orchestrator()
            .calculate(&ClientConfig::new("ACME"), &batch)
            .await
            .unwrap();
        let eff = report.result(KpiMetric::Efficiency).unwrap();
        assert_eq!(eff.value, 0.0);
        assert!(!eff.is_estimated);
        assert!(eff
            .inputs
            .iter()
            .any(|i| i.parameter == InferableParameter::EmployeeCount
                && i.source == ResolutionSource::RecordValue
                && i.value == 0.0));
    }

    #[tokio::test]
    async fn test_recorded_zero_scheduled_hours_gives_zero_efficiency() {
        let mut batch = KpiBatch::new(as_of());
        let mut zero_hours = production("P1", 100, "L1");
        zero_hours.scheduled_hours = Some(0.0);
        let mut zero_staff = production("P2", 100, "L2");
        zero_staff.employees_assigned = Some(0);
        batch.production = vec![zero_hours, zero_staff];

        let report = orchestrator()
            .calculate(&ClientConfig::new("ACME"), &batch)
            .await
            .unwrap();
        let eff = report.result(KpiMetric::Efficiency).unwrap();
        assert_eq!(eff.value, 0.0);
        assert!(!eff.is_estimated);
        assert!(eff
            .inputs
            .iter()
            .all(|i| i.source == ResolutionSource::RecordValue));
    }

    #[tokio::test]
    async fn test_missing_units_fails_only_that_metric() {
        let mut batch = KpiBatch::new(as_of());
        let mut record = production("P1", 0, "L1");
        record.units_produced = None;
        batch.production = vec![record];

        let report = orchestrator()
            .calculate(&ClientConfig::new("ACME"), &batch)
            .await
            .unwrap();
        assert!(report.failure(KpiMetric::Efficiency).is_some());
        assert!(report.failure(KpiMetric::Performance).is_some());
        assert!(report.failure(KpiMetric::Oee).is_some());
        assert!(report.result(KpiMetric::Availability).is_some());
        assert!(report.result(KpiMetric::Absenteeism).is_some());
    }

    #[tokio::test]
    async fn test_missing_system_default_aborts_batch() {
        let resolver = ConfigResolver::without_history(
            SystemDefaults::default().without(InferableParameter::OpportunitiesPerUnit),
        );
        let err = KpiOrchestrator::new(resolver)
            .calculate(&ClientConfig::new("ACME"), &KpiBatch::new(as_of()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::ConfigResolutionExhausted {
                parameter: InferableParameter::OpportunitiesPerUnit
            }
        ));
    }

    #[tokio::test]
    async fn test_downtime_split_across_records_on_same_line() {
        let mut batch = KpiBatch::new(as_of());
        let mut a = production("P1", 10, "L1");
        a.scheduled_hours = Some(6.0);
        let mut b = production("P2", 10, "L1");
        b.scheduled_hours = Some(2.0);
        batch.production = vec![a, b];
        batch.downtime = vec![DowntimeRecord {
            downtime_id: "D1".to_string(),
            downtime_date: NaiveDate::from_ymd_opt(2025, 12, 5).unwrap(),
            line_id: Some("L1".to_string()),
            reason: None,
            duration_hours: 2.0,
            planned: false,
        }];

        let report = orchestrator()
            .calculate(&ClientConfig::new("ACME"), &batch)
            .await
            .unwrap();
        let availability = report.result(KpiMetric::Availability).unwrap();
        // (8 − 2) / 8
        assert!((availability.value - 75.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_batch_uses_inferred_shift_hours() {
        let report = orchestrator()
            .calculate(&ClientConfig::new("ACME"), &KpiBatch::new(as_of()))
            .await
            .unwrap();
        let availability = report.result(KpiMetric::Availability).unwrap();
        assert_eq!(availability.inputs[0].source, ResolutionSource::SystemDefault);
        assert!(availability.is_estimated);
        assert_eq!(report.result(KpiMetric::RolledThroughputYield).unwrap().value, 100.0);
    }
}
