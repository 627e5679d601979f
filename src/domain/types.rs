// ==========================================
// 车间绩效系统 - 领域类型定义
// ==========================================
// 职责: 工单状态、关闭触发方式、指标与推断参数等封闭枚举
// 红线: 状态是封闭枚举,不允许任意字符串参与比较
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 工单状态 (Work Order Status)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// 终态: CLOSED / CANCELLED / REJECTED
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    Received,   // 已接收
    Released,   // 已下达
    InProgress, // 生产中
    Completed,  // 已完工
    Shipped,    // 已发运
    Closed,     // 已关闭
    OnHold,     // 暂停
    Demoted,    // 降级
    Cancelled,  // 已取消
    Rejected,   // 已拒收
}

impl WorkOrderStatus {
    /// 全部状态 (按生命周期顺序)
    pub const ALL: [WorkOrderStatus; 10] = [
        WorkOrderStatus::Received,
        WorkOrderStatus::Released,
        WorkOrderStatus::InProgress,
        WorkOrderStatus::Completed,
        WorkOrderStatus::Shipped,
        WorkOrderStatus::Closed,
        WorkOrderStatus::OnHold,
        WorkOrderStatus::Demoted,
        WorkOrderStatus::Cancelled,
        WorkOrderStatus::Rejected,
    ];

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkOrderStatus::Closed | WorkOrderStatus::Cancelled | WorkOrderStatus::Rejected
        )
    }

    /// 是否为在制状态 (已开始、未完工)
    pub fn is_wip(&self) -> bool {
        matches!(
            self,
            WorkOrderStatus::Released
                | WorkOrderStatus::InProgress
                | WorkOrderStatus::OnHold
                | WorkOrderStatus::Demoted
        )
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Received => "RECEIVED",
            WorkOrderStatus::Released => "RELEASED",
            WorkOrderStatus::InProgress => "IN_PROGRESS",
            WorkOrderStatus::Completed => "COMPLETED",
            WorkOrderStatus::Shipped => "SHIPPED",
            WorkOrderStatus::Closed => "CLOSED",
            WorkOrderStatus::OnHold => "ON_HOLD",
            WorkOrderStatus::Demoted => "DEMOTED",
            WorkOrderStatus::Cancelled => "CANCELLED",
            WorkOrderStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl std::str::FromStr for WorkOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "RECEIVED" => Ok(WorkOrderStatus::Received),
            "RELEASED" => Ok(WorkOrderStatus::Released),
            "IN_PROGRESS" => Ok(WorkOrderStatus::InProgress),
            "COMPLETED" => Ok(WorkOrderStatus::Completed),
            "SHIPPED" => Ok(WorkOrderStatus::Shipped),
            "CLOSED" => Ok(WorkOrderStatus::Closed),
            "ON_HOLD" => Ok(WorkOrderStatus::OnHold),
            "DEMOTED" => Ok(WorkOrderStatus::Demoted),
            "CANCELLED" => Ok(WorkOrderStatus::Cancelled),
            "REJECTED" => Ok(WorkOrderStatus::Rejected),
            other => Err(format!("未知工单状态: {}", other)),
        }
    }
}

// ==========================================
// 关闭触发方式 (Closure Trigger)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClosureTrigger {
    AtShipment,      // 发运即关闭
    AtCompletion,    // 完工即关闭
    AtClientReceipt, // 客户签收后关闭
    Manual,          // 仅人工关闭
}

impl Default for ClosureTrigger {
    fn default() -> Self {
        ClosureTrigger::AtShipment
    }
}

impl fmt::Display for ClosureTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosureTrigger::AtShipment => write!(f, "AT_SHIPMENT"),
            ClosureTrigger::AtCompletion => write!(f, "AT_COMPLETION"),
            ClosureTrigger::AtClientReceipt => write!(f, "AT_CLIENT_RECEIPT"),
            ClosureTrigger::Manual => write!(f, "MANUAL"),
        }
    }
}

// ==========================================
// 暂停原因 (Hold Reason)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldReason {
    MaterialShortage, // 缺料
    QualityIssue,     // 质量问题
    EngineeringReview, // 工程评审
    CustomerRequest,  // 客户要求
    CapacityConstraint, // 产能不足
    Other,            // 其他
}

impl HoldReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldReason::MaterialShortage => "MATERIAL_SHORTAGE",
            HoldReason::QualityIssue => "QUALITY_ISSUE",
            HoldReason::EngineeringReview => "ENGINEERING_REVIEW",
            HoldReason::CustomerRequest => "CUSTOMER_REQUEST",
            HoldReason::CapacityConstraint => "CAPACITY_CONSTRAINT",
            HoldReason::Other => "OTHER",
        }
    }

    /// 从字符串解析暂停原因 (未知值归为 OTHER)
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "MATERIAL_SHORTAGE" => HoldReason::MaterialShortage,
            "QUALITY_ISSUE" => HoldReason::QualityIssue,
            "ENGINEERING_REVIEW" => HoldReason::EngineeringReview,
            "CUSTOMER_REQUEST" => HoldReason::CustomerRequest,
            "CAPACITY_CONSTRAINT" => HoldReason::CapacityConstraint,
            _ => HoldReason::Other,
        }
    }
}

// ==========================================
// 流转触发来源 (Trigger Source)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerSource {
    Manual,    // 人工操作
    Automatic, // 系统自动 (如关闭触发)
    Bulk,      // 批量操作
    Import,    // 数据导入
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Manual => "MANUAL",
            TriggerSource::Automatic => "AUTOMATIC",
            TriggerSource::Bulk => "BULK",
            TriggerSource::Import => "IMPORT",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "AUTOMATIC" => TriggerSource::Automatic,
            "BULK" => TriggerSource::Bulk,
            "IMPORT" => TriggerSource::Import,
            _ => TriggerSource::Manual,
        }
    }
}

// ==========================================
// 绩效指标 (KPI Metric)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KpiMetric {
    Efficiency,
    Performance,
    QualityRate,
    Availability,
    Oee,
    Ppm,
    Dpmo,
    FirstPassYield,
    RolledThroughputYield,
    WipAging,
    OnTimeDelivery,
    TrueOnTimeDelivery,
    Absenteeism,
}

impl fmt::Display for KpiMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KpiMetric::Efficiency => "EFFICIENCY",
            KpiMetric::Performance => "PERFORMANCE",
            KpiMetric::QualityRate => "QUALITY_RATE",
            KpiMetric::Availability => "AVAILABILITY",
            KpiMetric::Oee => "OEE",
            KpiMetric::Ppm => "PPM",
            KpiMetric::Dpmo => "DPMO",
            KpiMetric::FirstPassYield => "FPY",
            KpiMetric::RolledThroughputYield => "RTY",
            KpiMetric::WipAging => "WIP_AGING",
            KpiMetric::OnTimeDelivery => "OTD",
            KpiMetric::TrueOnTimeDelivery => "TRUE_OTD",
            KpiMetric::Absenteeism => "ABSENTEEISM",
        };
        f.write_str(s)
    }
}

// ==========================================
// 指标单位 (Metric Unit)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricUnit {
    Percent,
    PartsPerMillion,
    DefectsPerMillionOpportunities,
    Days,
}

// ==========================================
// 可推断参数 (Inferable Parameter)
// ==========================================
// 每个参数在 Config Resolver 中拥有固定顺序的回退链
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InferableParameter {
    IdealCycleTime,      // 理想节拍 (小时/件)
    OpportunitiesPerUnit, // 单件缺陷机会数
    EmployeeCount,       // 在岗人数
    ShiftHours,          // 班次计划工时
}

impl InferableParameter {
    pub const ALL: [InferableParameter; 4] = [
        InferableParameter::IdealCycleTime,
        InferableParameter::OpportunitiesPerUnit,
        InferableParameter::EmployeeCount,
        InferableParameter::ShiftHours,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InferableParameter::IdealCycleTime => "ideal_cycle_time",
            InferableParameter::OpportunitiesPerUnit => "opportunities_per_unit",
            InferableParameter::EmployeeCount => "employee_count",
            InferableParameter::ShiftHours => "shift_hours",
        }
    }
}

impl fmt::Display for InferableParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 推断来源层级 (Resolution Source)
// ==========================================
// 顺序即优先级: 记录值 > 款式覆写 > 产线标准 > 客户默认 > 历史均值 > 系统默认
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionSource {
    RecordValue,
    StyleOverride,
    LineStandard,
    ClientDefault,
    HistoricalAverage,
    SystemDefault,
}

impl ResolutionSource {
    /// 是否为权威来源 (非推断)
    pub fn is_authoritative(&self) -> bool {
        matches!(
            self,
            ResolutionSource::RecordValue
                | ResolutionSource::StyleOverride
                | ResolutionSource::LineStandard
        )
    }

    /// 置信权重
    pub fn confidence_weight(&self) -> f64 {
        match self {
            ResolutionSource::RecordValue => 1.0,
            ResolutionSource::StyleOverride => 0.95,
            ResolutionSource::LineStandard => 0.9,
            ResolutionSource::ClientDefault => 0.7,
            ResolutionSource::HistoricalAverage => 0.6,
            ResolutionSource::SystemDefault => 0.3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::RecordValue => "RECORD_VALUE",
            ResolutionSource::StyleOverride => "STYLE_OVERRIDE",
            ResolutionSource::LineStandard => "LINE_STANDARD",
            ResolutionSource::ClientDefault => "CLIENT_DEFAULT",
            ResolutionSource::HistoricalAverage => "HISTORICAL_AVERAGE",
            ResolutionSource::SystemDefault => "SYSTEM_DEFAULT",
        }
    }
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 置信等级 (Confidence Level)
// ==========================================
// 顺序: Low < Medium < High
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::Low => write!(f, "LOW"),
            ConfidenceLevel::Medium => write!(f, "MEDIUM"),
            ConfidenceLevel::High => write!(f, "HIGH"),
        }
    }
}
