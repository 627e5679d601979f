// ==========================================
// 车间绩效系统 - 车间原始记录
// ==========================================
// 职责: 生产/质量/考勤/停机四类只读输入记录
// 说明: 记录已由外部导入层做过范围校验,字段缺失以 Option 表示
// 红线: 引擎只读,不修改记录
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// ProductionRecord - 生产记录
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub record_id: String,
    pub production_date: NaiveDate,
    pub line_id: Option<String>,       // 产线
    pub shift_id: Option<String>,      // 班次
    pub product_style: Option<String>, // 款式
    pub work_order_id: Option<String>, // 关联工单

    // ===== 数量 =====
    pub units_produced: Option<i64>, // 产量 (不可推断)
    pub units_scrapped: Option<i64>, // 报废数

    // ===== 工时 (可推断) =====
    pub ideal_cycle_time_hours: Option<f64>, // 记录上的理想节拍
    pub employees_assigned: Option<i64>,     // 在岗人数
    pub scheduled_hours: Option<f64>,        // 计划工时
    pub run_time_hours: Option<f64>,         // 实际运行工时
}

// ==========================================
// QualityRecord - 质量检验记录
// ==========================================
// 约束: units_passed ≤ units_inspected
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityRecord {
    pub record_id: String,
    pub inspection_date: NaiveDate,
    pub line_id: Option<String>,
    pub product_style: Option<String>,
    pub work_order_id: Option<String>,

    // ===== 工序 (RTY 管线) =====
    pub process_step: Option<String>, // 工序名称
    pub step_sequence: Option<i32>,   // 工序顺序

    // ===== 检验数量 =====
    pub units_inspected: i64,
    pub units_passed: i64,    // 最终合格 (含返工/返修后合格)
    pub units_defective: i64, // 不良品件数
    pub units_rework: i64,    // 返工件数
    pub units_repair: i64,    // 返修件数
    pub defect_count: i64,    // 缺陷总数 (单件可有多缺陷)

    pub opportunities_per_unit: Option<i64>, // 单件缺陷机会数
}

// ==========================================
// AttendanceRecord - 考勤记录
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub employee_id: String,
    pub attendance_date: NaiveDate,
    pub shift_id: Option<String>,
    pub scheduled_hours: f64,
    pub absence_hours: f64,
    pub is_absent: bool,
}

// ==========================================
// DowntimeRecord - 停机记录
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DowntimeRecord {
    pub downtime_id: String,
    pub downtime_date: NaiveDate,
    pub line_id: Option<String>,
    pub reason: Option<String>,
    pub duration_hours: f64,
    pub planned: bool, // 计划停机 (不计入可用率损失)
}
