// ==========================================
// 车间绩效系统 - 缺勤率
// ==========================================
// 公式: 缺勤工时 / 计划工时 × 100
// 边界: 无考勤数据 → 0 (缺数据不惩罚),标记估算
// 规则: 标记缺勤但未填缺勤工时 → 按整班计划工时计缺勤
// ==========================================

use super::{ensure_non_negative, safe_ratio};
use crate::domain::calculation::{CalculationResult, Confidence};
use crate::domain::records::AttendanceRecord;
use crate::domain::types::{KpiMetric, MetricUnit};
use crate::engine::error::{EngineError, EngineResult};

pub fn calculate_absenteeism(records: &[AttendanceRecord]) -> EngineResult<CalculationResult> {
    if records.is_empty() {
        let mut result = CalculationResult::from_inputs(
            KpiMetric::Absenteeism,
            0.0,
            MetricUnit::Percent,
            vec![],
        )
        .mark_estimated("no attendance data");
        result.confidence = Confidence::no_data();
        return Ok(result);
    }

    let mut scheduled = 0.0;
    let mut absent = 0.0;
    for record in records {
        ensure_non_negative("scheduled_hours", record.scheduled_hours)?;
        ensure_non_negative("absence_hours", record.absence_hours)?;
        if record.absence_hours > record.scheduled_hours {
            return Err(EngineError::validation(
                "absence_hours",
                format!(
                    "absence_hours={} exceeds scheduled_hours={} (employee_id={})",
                    record.absence_hours, record.scheduled_hours, record.employee_id
                ),
            ));
        }

        scheduled += record.scheduled_hours;
        absent += if record.is_absent && record.absence_hours == 0.0 {
            record.scheduled_hours
        } else {
            record.absence_hours
        };
    }

    Ok(CalculationResult::from_inputs(
        KpiMetric::Absenteeism,
        safe_ratio(absent, scheduled) * 100.0,
        MetricUnit::Percent,
        vec![],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ConfidenceLevel;
    use chrono::NaiveDate;

    fn record(id: &str, scheduled: f64, absence: f64, is_absent: bool) -> AttendanceRecord {
        AttendanceRecord {
            employee_id: id.to_string(),
            attendance_date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            shift_id: None,
            scheduled_hours: scheduled,
            absence_hours: absence,
            is_absent,
        }
    }

    #[test]
    fn test_absenteeism_formula() {
        let r = calculate_absenteeism(&[
            record("E1", 8.0, 0.0, false),
            record("E2", 8.0, 4.0, false),
            record("E3", 8.0, 0.0, true),
            record("E4", 8.0, 0.0, false),
        ])
        .unwrap();
        // (4 + 8) / 32
        assert!((r.value - 37.5).abs() < 1e-9);
        assert!(!r.is_estimated);
    }

    #[test]
    fn test_no_attendance_data_is_zero() {
        let r = calculate_absenteeism(&[]).unwrap();
        assert_eq!(r.value, 0.0);
        assert!(r.is_estimated);
        assert_eq!(r.confidence.level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_absence_above_scheduled_rejected() {
        assert!(calculate_absenteeism(&[record("E1", 8.0, 9.0, true)]).is_err());
    }
}
