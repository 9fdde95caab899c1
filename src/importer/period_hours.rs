// ==========================================
// 车间报表看板 - 周期工时统计
// ==========================================
// 输入: 最近一次映射下的归档行
// 步骤: 行去重（fallback_row_key）→ 窗口过滤 → 工时求和 → 对比周期目标
// 窗口: [today - days_back, today - days_forward]，两端包含
// ==========================================

use crate::domain::mapping::{ColumnMapping, RecordRow};
use crate::domain::schema::fields;
use crate::domain::types::{PeriodTargets, TargetPeriod};
use crate::importer::aggregation::fallback_row_key;
use crate::importer::cell_coercion::{parse_date, parse_number};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodHours {
    pub period: TargetPeriod,
    pub total_hours: f64,
    pub target_hours: f64,
    pub percentage: f64,
    pub days_count: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// 去重后参与统计的行数
    pub unique_rows: usize,
}

impl PeriodHours {
    fn empty(period: TargetPeriod, targets: &PeriodTargets, today: NaiveDate) -> Self {
        Self {
            period,
            total_hours: 0.0,
            target_hours: targets.target_hours(period),
            percentage: 0.0,
            days_count: period.days_count(),
            start_date: today - Duration::days(period.days_back()),
            end_date: today - Duration::days(period.days_forward()),
            unique_rows: 0,
        }
    }
}

/// 统计周期工时；映射缺少工时列或日期列时返回零值结果
pub fn compute_period_hours(
    records: &[RecordRow],
    mapping: &ColumnMapping,
    period: TargetPeriod,
    targets: &PeriodTargets,
    today: NaiveDate,
) -> PeriodHours {
    let mut result = PeriodHours::empty(period, targets, today);
    if !mapping.is_mapped(fields::HOURS) || !mapping.is_mapped(fields::DATE) {
        return result;
    }

    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(fallback_row_key(record, mapping)) {
            continue;
        }
        result.unique_rows += 1;

        let Some(date) = mapping
            .resolve(record, fields::DATE)
            .and_then(parse_date)
            .map(|d| d.date())
        else {
            continue;
        };
        if date < result.start_date || date > result.end_date {
            continue;
        }

        if let Some(hours) = mapping.resolve(record, fields::HOURS).and_then(parse_number) {
            result.total_hours += hours;
        }
    }

    if result.target_hours > 0.0 {
        result.percentage = result.total_hours / result.target_hours * 100.0;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::RawCell;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping::by_name([
            (fields::DATE, "Datum"),
            (fields::HOURS, "TEG [h]"),
            (fields::MACHINE_NAME, "Ressource"),
        ])
    }

    fn record(date: &str, hours: f64, machine: &str) -> RecordRow {
        let mut row = RecordRow::new();
        row.insert("Datum".into(), RawCell::from(date));
        row.insert("TEG [h]".into(), RawCell::Number(hours));
        row.insert("Ressource".into(), RawCell::from(machine));
        row
    }

    #[test]
    fn test_fourteen_day_window_and_dedup() {
        let records = vec![
            record("28.02.2024", 8.0, "M1"),
            record("28.02.2024", 8.0, "M1"), // 重复行
            record("16.02.2024", 2.0, "M2"), // 窗口起点（含）
            record("15.02.2024", 5.0, "M2"), // 窗口外
        ];

        let result = compute_period_hours(
            &records,
            &mapping(),
            TargetPeriod::FourteenDays,
            &PeriodTargets::default(),
            today(),
        );

        assert_eq!(result.unique_rows, 3);
        assert_eq!(result.total_hours, 10.0);
        assert_eq!(result.target_hours, 450.0);
        assert_eq!(result.start_date, NaiveDate::from_ymd_opt(2024, 2, 16).unwrap());
    }

    #[test]
    fn test_weeks_3_and_4_excludes_recent_days() {
        let records = vec![record("28.02.2024", 8.0, "M1"), record("10.02.2024", 3.0, "M1")];

        let result = compute_period_hours(
            &records,
            &mapping(),
            TargetPeriod::Weeks3And4,
            &PeriodTargets::default(),
            today(),
        );
        assert_eq!(result.total_hours, 3.0);
        assert_eq!(result.end_date, NaiveDate::from_ymd_opt(2024, 2, 16).unwrap());
    }

    #[test]
    fn test_eight_weeks_uses_multiplier() {
        let result = compute_period_hours(
            &[record("20.02.2024", 900.0, "M1")],
            &mapping(),
            TargetPeriod::EightWeeks,
            &PeriodTargets::default(),
            today(),
        );
        assert_eq!(result.target_hours, 1800.0);
        assert_eq!(result.percentage, 50.0);
    }

    #[test]
    fn test_unmapped_hours_column_yields_zero() {
        let mapping = ColumnMapping::by_name([(fields::DATE, "Datum")]);
        let result = compute_period_hours(
            &[record("28.02.2024", 8.0, "M1")],
            &mapping,
            TargetPeriod::FourteenDays,
            &PeriodTargets::default(),
            today(),
        );
        assert_eq!(result.total_hours, 0.0);
        assert_eq!(result.unique_rows, 0);
    }
}
