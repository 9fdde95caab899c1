// ==========================================
// 车间报表看板 - 聚合计算（纯函数）
// ==========================================
// 阶段 3a: 已解析行 → 机台日工时 / 废品汇总 / 新机台
// 红线: 单行缺字段只计入 SkipCounts，不报错
// 说明: 未知机台在类型上为 None，排除是显式分支
// ==========================================

use crate::domain::mapping::{ColumnMapping, RecordRow, RowAccess};
use crate::domain::records::{MachineHoursRecord, ScrapRecord};
use crate::domain::schema::fields;
use crate::domain::table::RawCell;
use crate::domain::types::{HoursRule, ScrapGrouping};
use crate::domain::validation::ValidatedRow;
use crate::importer::cell_coercion::{cell_to_text, parse_date, parse_number};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// 缺省订单号；同时也是源数据中"未知机台"的占位文本
pub const UNKNOWN: &str = "Unbekannt";

/// 行级去重的专用列
pub const ROW_ID_COLUMN: &str = "lfd_nr";

/// Excel 错误字面量（大写比较，包含即命中）
const EXCEL_ERROR_LITERALS: [&str; 8] = [
    "#NV", "#N/A", "#NAME?", "#DIV/0!", "#REF!", "#VALUE!", "#NUM!", "#NULL!",
];

const MINUTES_PER_HOUR: f64 = 60.0;

// ==========================================
// 机台名解析
// ==========================================

/// 宽松规则：去空白；空串或占位文本视为未知
pub fn resolve_machine_name(text: &str) -> Option<String> {
    let name = text.trim();
    if name.is_empty() || name == UNKNOWN {
        return None;
    }
    Some(name.to_string())
}

pub fn is_excel_error(text: &str) -> bool {
    let upper = text.trim().to_uppercase();
    EXCEL_ERROR_LITERALS.iter().any(|e| upper.contains(e))
}

/// 严格规则（回填用）：额外拒绝 Excel 错误值与纯数字名称
pub fn resolve_machine_name_strict(cell: &RawCell) -> Option<String> {
    let text = match cell {
        RawCell::Text(s) => s.as_str(),
        _ => return None,
    };
    if is_excel_error(text) {
        return None;
    }
    let name = resolve_machine_name(text)?;
    if name.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(name)
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ==========================================
// ResolvedRow - 聚合输入
// ==========================================
// 来源: ValidatedRow（已类型化）或 原始行 + 映射（回填/模板导入）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedRow {
    pub machine: Option<String>,
    pub date: Option<NaiveDate>,
    pub hours: Option<f64>,
    pub setup_minutes: Option<f64>,
    pub production_minutes: Option<f64>,
    pub scrap: Option<f64>,
    /// bab_number 优先，其次 order_number
    pub order: Option<String>,
}

impl ResolvedRow {
    pub fn from_validated(row: &ValidatedRow) -> Self {
        let text = |key: &str| row.get(key).and_then(|v| v.as_text()).map(str::to_string);
        let number = |key: &str| row.get(key).and_then(|v| v.as_number());

        Self {
            machine: text(fields::MACHINE_NAME).and_then(|s| resolve_machine_name(&s)),
            date: row.get(fields::DATE).and_then(|v| v.as_date()),
            hours: number(fields::HOURS),
            setup_minutes: number(fields::SETUP_TIME),
            production_minutes: number(fields::PRODUCTION_TIME),
            scrap: number(fields::SCRAP_AMOUNT),
            order: text(fields::BAB_NUMBER)
                .and_then(non_empty)
                .or_else(|| text(fields::ORDER_NUMBER).and_then(non_empty)),
        }
    }

    pub fn from_raw<R: RowAccess + ?Sized>(row: &R, mapping: &ColumnMapping) -> Self {
        let cell = |key: &str| mapping.resolve(row, key).unwrap_or(&RawCell::Null);
        let number = |key: &str| parse_number(cell(key));
        let text = |key: &str| non_empty(cell_to_text(cell(key)));

        Self {
            machine: resolve_machine_name(&cell_to_text(cell(fields::MACHINE_NAME))),
            date: parse_date(cell(fields::DATE)).map(|d| d.date()),
            hours: number(fields::HOURS),
            setup_minutes: number(fields::SETUP_TIME),
            production_minutes: number(fields::PRODUCTION_TIME),
            scrap: number(fields::SCRAP_AMOUNT),
            order: text(fields::BAB_NUMBER).or_else(|| text(fields::ORDER_NUMBER)),
        }
    }

    /// 同 from_raw，但机台名按严格规则解析
    pub fn from_raw_strict<R: RowAccess + ?Sized>(row: &R, mapping: &ColumnMapping) -> Self {
        let machine = mapping
            .resolve(row, fields::MACHINE_NAME)
            .and_then(resolve_machine_name_strict);
        Self {
            machine,
            ..Self::from_raw(row, mapping)
        }
    }

    fn order_or_unknown(&self) -> String {
        self.order.clone().unwrap_or_else(|| UNKNOWN.to_string())
    }
}

// ==========================================
// SkipCounts - 跳过原因计数
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub no_date: usize,
    pub no_machine: usize,
    pub no_quantity: usize,
    pub non_positive_scrap: usize,
    pub no_order: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.no_date + self.no_machine + self.no_quantity + self.non_positive_scrap + self.no_order
    }

    pub fn merge(&mut self, other: &SkipCounts) {
        self.no_date += other.no_date;
        self.no_machine += other.no_machine;
        self.no_quantity += other.no_quantity;
        self.non_positive_scrap += other.non_positive_scrap;
        self.no_order += other.no_order;
    }
}

/// (机台, 日期)
pub type MachineDay = (String, NaiveDate);

// ==========================================
// 工时聚合
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoursAggregate {
    pub machine_days: BTreeMap<MachineDay, f64>,
    pub skipped: SkipCounts,
}

/// 按 (机台, 日期) 汇总工时
pub fn aggregate_hours(rows: &[ResolvedRow], rule: HoursRule) -> HoursAggregate {
    let mut result = HoursAggregate::default();

    // 仅 OrderGroupedMinutes 使用: (订单, 机台, 日期) → 分钟数
    let mut order_minutes: BTreeMap<(String, String, NaiveDate), f64> = BTreeMap::new();

    for row in rows {
        let Some(machine) = &row.machine else {
            result.skipped.no_machine += 1;
            continue;
        };
        let Some(date) = row.date else {
            result.skipped.no_date += 1;
            continue;
        };

        let minutes = row.setup_minutes.unwrap_or(0.0) + row.production_minutes.unwrap_or(0.0);
        match rule {
            HoursRule::DirectColumn => {
                let Some(hours) = row.hours else {
                    result.skipped.no_quantity += 1;
                    continue;
                };
                *result.machine_days.entry((machine.clone(), date)).or_insert(0.0) += hours;
            }
            HoursRule::SetupPlusProduction => {
                *result.machine_days.entry((machine.clone(), date)).or_insert(0.0) +=
                    minutes / MINUTES_PER_HOUR;
            }
            HoursRule::OrderGroupedMinutes => {
                let Some(order) = &row.order else {
                    result.skipped.no_order += 1;
                    continue;
                };
                *order_minutes
                    .entry((order.clone(), machine.clone(), date))
                    .or_insert(0.0) += minutes;
            }
        }
    }

    for ((_, machine, date), minutes) in order_minutes {
        if minutes <= 0.0 {
            continue;
        }
        *result.machine_days.entry((machine, date)).or_insert(0.0) += minutes / MINUTES_PER_HOUR;
    }

    result
}

/// 附加目标工时快照（未登记机台为 0）
pub fn build_hours_records(
    aggregate: &HoursAggregate,
    targets: &HashMap<String, f64>,
    user_id: &str,
) -> Vec<MachineHoursRecord> {
    aggregate
        .machine_days
        .iter()
        .map(|((machine, date), hours)| MachineHoursRecord {
            user_id: user_id.to_string(),
            machine_name: machine.clone(),
            date: *date,
            hours_worked: *hours,
            target_hours: targets.get(machine).copied().unwrap_or(0.0),
        })
        .collect()
}

// ==========================================
// 废品聚合
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapEntry {
    pub order: String,
    pub machine_name: String,
    pub date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapAggregate {
    pub entries: Vec<ScrapEntry>,
    pub skipped: SkipCounts,
}

/// 废品汇总；订单号缺失不排除（记为 Unbekannt），机台缺失排除
pub fn aggregate_scrap(rows: &[ResolvedRow], grouping: ScrapGrouping) -> ScrapAggregate {
    let mut skipped = SkipCounts::default();
    let mut qualifying = Vec::new();

    for row in rows {
        let Some(machine) = &row.machine else {
            skipped.no_machine += 1;
            continue;
        };
        let Some(date) = row.date else {
            skipped.no_date += 1;
            continue;
        };
        let Some(amount) = row.scrap else {
            skipped.no_quantity += 1;
            continue;
        };
        if amount <= 0.0 {
            skipped.non_positive_scrap += 1;
            continue;
        }

        qualifying.push(ScrapEntry {
            order: row.order_or_unknown(),
            machine_name: machine.clone(),
            date,
            amount,
        });
    }

    let entries = match grouping {
        ScrapGrouping::PerRow => qualifying,
        ScrapGrouping::OrderMachineDay => {
            let mut grouped: BTreeMap<(String, String, NaiveDate), f64> = BTreeMap::new();
            for entry in qualifying {
                *grouped
                    .entry((entry.order, entry.machine_name, entry.date))
                    .or_insert(0.0) += entry.amount;
            }
            grouped
                .into_iter()
                .map(|((order, machine_name, date), amount)| ScrapEntry {
                    order,
                    machine_name,
                    date,
                    amount,
                })
                .collect()
        }
    };

    ScrapAggregate { entries, skipped }
}

pub fn build_scrap_records(aggregate: &ScrapAggregate, user_id: &str) -> Vec<ScrapRecord> {
    aggregate
        .entries
        .iter()
        .map(|e| ScrapRecord {
            user_id: user_id.to_string(),
            machine_name: e.machine_name.clone(),
            bab_number: e.order.clone(),
            scrap_amount: e.amount,
            scrap_date: e.date,
        })
        .collect()
}

// ==========================================
// 新机台发现
// ==========================================

/// 输入行中出现的机台名（含日期或数值无效、未进入聚合的行）
pub fn observed_machines(rows: &[ResolvedRow]) -> BTreeSet<String> {
    rows.iter().filter_map(|row| row.machine.clone()).collect()
}

/// 观测到但尚未登记的机台（有序）
pub fn discover_machines(observed: &BTreeSet<String>, existing: &HashSet<String>) -> Vec<String> {
    observed
        .iter()
        .filter(|name| !existing.contains(*name))
        .cloned()
        .collect()
}

// ==========================================
// 行去重键
// ==========================================
// 尽力而为: 优先 lfd_nr 列，否则以 日期_工时_机台_订单 拼接；不保证唯一
pub fn fallback_row_key(record: &RecordRow, mapping: &ColumnMapping) -> String {
    if let Some(id) = record.get(ROW_ID_COLUMN).map(cell_to_text).filter(|s| !s.is_empty()) {
        return id;
    }

    let part = |key: &str| {
        mapping
            .resolve(record, key)
            .map(|c| c.to_string())
            .unwrap_or_default()
    };
    format!(
        "{}_{}_{}_{}",
        part(fields::DATE),
        part(fields::HOURS),
        part(fields::MACHINE_NAME),
        part(fields::ORDER_NUMBER)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn row(machine: Option<&str>, date: Option<NaiveDate>) -> ResolvedRow {
        ResolvedRow {
            machine: machine.map(str::to_string),
            date,
            ..Default::default()
        }
    }

    #[test]
    fn test_direct_column_hours_are_summed_per_machine_day() {
        let rows = vec![
            ResolvedRow { hours: Some(3.5), ..row(Some("M1"), Some(day(15))) },
            ResolvedRow { hours: Some(4.0), ..row(Some("M1"), Some(day(15))) },
            ResolvedRow { hours: Some(1.0), ..row(Some("M1"), Some(day(16))) },
        ];

        let agg = aggregate_hours(&rows, HoursRule::DirectColumn);
        assert_eq!(agg.machine_days.len(), 2);
        assert_eq!(agg.machine_days[&("M1".to_string(), day(15))], 7.5);
    }

    #[test]
    fn test_setup_plus_production_minutes() {
        let rows = vec![
            ResolvedRow {
                setup_minutes: Some(30.0),
                production_minutes: Some(60.0),
                ..row(Some("M1"), Some(day(15)))
            },
            ResolvedRow { production_minutes: Some(30.0), ..row(Some("M1"), Some(day(15))) },
        ];

        let agg = aggregate_hours(&rows, HoursRule::SetupPlusProduction);
        assert_eq!(agg.machine_days[&("M1".to_string(), day(15))], 2.0);
    }

    #[test]
    fn test_order_grouped_minutes_drops_non_positive_groups() {
        let rows = vec![
            ResolvedRow {
                setup_minutes: Some(60.0),
                order: Some("BA1".into()),
                ..row(Some("M1"), Some(day(15)))
            },
            ResolvedRow {
                setup_minutes: Some(-30.0),
                order: Some("BA2".into()),
                ..row(Some("M1"), Some(day(15)))
            },
            ResolvedRow { setup_minutes: Some(60.0), ..row(Some("M1"), Some(day(15))) },
        ];

        let agg = aggregate_hours(&rows, HoursRule::OrderGroupedMinutes);
        assert_eq!(agg.machine_days[&("M1".to_string(), day(15))], 1.0);
        assert_eq!(agg.skipped.no_order, 1);
    }

    #[test]
    fn test_unknown_machine_and_missing_date_are_skipped() {
        let mut unknown = row(None, Some(day(15)));
        unknown.hours = Some(2.0);
        unknown.scrap = Some(4.0);
        let mut undated = row(Some("M1"), None);
        undated.hours = Some(2.0);

        let rows = vec![unknown, undated];
        let hours = aggregate_hours(&rows, HoursRule::DirectColumn);
        let scrap = aggregate_scrap(&rows, ScrapGrouping::OrderMachineDay);

        assert!(hours.machine_days.is_empty());
        assert_eq!(hours.skipped.no_machine, 1);
        assert_eq!(hours.skipped.no_date, 1);
        assert!(scrap.entries.is_empty());
    }

    #[test]
    fn test_scrap_excludes_zero_and_negative_amounts() {
        let rows = vec![
            ResolvedRow { scrap: Some(0.0), ..row(Some("M1"), Some(day(15))) },
            ResolvedRow { scrap: Some(-5.0), ..row(Some("M1"), Some(day(15))) },
            ResolvedRow { scrap: Some(2.0), ..row(Some("M1"), Some(day(15))) },
        ];

        let agg = aggregate_scrap(&rows, ScrapGrouping::OrderMachineDay);
        assert_eq!(agg.entries.len(), 1);
        assert_eq!(agg.entries[0].amount, 2.0);
        assert_eq!(agg.entries[0].order, UNKNOWN);
        assert_eq!(agg.skipped.non_positive_scrap, 2);
    }

    #[test]
    fn test_scrap_grouping_modes() {
        let rows = vec![
            ResolvedRow { scrap: Some(2.0), order: Some("BA1".into()), ..row(Some("M1"), Some(day(15))) },
            ResolvedRow { scrap: Some(3.0), order: Some("BA1".into()), ..row(Some("M1"), Some(day(15))) },
            ResolvedRow { scrap: Some(1.0), order: Some("BA2".into()), ..row(Some("M1"), Some(day(15))) },
        ];

        let grouped = aggregate_scrap(&rows, ScrapGrouping::OrderMachineDay);
        assert_eq!(grouped.entries.len(), 2);
        assert_eq!(grouped.entries[0].amount, 5.0);

        let per_row = aggregate_scrap(&rows, ScrapGrouping::PerRow);
        assert_eq!(per_row.entries.len(), 3);
    }

    #[test]
    fn test_discovery_only_returns_new_machines() {
        let observed: BTreeSet<String> = ["M1", "M2"].iter().map(|s| s.to_string()).collect();
        let existing: HashSet<String> = ["M1".to_string()].into_iter().collect();

        assert_eq!(discover_machines(&observed, &existing), vec!["M2".to_string()]);
    }

    #[test]
    fn test_observed_machines_include_rows_without_date() {
        let rows = vec![
            ResolvedRow { hours: Some(2.0), ..row(Some("M1"), Some(day(15))) },
            ResolvedRow { hours: Some(2.0), ..row(Some("M3"), None) },
            ResolvedRow { hours: Some(2.0), ..row(None, Some(day(15))) },
        ];
        let agg = aggregate_hours(&rows, HoursRule::DirectColumn);
        assert_eq!(agg.machine_days.len(), 1);

        let observed: Vec<String> = observed_machines(&rows).into_iter().collect();
        assert_eq!(observed, vec!["M1".to_string(), "M3".to_string()]);
    }

    #[test]
    fn test_target_snapshot_defaults_to_zero() {
        let rows = vec![
            ResolvedRow { hours: Some(1.0), ..row(Some("M1"), Some(day(15))) },
            ResolvedRow { hours: Some(1.0), ..row(Some("M9"), Some(day(15))) },
        ];
        let agg = aggregate_hours(&rows, HoursRule::DirectColumn);
        let targets = HashMap::from([("M1".to_string(), 80.0)]);

        let records = build_hours_records(&agg, &targets, "u1");
        assert_eq!(records[0].target_hours, 80.0);
        assert_eq!(records[1].target_hours, 0.0);
    }

    #[test]
    fn test_machine_name_rules() {
        assert_eq!(resolve_machine_name("  M1 "), Some("M1".into()));
        assert_eq!(resolve_machine_name(UNKNOWN), None);
        assert_eq!(resolve_machine_name("   "), None);

        assert_eq!(resolve_machine_name_strict(&RawCell::from("Presse 3")), Some("Presse 3".into()));
        assert_eq!(resolve_machine_name_strict(&RawCell::from("#NV")), None);
        assert_eq!(resolve_machine_name_strict(&RawCell::from("#div/0!")), None);
        assert_eq!(resolve_machine_name_strict(&RawCell::from("4711")), None);
        assert_eq!(resolve_machine_name_strict(&RawCell::Number(4711.0)), None);
        assert_eq!(resolve_machine_name_strict(&RawCell::Null), None);
    }

    #[test]
    fn test_resolved_from_raw_prefers_bab_over_order() {
        let mut record = RecordRow::new();
        record.insert("BAB".into(), RawCell::from(" "));
        record.insert("Auftrag".into(), RawCell::from("A-1"));
        let mapping = ColumnMapping::by_name([(fields::BAB_NUMBER, "BAB"), (fields::ORDER_NUMBER, "Auftrag")]);

        let resolved = ResolvedRow::from_raw(&record, &mapping);
        assert_eq!(resolved.order.as_deref(), Some("A-1"));
        assert_eq!(resolved.machine, None);
    }

    #[test]
    fn test_fallback_row_key() {
        let mapping = ColumnMapping::by_name([
            (fields::DATE, "Datum"),
            (fields::HOURS, "TEG [h]"),
            (fields::MACHINE_NAME, "Ressource"),
        ]);
        let mut record = RecordRow::new();
        record.insert("Datum".into(), RawCell::from("15.01.2024"));
        record.insert("TEG [h]".into(), RawCell::Number(2.5));
        record.insert("Ressource".into(), RawCell::from("M1"));

        assert_eq!(fallback_row_key(&record, &mapping), "15.01.2024_2.5_M1_");

        record.insert(ROW_ID_COLUMN.into(), RawCell::Number(17.0));
        assert_eq!(fallback_row_key(&record, &mapping), "17");
    }
}
