// ==========================================
// 车间报表看板 - 行校验器实现
// ==========================================
// 阶段 2: 原始行 + 列映射 + 字段类型 → ValidatedRow
// 红线: 单元格错误只累积到行上，从不中断整批；输出行数 = 输入行数
// ==========================================

use crate::domain::mapping::{ColumnMapping, RecordRow, RowAccess, TableRow};
use crate::domain::table::{RawCell, RawTable};
use crate::domain::types::{FieldType, RowFilter};
use crate::domain::validation::{TypedValue, ValidatedRow, ValidationSummary};
use crate::importer::cell_coercion::{cell_to_text, parse_date, parse_number};
use std::collections::HashMap;
use tracing::debug;

/// 表头占第 1 行，第一条数据行为第 2 行
const HEADER_ROW_OFFSET: usize = 2;

pub struct RowValidator;

impl RowValidator {
    /// 校验单行；未声明类型的字段按文本处理
    pub fn validate_row<R: RowAccess + ?Sized>(
        row: &R,
        row_index: usize,
        mapping: &ColumnMapping,
        field_types: &HashMap<String, FieldType>,
    ) -> ValidatedRow {
        let mut validated = ValidatedRow::new(row_index);

        for (field, _) in mapping.iter() {
            let raw = mapping.resolve(row, field).unwrap_or(&RawCell::Null);
            let field_type = field_types.get(field).copied().unwrap_or(FieldType::String);
            let blank = cell_to_text(raw).is_empty();

            let value = match field_type {
                FieldType::Number => match parse_number(raw) {
                    Some(n) => TypedValue::Number(n),
                    None => {
                        if !blank {
                            validated.errors.push(format!(
                                "Zeile {}, Feld \"{}\": Ungültiger Zahlenwert \"{}\"",
                                row_index, field, raw
                            ));
                        }
                        TypedValue::Null
                    }
                },
                FieldType::Date => match parse_date(raw) {
                    Some(d) => TypedValue::Date(d),
                    None => {
                        if !blank {
                            validated.errors.push(format!(
                                "Zeile {}, Feld \"{}\": Ungültiges Datum \"{}\"",
                                row_index, field, raw
                            ));
                        }
                        TypedValue::Null
                    }
                },
                FieldType::String => TypedValue::Text(cell_to_text(raw)),
            };

            validated.values.insert(field.clone(), value);
        }

        validated
    }

    /// 校验解析后的表格（序号或列名寻址均可）
    pub fn validate_table(
        table: &RawTable,
        mapping: &ColumnMapping,
        field_types: &HashMap<String, FieldType>,
    ) -> Vec<ValidatedRow> {
        let rows: Vec<ValidatedRow> = table
            .rows
            .iter()
            .enumerate()
            .map(|(i, cells)| {
                let row = TableRow::new(&table.headers, cells);
                Self::validate_row(&row, i + HEADER_ROW_OFFSET, mapping, field_types)
            })
            .collect();

        debug!(
            rows = rows.len(),
            invalid = rows.iter().filter(|r| !r.is_valid()).count(),
            "行校验完成"
        );
        rows
    }

    /// 校验归档行（仅列名寻址）
    pub fn validate_records(
        records: &[RecordRow],
        mapping: &ColumnMapping,
        field_types: &HashMap<String, FieldType>,
    ) -> Vec<ValidatedRow> {
        records
            .iter()
            .enumerate()
            .map(|(i, record)| Self::validate_row(record, i + HEADER_ROW_OFFSET, mapping, field_types))
            .collect()
    }

    /// 汇总（纯归约）
    pub fn summarize(rows: &[ValidatedRow]) -> ValidationSummary {
        let valid_rows = rows.iter().filter(|r| r.is_valid()).count();
        ValidationSummary {
            total_rows: rows.len(),
            valid_rows,
            invalid_rows: rows.len() - valid_rows,
            errors: rows.iter().flat_map(|r| r.errors.iter().cloned()).collect(),
        }
    }

    /// 按导入策略筛选行
    pub fn filter_rows(rows: &[ValidatedRow], filter: RowFilter) -> Vec<&ValidatedRow> {
        rows.iter()
            .filter(|r| match filter {
                RowFilter::ValidOnly => r.is_valid(),
                RowFilter::All => true,
            })
            .collect()
    }
}
