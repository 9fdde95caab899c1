// ==========================================
// 车间报表看板 - 校验结果模型
// ==========================================
// 用途: 列映射校验结果 + 逐行类型校验结果 + 汇总
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// MappingValidation - 列映射校验结果
// ==========================================
// is_valid 仅取决于 errors；warnings 不阻断
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

// ==========================================
// TypedValue - 类型转换后的字段值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    Null,
    Number(f64),
    Text(String),
    Date(#[serde(with = "crate::domain::table::date_tag")] NaiveDateTime),
}

impl TypedValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TypedValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            TypedValue::Date(d) => Some(d.date()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TypedValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }
}

// ==========================================
// ValidatedRow - 校验后的行
// ==========================================
// row_index: 1 起始，含表头偏移（第一条数据行 = 2）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRow {
    pub row_index: usize,
    pub values: BTreeMap<String, TypedValue>,
    pub errors: Vec<String>,
}

impl ValidatedRow {
    pub fn new(row_index: usize) -> Self {
        Self {
            row_index,
            values: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// 无校验错误即有效
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, field_key: &str) -> Option<&TypedValue> {
        self.values.get(field_key)
    }
}

// ==========================================
// ValidationSummary - 校验汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub errors: Vec<String>,
}

impl ValidationSummary {
    /// 前 n 条错误 + 剩余条数（用于 "+K weitere" 展示）
    pub fn preview_errors(&self, n: usize) -> (&[String], usize) {
        let shown = n.min(self.errors.len());
        (&self.errors[..shown], self.errors.len() - shown)
    }
}
