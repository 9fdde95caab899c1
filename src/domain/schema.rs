// ==========================================
// 车间报表看板 - 业务字段 Schema
// ==========================================
// 职责: 定义导入目标字段（key / 标签 / 必填 / 类型）及自动识别关键字
// 说明: Schema 由调用方选择，管道内不可变
// ==========================================

use crate::domain::types::FieldType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 标准字段 key
pub mod fields {
    pub const MACHINE_NAME: &str = "machine_name";
    pub const DATE: &str = "date";
    pub const HOURS: &str = "hours";
    pub const SETUP_TIME: &str = "setup_time";
    pub const PRODUCTION_TIME: &str = "production_time";
    pub const SCRAP_AMOUNT: &str = "scrap_amount";
    pub const BAB_NUMBER: &str = "bab_number";
    pub const ORDER_NUMBER: &str = "order_number";
    pub const AFO_NUMMER: &str = "afo_nummer";
    pub const GOOD_QUANTITY: &str = "good_quantity";
}

/// 字段自动识别关键字（小写，按优先级排序）
pub fn field_keywords(field_key: &str) -> &'static [&'static str] {
    match field_key {
        fields::MACHINE_NAME => &["maschine", "machine", "ressource", "resource"],
        fields::DATE => &["datum", "date", "jahr/monat", "monat", "periode"],
        fields::HOURS => &["teg [h]", "teg", "stunden", "hours", "zeit"],
        fields::SETUP_TIME => &["rüstzeit", "ruestzeit", "setup time", "rüsten"],
        fields::PRODUCTION_TIME => &["serienzeit", "zeit pro stück", "production time", "cycle time"],
        fields::SCRAP_AMOUNT => &["ausschuss", "scrap", "ausschussmenge", "menge"],
        fields::BAB_NUMBER => &["bab", "betriebsauftrag", "ba", "work order", "auftrag"],
        fields::ORDER_NUMBER => &["auftragsnummer", "ba-kürzel", "auftrag", "order", "ba"],
        fields::AFO_NUMMER => &["afo", "afo-nummer", "arbeitsfolge", "operation"],
        fields::GOOD_QUANTITY => &["menge gut", "gut", "good quantity", "quantity"],
        _ => &[],
    }
}

// ==========================================
// FieldSchemaEntry - 单个字段定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchemaEntry {
    pub key: String,
    pub label: String,
    pub required: bool,
    pub field_type: FieldType,
}

impl FieldSchemaEntry {
    pub fn new(key: &str, label: &str, required: bool, field_type: FieldType) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            required,
            field_type,
        }
    }
}

// ==========================================
// FieldSchema - 字段集合
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub entries: Vec<FieldSchemaEntry>,
}

impl FieldSchema {
    pub fn new(entries: Vec<FieldSchemaEntry>) -> Self {
        Self { entries }
    }

    /// 分步导入向导使用的 Schema（工时由 Rüstzeit + Serienzeit 分钟数推导）
    pub fn machine_minutes() -> Self {
        Self::new(vec![
            FieldSchemaEntry::new(fields::MACHINE_NAME, "Maschinenname", true, FieldType::String),
            FieldSchemaEntry::new(fields::DATE, "Datum", true, FieldType::Date),
            FieldSchemaEntry::new(fields::SETUP_TIME, "Rüstzeit (Minuten)", true, FieldType::Number),
            FieldSchemaEntry::new(fields::PRODUCTION_TIME, "Serienzeit (Minuten)", true, FieldType::Number),
            FieldSchemaEntry::new(fields::SCRAP_AMOUNT, "Ausschussmenge", true, FieldType::Number),
            FieldSchemaEntry::new(fields::BAB_NUMBER, "Betriebsauftrag", true, FieldType::String),
            FieldSchemaEntry::new(fields::ORDER_NUMBER, "Auftragsnummer", true, FieldType::String),
            FieldSchemaEntry::new(fields::AFO_NUMMER, "AFO-Nummer", false, FieldType::String),
            FieldSchemaEntry::new(fields::GOOD_QUANTITY, "Menge gut", false, FieldType::Number),
        ])
    }

    /// 模板文件导入使用的 Schema（TEG [h] / Ausschuss / Datum / Internes BA-Kürzel / Ressource / Menge gut）
    pub fn template_hours() -> Self {
        Self::new(vec![
            FieldSchemaEntry::new(fields::HOURS, "Stunden (TEG)", true, FieldType::Number),
            FieldSchemaEntry::new(fields::SCRAP_AMOUNT, "Ausschussmenge", true, FieldType::Number),
            FieldSchemaEntry::new(fields::DATE, "Datum", true, FieldType::Date),
            FieldSchemaEntry::new(fields::ORDER_NUMBER, "Auftragsnummer", true, FieldType::String),
            FieldSchemaEntry::new(fields::MACHINE_NAME, "Ressource", true, FieldType::String),
            FieldSchemaEntry::new(fields::GOOD_QUANTITY, "Menge gut", false, FieldType::Number),
        ])
    }

    pub fn get(&self, key: &str) -> Option<&FieldSchemaEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key.clone()).collect()
    }

    pub fn required_keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.required)
            .map(|e| e.key.clone())
            .collect()
    }

    pub fn field_types(&self) -> HashMap<String, FieldType> {
        self.entries
            .iter()
            .map(|e| (e.key.clone(), e.field_type))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_minutes_required_fields() {
        let schema = FieldSchema::machine_minutes();
        let required = schema.required_keys();

        assert_eq!(required.len(), 7);
        assert!(required.contains(&fields::SETUP_TIME.to_string()));
        assert!(!required.contains(&fields::AFO_NUMMER.to_string()));
        assert_eq!(schema.field_types()[fields::DATE], FieldType::Date);
    }

    #[test]
    fn test_every_schema_field_has_keywords() {
        for schema in [FieldSchema::machine_minutes(), FieldSchema::template_hours()] {
            for entry in &schema.entries {
                assert!(!field_keywords(&entry.key).is_empty(), "{}", entry.key);
            }
        }
    }
}
