// ==========================================
// 车间报表看板 - 持久化记录模型
// ==========================================
// 对齐: db.rs 中的表结构
// column_mappings / excel_data / user_preferences /
// machine_targets / machine_hours / scrap_data
// ==========================================

use crate::domain::mapping::{ColumnMapping, RecordRow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// MachineHoursRecord - 机台日工时
// ==========================================
// 唯一键: (user_id, machine_name, date)，写入方式为 upsert（覆盖而非累加）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineHoursRecord {
    pub user_id: String,
    pub machine_name: String,
    pub date: NaiveDate,
    pub hours_worked: f64,
    pub target_hours: f64, // 机台 14 天目标工时快照
}

// ==========================================
// ScrapRecord - 废品记录
// ==========================================
// 无唯一约束；默认纯插入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapRecord {
    pub user_id: String,
    pub machine_name: String,
    pub bab_number: String,
    pub scrap_amount: f64,
    pub scrap_date: NaiveDate,
}

// ==========================================
// MachineTarget - 机台目标工时
// ==========================================
// 自然键: machine_name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineTarget {
    pub machine_name: String,
    pub target_hours_14d: f64,
    pub user_id: Option<String>,
}

// ==========================================
// StoredColumnMapping - 已保存的列映射
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredColumnMapping {
    pub id: String,
    pub user_id: String,
    pub mapping_name: String,
    pub mapping: ColumnMapping,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// ExcelDataRow - 原始行归档
// ==========================================
// 追加写入，用于后续回填（backfill）与周期统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcelDataRow {
    pub id: String,
    pub user_id: String,
    pub mapping_id: String,
    pub file_name: String,
    pub row_data: RecordRow,
    pub uploaded_at: DateTime<Utc>,
}

// ==========================================
// UserPreferences - 用户映射偏好
// ==========================================
// 每用户至多一条：存在则更新，否则插入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: String,
    pub last_datum_column: Option<String>,
    pub last_stunden_teg_column: Option<String>,
    pub last_schicht_column: Option<String>,
}
