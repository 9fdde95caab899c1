// ==========================================
// 车间报表看板 - 原始表格模型
// ==========================================
// 用途: 文件解析产物（表头 + 列字母 + 原始数据行）
// 生命周期: 每次上传生成一次，解析后不可变，导入完成即丢弃
// ==========================================

use crate::domain::mapping::RecordRow;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// RawCell - 原始单元格
// ==========================================
// 序列化为 JSON 原生值（null / number / string），用于 excel_data.row_data 归档
// 日期写成 {"date": "..."}，读回时不会与文本混淆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCell {
    Null,
    Number(f64),
    Text(String),
    Date(#[serde(with = "date_tag")] NaiveDateTime),
}

/// 日期值的带标记 JSON 形式
pub(crate) mod date_tag {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Tagged {
        date: NaiveDateTime,
    }

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        Tagged { date: *value }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        Ok(Tagged::deserialize(deserializer)?.date)
    }
}

impl RawCell {
    /// null 或空字符串
    pub fn is_blank(&self) -> bool {
        match self {
            RawCell::Null => true,
            RawCell::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawCell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        RawCell::Text(value.to_string())
    }
}

impl From<f64> for RawCell {
    fn from(value: f64) -> Self {
        RawCell::Number(value)
    }
}

impl From<NaiveDateTime> for RawCell {
    fn from(value: NaiveDateTime) -> Self {
        RawCell::Date(value)
    }
}

/// 数值展示：整数不带小数点（7 而不是 7.0）
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl fmt::Display for RawCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawCell::Null => Ok(()),
            RawCell::Number(n) => write!(f, "{}", format_number(*n)),
            RawCell::Text(s) => write!(f, "{}", s),
            RawCell::Date(d) => write!(f, "{}", d.format("%d.%m.%Y")),
        }
    }
}

/// 列序号 → 表格列字母（0 → A, 25 → Z, 26 → AA）
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index as i64;
    while n >= 0 {
        letters.push((b'A' + (n % 26) as u8) as char);
        n = n / 26 - 1;
    }
    letters.iter().rev().collect()
}

// ==========================================
// RawTable - 原始表格
// ==========================================
// 不变式: 每行单元格数 == headers.len()（读取时补齐/截断）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub column_letters: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

impl RawTable {
    /// 构造表格并按表头宽度规整每一行
    pub fn new(headers: Vec<String>, rows: Vec<Vec<RawCell>>) -> Self {
        let width = headers.len();
        let column_letters = (0..width).map(column_letter).collect();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, RawCell::Null);
                row
            })
            .collect();

        Self {
            headers,
            column_letters,
            rows,
        }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 预览行（前 n 行）
    pub fn preview_rows(&self, n: usize) -> &[Vec<RawCell>] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn all_rows(&self) -> &[Vec<RawCell>] {
        &self.rows
    }

    /// 表头名 → 列序号（重复表头取第一个）
    pub fn header_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// 转为 列名 → 值 的归档行；空表头用列字母代替，重复表头保留第一列
    pub fn to_records(&self) -> Vec<RecordRow> {
        self.rows
            .iter()
            .map(|cells| {
                let mut record = RecordRow::new();
                for (idx, cell) in cells.iter().enumerate() {
                    let key = match self.headers[idx].as_str() {
                        "" => self.column_letters[idx].clone(),
                        name => name.to_string(),
                    };
                    record.entry(key).or_insert_with(|| cell.clone());
                }
                record
            })
            .collect()
    }
}
