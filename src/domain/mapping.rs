// ==========================================
// 车间报表看板 - 列映射模型
// ==========================================
// 职责: 字段 key → 列引用（按列序号 或 按列名）
// 说明: 两种寻址方式统一通过 RowAccess 解析，校验/聚合逻辑只写一次
// ==========================================

use crate::domain::table::RawCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// ColumnRef - 列引用
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    /// 从 0 开始的列序号
    Index(usize),
    /// 表头列名
    Name(String),
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Index(i) => write!(f, "{}", i),
            ColumnRef::Name(n) => write!(f, "{}", n),
        }
    }
}

// ==========================================
// RowAccess - 行访问接口
// ==========================================
// 实现者: TableRow（解析表格的一行）, RecordRow（归档的 key→value 行）
pub trait RowAccess {
    fn cell_at(&self, index: usize) -> Option<&RawCell>;
    fn cell_named(&self, name: &str) -> Option<&RawCell>;
}

/// 表格中的一行（带表头，可按序号或列名访问）
#[derive(Debug, Clone, Copy)]
pub struct TableRow<'a> {
    pub headers: &'a [String],
    pub cells: &'a [RawCell],
}

impl<'a> TableRow<'a> {
    pub fn new(headers: &'a [String], cells: &'a [RawCell]) -> Self {
        Self { headers, cells }
    }
}

impl RowAccess for TableRow<'_> {
    fn cell_at(&self, index: usize) -> Option<&RawCell> {
        self.cells.get(index)
    }

    fn cell_named(&self, name: &str) -> Option<&RawCell> {
        self.headers
            .iter()
            .position(|h| h == name)
            .and_then(|idx| self.cells.get(idx))
    }
}

/// 归档行（excel_data.row_data），只能按列名访问
pub type RecordRow = BTreeMap<String, RawCell>;

impl RowAccess for RecordRow {
    fn cell_at(&self, _index: usize) -> Option<&RawCell> {
        None
    }

    fn cell_named(&self, name: &str) -> Option<&RawCell> {
        self.get(name)
    }
}

// ==========================================
// ColumnMapping - 列映射
// ==========================================
// 允许两个字段映射到同一列（仅产生警告）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub entries: BTreeMap<String, ColumnRef>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_index<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, usize)>,
        K: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, i)| (k.into(), ColumnRef::Index(i)))
                .collect(),
        }
    }

    pub fn by_name<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, n)| (k.into(), ColumnRef::Name(n.into())))
                .collect(),
        }
    }

    pub fn set(&mut self, field_key: &str, column: ColumnRef) {
        self.entries.insert(field_key.to_string(), column);
    }

    pub fn unset(&mut self, field_key: &str) {
        self.entries.remove(field_key);
    }

    pub fn get(&self, field_key: &str) -> Option<&ColumnRef> {
        self.entries.get(field_key)
    }

    pub fn is_mapped(&self, field_key: &str) -> bool {
        self.entries.contains_key(field_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ColumnRef)> {
        self.entries.iter()
    }

    /// 读取某字段在该行的原始单元格（未映射或越界返回 None）
    pub fn resolve<'r, R: RowAccess + ?Sized>(
        &self,
        row: &'r R,
        field_key: &str,
    ) -> Option<&'r RawCell> {
        match self.entries.get(field_key)? {
            ColumnRef::Index(idx) => row.cell_at(*idx),
            ColumnRef::Name(name) => row.cell_named(name),
        }
    }

    /// 列引用 → 列序号（按列名时在表头中查找）
    pub fn column_index(&self, field_key: &str, headers: &[String]) -> Option<usize> {
        match self.entries.get(field_key)? {
            ColumnRef::Index(idx) => Some(*idx),
            ColumnRef::Name(name) => headers.iter().position(|h| h == name),
        }
    }

    /// 转换为按列名寻址（用于保存映射）；越界的序号被丢弃
    pub fn to_named(&self, headers: &[String]) -> ColumnMapping {
        let entries = self
            .entries
            .iter()
            .filter_map(|(key, column)| {
                let name = match column {
                    ColumnRef::Index(idx) => headers.get(*idx)?.clone(),
                    ColumnRef::Name(name) => name.clone(),
                };
                Some((key.clone(), ColumnRef::Name(name)))
            })
            .collect();

        ColumnMapping { entries }
    }

    /// 按列名寻址时的列名
    pub fn column_name(&self, field_key: &str) -> Option<&str> {
        match self.entries.get(field_key)? {
            ColumnRef::Name(name) => Some(name.as_str()),
            ColumnRef::Index(_) => None,
        }
    }
}
