// ==========================================
// 车间报表看板 - 导入组件 Trait
// ==========================================
// 职责: 定义导入管道各阶段接口（不包含实现）
// ==========================================

use crate::domain::table::RawTable;
use crate::importer::error::ImportResult;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（阶段 0）
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件内容为 RawTable
    ///
    /// # 返回
    /// - Ok(RawTable): 表头 + 列字母 + 数据行
    /// - Err: EmptyFile / 格式错误
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<RawTable>;
}
