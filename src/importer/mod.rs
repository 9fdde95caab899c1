// ==========================================
// 车间报表看板 - 导入层
// ==========================================
// 流程: 文件解析 → 列映射 → 行校验 → 聚合写入
// 支持: xlsx / xls / csv
// ==========================================

// 模块声明
pub mod aggregation;
pub mod cell_coercion;
pub mod column_mapper;
pub mod error;
pub mod file_parser;
pub mod importer_trait;
pub mod ingestion_pipeline;
pub mod period_hours;
pub mod row_validator;

// 重导出核心类型
pub use aggregation::{ResolvedRow, SkipCounts};
pub use column_mapper::ColumnMapper;
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, FileKind, UniversalFileParser};
pub use ingestion_pipeline::{ImportReport, IngestionPipeline};
pub use period_hours::{compute_period_hours, PeriodHours};
pub use row_validator::RowValidator;

// 重导出 Trait 接口
pub use importer_trait::FileParser;
