// ==========================================
// 车间报表看板 - 领域模型层
// ==========================================
// 职责: 表格、字段 Schema、列映射、校验结果、持久化记录
// 红线: 不含数据访问逻辑，不含导入流程
// ==========================================

pub mod mapping;
pub mod records;
pub mod schema;
pub mod table;
pub mod types;
pub mod validation;

// 重导出核心类型
pub use mapping::{ColumnMapping, ColumnRef, RecordRow, RowAccess, TableRow};
pub use records::{
    ExcelDataRow, MachineHoursRecord, MachineTarget, ScrapRecord, StoredColumnMapping,
    UserPreferences,
};
pub use schema::{fields, FieldSchema, FieldSchemaEntry};
pub use table::{column_letter, RawCell, RawTable};
pub use types::{
    FieldType, HoursRule, PeriodTargets, RowFilter, ScrapGrouping, ScrapPersistMode, TargetPeriod,
};
pub use validation::{MappingValidation, TypedValue, ValidatedRow, ValidationSummary};
