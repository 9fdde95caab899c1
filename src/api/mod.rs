// ==========================================
// 车间报表看板 - API 层
// ==========================================
// 职责: 导入向导流程接口，供 CLI / 前端调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{
    FilePreview, ImportApi, MachineImportResponse, RowValidationResponse, TemplateImportResponse,
};
