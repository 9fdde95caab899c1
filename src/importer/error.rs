// ==========================================
// 车间报表看板 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 面向用户的消息保持德语（与前端一致）
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("Nicht unterstütztes Dateiformat. Bitte .xlsx, .xls oder .csv verwenden. ({0})")]
    UnsupportedFormat(String),

    #[error("{0}")]
    EmptyFile(String),

    #[error("Fehler beim Lesen der Datei: {0}")]
    FileReadError(String),

    #[error("Excel-Datei konnte nicht gelesen werden: {0}")]
    ExcelParseError(String),

    #[error("CSV-Datei konnte nicht gelesen werden: {0}")]
    CsvParseError(String),

    // ===== 映射错误 =====
    #[error("Spaltenzuordnung ungültig: {}", errors.join("; "))]
    MappingInvalid { errors: Vec<String> },

    #[error("Unvollständige Spaltenzuordnung: {0}")]
    MappingIncomplete(String),

    #[error("Keine gespeicherte Spaltenzuordnung gefunden")]
    NoStoredMapping,

    #[error("Keine gespeicherten Excel-Daten gefunden")]
    NoStoredRows,

    // ===== 持久化错误 =====
    #[error(transparent)]
    Persistence(#[from] RepositoryError),

    #[error("Zeitüberschreitung beim Schritt '{step}' nach {timeout_ms} ms")]
    BackendTimeout { step: String, timeout_ms: u64 },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
