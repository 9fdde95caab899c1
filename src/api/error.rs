// ==========================================
// 车间报表看板 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换导入/仓储错误为面向用户的错误消息
// 说明: 格式错误与后端错误原文透传（界面直接展示）
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入错误（阻断流程）
    // ==========================================
    /// 文件格式错误，原文展示
    #[error("{0}")]
    FileFormat(String),

    /// 映射错误以列表返回，便于一次性修正
    #[error("Spaltenzuordnung ungültig: {}", errors.join("; "))]
    MappingInvalid { errors: Vec<String> },

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("{0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("{0}")]
    Timeout(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("配置读取失败: {0}")]
    ConfigError(String),

    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::Other(e) => ApiError::Other(e),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::UnsupportedFormat(_)
            | ImportError::EmptyFile(_)
            | ImportError::FileReadError(_)
            | ImportError::ExcelParseError(_)
            | ImportError::CsvParseError(_) => ApiError::FileFormat(err.to_string()),
            ImportError::MappingInvalid { errors } => ApiError::MappingInvalid { errors },
            ImportError::MappingIncomplete(_) => ApiError::InvalidInput(err.to_string()),
            ImportError::NoStoredMapping | ImportError::NoStoredRows => {
                ApiError::NotFound(err.to_string())
            }
            ImportError::Persistence(e) => ApiError::from(e),
            ImportError::BackendTimeout { .. } => ApiError::Timeout(err.to_string()),
            ImportError::InternalError(msg) => ApiError::InternalError(msg),
            ImportError::Other(e) => ApiError::Other(e),
        }
    }
}

/// API层Result类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_errors_pass_through_verbatim() {
        let err = ApiError::from(ImportError::EmptyFile("CSV-Datei ist leer".into()));
        assert_eq!(err.to_string(), "CSV-Datei ist leer");
    }

    #[test]
    fn test_mapping_errors_stay_a_list() {
        let err = ApiError::from(ImportError::MappingInvalid {
            errors: vec!["a".into(), "b".into()],
        });
        match err {
            ApiError::MappingInvalid { errors } => assert_eq!(errors.len(), 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_persistence_error_keeps_backend_text() {
        let err = ApiError::from(ImportError::Persistence(RepositoryError::DatabaseQueryError(
            "disk I/O error".into(),
        )));
        assert!(matches!(err, ApiError::DatabaseError(ref msg) if msg.contains("disk I/O error")));
    }
}
