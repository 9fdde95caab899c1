// ==========================================
// 车间报表看板 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 持久化与身份上下文（当前用户 + 六张业务表）
// 约束: 所有查询使用参数化
// ==========================================

pub mod error;
pub mod ingest_store;
pub mod sqlite_store;

pub use error::{RepositoryError, RepositoryResult};
pub use ingest_store::IngestStore;
pub use sqlite_store::SqliteIngestStore;
