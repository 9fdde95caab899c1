// ==========================================
// 车间报表看板 - 核心库
// ==========================================
// 系统定位: 车间表格导入（xlsx/csv）→ 列映射 → 行校验 → 工时/废品聚合
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 表格与记录模型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

pub use api::{ApiError, ApiResult, ImportApi};
pub use config::{ConfigManager, ImportConfigReader, ImportSettings};
pub use domain::{ColumnMapping, ColumnRef, FieldSchema, RawCell, RawTable};
pub use importer::{ImportError, ImportReport, IngestionPipeline};
pub use repository::{IngestStore, SqliteIngestStore};

/// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 系统名称
pub const SYSTEM_NAME: &str = "车间报表看板";
