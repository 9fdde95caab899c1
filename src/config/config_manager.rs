// ==========================================
// 车间报表看板 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value)
// 说明: 值格式错误时记录告警并回退默认值，不阻断导入
// ==========================================

use crate::config::import_config_trait::{
    ConfigResult, ImportConfigReader, DEFAULT_BACKEND_TIMEOUT_MS, DEFAULT_PREVIEW_ROWS,
};
use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::domain::types::{
    HoursRule, PeriodTargets, RowFilter, ScrapGrouping, ScrapPersistMode, TargetPeriod,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA 并确保表存在（幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            configure_sqlite_connection(&guard)?;
            init_schema(&guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入配置值（存在则覆盖）
    pub fn set_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&config_map)?)
    }

    /// 读取并解析配置；缺失用默认值，格式错误告警后用默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr,
    {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };

        match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!(config_key = key, raw_value = %raw, "配置值格式错误，使用默认值");
                Ok(default)
            }
        }
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_hours_rule(&self) -> ConfigResult<HoursRule> {
        self.get_parsed_or_default(config_keys::HOURS_RULE, HoursRule::default())
    }

    async fn get_scrap_grouping(&self) -> ConfigResult<ScrapGrouping> {
        self.get_parsed_or_default(config_keys::SCRAP_GROUPING, ScrapGrouping::default())
    }

    async fn get_scrap_persist_mode(&self) -> ConfigResult<ScrapPersistMode> {
        self.get_parsed_or_default(config_keys::SCRAP_PERSIST_MODE, ScrapPersistMode::default())
    }

    async fn get_row_filter(&self) -> ConfigResult<RowFilter> {
        self.get_parsed_or_default(config_keys::ROW_FILTER, RowFilter::default())
    }

    async fn get_backend_timeout_ms(&self) -> ConfigResult<u64> {
        let value =
            self.get_parsed_or_default(config_keys::BACKEND_TIMEOUT_MS, DEFAULT_BACKEND_TIMEOUT_MS)?;
        // 0 会让每次调用立即超时
        Ok(if value == 0 { DEFAULT_BACKEND_TIMEOUT_MS } else { value })
    }

    async fn get_preview_rows(&self) -> ConfigResult<usize> {
        self.get_parsed_or_default(config_keys::PREVIEW_ROWS, DEFAULT_PREVIEW_ROWS)
    }

    async fn get_base_target_hours(&self) -> ConfigResult<f64> {
        self.get_parsed_or_default(
            config_keys::BASE_TARGET_HOURS,
            PeriodTargets::default().base_target_hours,
        )
    }

    async fn get_target_multiplier(&self, period: TargetPeriod) -> ConfigResult<f64> {
        let key = format!("{}{}", config_keys::TARGET_MULTIPLIER_PREFIX, period);
        self.get_parsed_or_default(&key, PeriodTargets::default().multiplier(period))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 聚合规则
    pub const HOURS_RULE: &str = "hours_rule";
    pub const SCRAP_GROUPING: &str = "scrap_grouping";
    pub const SCRAP_PERSIST_MODE: &str = "scrap_persist_mode";
    pub const ROW_FILTER: &str = "row_filter";

    // 运行参数
    pub const BACKEND_TIMEOUT_MS: &str = "backend_timeout_ms";
    pub const PREVIEW_ROWS: &str = "preview_rows";

    // 周期目标
    pub const BASE_TARGET_HOURS: &str = "base_target_hours";
    pub const TARGET_MULTIPLIER_PREFIX: &str = "target_multiplier/"; // + hours_14d / hours_week_3_4 / hours_8_weeks
}
