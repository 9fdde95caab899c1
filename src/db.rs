// ==========================================
// 车间报表看板 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 + busy_timeout）
// - 集中定义导入相关的六张表与 config_kv
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：foreign_keys 与 busy_timeout 都需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS column_mappings (
          id TEXT PRIMARY KEY,
          user_id TEXT NOT NULL,
          mapping_name TEXT NOT NULL,
          mapping_json TEXT NOT NULL,
          created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_column_mappings_user_created
          ON column_mappings(user_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS excel_data (
          id TEXT PRIMARY KEY,
          user_id TEXT NOT NULL,
          mapping_id TEXT NOT NULL,
          file_name TEXT NOT NULL,
          row_data TEXT NOT NULL,
          uploaded_at TEXT NOT NULL,
          FOREIGN KEY (mapping_id) REFERENCES column_mappings(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_excel_data_mapping
          ON excel_data(mapping_id);

        CREATE TABLE IF NOT EXISTS user_preferences (
          user_id TEXT PRIMARY KEY,
          last_datum_column TEXT,
          last_stunden_teg_column TEXT,
          last_schicht_column TEXT,
          updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS machine_targets (
          machine_name TEXT PRIMARY KEY,
          target_hours_14d REAL NOT NULL DEFAULT 0,
          user_id TEXT,
          created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS machine_hours (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          user_id TEXT NOT NULL,
          machine_name TEXT NOT NULL,
          date TEXT NOT NULL,
          hours_worked REAL NOT NULL,
          target_hours REAL NOT NULL DEFAULT 0,
          updated_at TEXT NOT NULL DEFAULT (datetime('now')),
          UNIQUE(user_id, machine_name, date)
        );

        CREATE TABLE IF NOT EXISTS scrap_data (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          user_id TEXT NOT NULL,
          machine_name TEXT NOT NULL,
          bab_number TEXT NOT NULL,
          scrap_amount REAL NOT NULL,
          scrap_date TEXT NOT NULL,
          created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_scrap_data_key
          ON scrap_data(user_id, machine_name, bab_number, scrap_date);

        CREATE TABLE IF NOT EXISTS config_kv (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL,
          updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )
}
