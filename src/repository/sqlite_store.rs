// ==========================================
// 车间报表看板 - 导入持久化 SQLite 实现
// ==========================================
// 职责: 实现 IngestStore（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 并发: Arc<Mutex<Connection>>；SQL 在 spawn_blocking 中执行，批量写入在单个事务内完成
// ==========================================

use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::domain::mapping::{ColumnMapping, RecordRow};
use crate::domain::records::{
    ExcelDataRow, MachineHoursRecord, MachineTarget, ScrapRecord, StoredColumnMapping,
    UserPreferences,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ingest_store::IngestStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

// ==========================================
// SqliteIngestStore
// ==========================================
pub struct SqliteIngestStore {
    conn: Arc<Mutex<Connection>>,
    user_id: String,
}

impl SqliteIngestStore {
    /// 打开数据库文件并确保表存在
    pub fn new(db_path: &str, user_id: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(format!("{}: {}", db_path, e)))?;
        Self::from_connection(Arc::new(Mutex::new(conn)), user_id)
    }

    /// 从已有连接创建（与 ConfigManager 共享连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>, user_id: &str) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            init_schema(&guard)?;
        }
        Ok(Self {
            conn,
            user_id: user_id.to_string(),
        })
    }

    /// 共享连接句柄
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在阻塞线程池上执行同步 SQL，调用方的超时可在等待期间生效
    ///
    /// 超时后已派发的任务不会被取消，仍会执行完毕
    async fn run_blocking<T, F>(&self, op: F) -> RepositoryResult<T>
    where
        F: FnOnce(&mut Connection) -> RepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            op(&mut *guard)
        })
        .await
        .map_err(|e| RepositoryError::InternalError(format!("阻塞任务失败: {}", e)))?
    }

    // ===== 看板读取 / 设置页写入（管道之外的使用方）=====

    /// 当前用户的机台日工时（按机台、日期排序）
    pub fn list_machine_hours(&self) -> RepositoryResult<Vec<MachineHoursRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, machine_name, date, hours_worked, target_hours
            FROM machine_hours
            WHERE user_id = ?1
            ORDER BY machine_name, date
            "#,
        )?;

        let rows = stmt.query_map(params![self.user_id], |row| {
            Ok(MachineHoursRecord {
                user_id: row.get(0)?,
                machine_name: row.get(1)?,
                date: row.get::<_, NaiveDate>(2)?,
                hours_worked: row.get(3)?,
                target_hours: row.get(4)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// 当前用户的废品记录（按插入顺序）
    pub fn list_scrap_records(&self) -> RepositoryResult<Vec<ScrapRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, machine_name, bab_number, scrap_amount, scrap_date
            FROM scrap_data
            WHERE user_id = ?1
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map(params![self.user_id], |row| {
            Ok(ScrapRecord {
                user_id: row.get(0)?,
                machine_name: row.get(1)?,
                bab_number: row.get(2)?,
                scrap_amount: row.get(3)?,
                scrap_date: row.get::<_, NaiveDate>(4)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// 设置机台目标工时（存在则更新）
    pub fn set_machine_target(&self, machine_name: &str, target_hours_14d: f64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO machine_targets (machine_name, target_hours_14d, user_id)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(machine_name) DO UPDATE SET
                target_hours_14d = excluded.target_hours_14d
            "#,
            params![machine_name, target_hours_14d, self.user_id],
        )?;
        Ok(())
    }
}

// 批量写入的事务边界；开启/提交失败统一归为事务错误
fn begin(conn: &mut Connection) -> RepositoryResult<Transaction<'_>> {
    conn.transaction()
        .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
}

fn commit(tx: Transaction<'_>) -> RepositoryResult<()> {
    tx.commit()
        .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
}

#[async_trait]
impl IngestStore for SqliteIngestStore {
    fn current_user_id(&self) -> &str {
        &self.user_id
    }

    async fn list_machine_targets(&self) -> RepositoryResult<Vec<MachineTarget>> {
        self.run_blocking(|conn| {
            let mut stmt = conn.prepare(
                "SELECT machine_name, target_hours_14d, user_id FROM machine_targets ORDER BY machine_name",
            )?;

            let rows = stmt.query_map([], |row| {
                Ok(MachineTarget {
                    machine_name: row.get(0)?,
                    target_hours_14d: row.get(1)?,
                    user_id: row.get(2)?,
                })
            })?;

            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn insert_machine_targets(&self, targets: Vec<MachineTarget>) -> RepositoryResult<usize> {
        self.run_blocking(move |conn| {
            let tx = begin(conn)?;

            let mut inserted = 0;
            {
                // 设置页可能并发登记同名机台，冲突时保留已有目标
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO machine_targets (machine_name, target_hours_14d, user_id)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(machine_name) DO NOTHING
                    "#,
                )?;
                for target in &targets {
                    inserted += stmt.execute(params![
                        target.machine_name,
                        target.target_hours_14d,
                        target.user_id,
                    ])?;
                }
            }

            commit(tx)?;
            debug!(requested = targets.len(), inserted, "machine_targets 写入完成");
            Ok(inserted)
        })
        .await
    }

    async fn upsert_machine_hours(
        &self,
        records: Vec<MachineHoursRecord>,
    ) -> RepositoryResult<usize> {
        self.run_blocking(move |conn| {
            let tx = begin(conn)?;

            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO machine_hours (user_id, machine_name, date, hours_worked, target_hours, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
                    ON CONFLICT(user_id, machine_name, date) DO UPDATE SET
                        hours_worked = excluded.hours_worked,
                        target_hours = excluded.target_hours,
                        updated_at = excluded.updated_at
                    "#,
                )?;
                for record in &records {
                    stmt.execute(params![
                        record.user_id,
                        record.machine_name,
                        record.date,
                        record.hours_worked,
                        record.target_hours,
                    ])?;
                }
            }

            commit(tx)?;
            Ok(records.len())
        })
        .await
    }

    async fn insert_scrap_records(&self, records: Vec<ScrapRecord>) -> RepositoryResult<usize> {
        self.run_blocking(move |conn| {
            let tx = begin(conn)?;

            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO scrap_data (user_id, machine_name, bab_number, scrap_amount, scrap_date)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                )?;
                for record in &records {
                    stmt.execute(params![
                        record.user_id,
                        record.machine_name,
                        record.bab_number,
                        record.scrap_amount,
                        record.scrap_date,
                    ])?;
                }
            }

            commit(tx)?;
            Ok(records.len())
        })
        .await
    }

    async fn replace_scrap_records(&self, records: Vec<ScrapRecord>) -> RepositoryResult<usize> {
        self.run_blocking(move |conn| {
            let tx = begin(conn)?;

            let mut removed = 0;
            {
                let mut delete = tx.prepare(
                    r#"
                    DELETE FROM scrap_data
                    WHERE user_id = ?1 AND machine_name = ?2 AND bab_number = ?3 AND scrap_date = ?4
                    "#,
                )?;
                let mut insert = tx.prepare(
                    r#"
                    INSERT INTO scrap_data (user_id, machine_name, bab_number, scrap_amount, scrap_date)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                )?;

                for record in &records {
                    removed += delete.execute(params![
                        record.user_id,
                        record.machine_name,
                        record.bab_number,
                        record.scrap_date,
                    ])?;
                }
                for record in &records {
                    insert.execute(params![
                        record.user_id,
                        record.machine_name,
                        record.bab_number,
                        record.scrap_amount,
                        record.scrap_date,
                    ])?;
                }
            }

            commit(tx)?;
            debug!(removed, inserted = records.len(), "scrap_data 替换写入完成");
            Ok(records.len())
        })
        .await
    }

    async fn insert_column_mapping(
        &self,
        mapping_name: &str,
        mapping: &ColumnMapping,
    ) -> RepositoryResult<StoredColumnMapping> {
        let stored = StoredColumnMapping {
            id: Uuid::new_v4().to_string(),
            user_id: self.user_id.clone(),
            mapping_name: mapping_name.to_string(),
            mapping: mapping.clone(),
            created_at: Utc::now(),
        };
        let mapping_json = serde_json::to_string(&stored.mapping.entries)?;

        self.run_blocking(move |conn| {
            conn.execute(
                r#"
                INSERT INTO column_mappings (id, user_id, mapping_name, mapping_json, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    stored.id,
                    stored.user_id,
                    stored.mapping_name,
                    mapping_json,
                    stored.created_at,
                ],
            )?;
            Ok(stored)
        })
        .await
    }

    async fn latest_column_mapping(&self) -> RepositoryResult<Option<StoredColumnMapping>> {
        let user_id = self.user_id.clone();
        self.run_blocking(move |conn| {
            let row = conn
                .query_row(
                    r#"
                    SELECT id, user_id, mapping_name, mapping_json, created_at
                    FROM column_mappings
                    WHERE user_id = ?1
                    ORDER BY created_at DESC, rowid DESC
                    LIMIT 1
                    "#,
                    params![user_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, DateTime<Utc>>(4)?,
                        ))
                    },
                )
                .optional()?;

            match row {
                Some((id, user_id, mapping_name, mapping_json, created_at)) => {
                    Ok(Some(StoredColumnMapping {
                        id,
                        user_id,
                        mapping_name,
                        mapping: ColumnMapping {
                            entries: serde_json::from_str(&mapping_json)?,
                        },
                        created_at,
                    }))
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn insert_excel_rows(
        &self,
        mapping_id: &str,
        file_name: &str,
        rows: Vec<RecordRow>,
    ) -> RepositoryResult<usize> {
        let uploaded_at = Utc::now();
        let user_id = self.user_id.clone();
        let mapping_id = mapping_id.to_string();
        let file_name = file_name.to_string();

        self.run_blocking(move |conn| {
            let tx = begin(conn)?;

            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO excel_data (id, user_id, mapping_id, file_name, row_data, uploaded_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )?;
                for row in &rows {
                    stmt.execute(params![
                        Uuid::new_v4().to_string(),
                        user_id,
                        mapping_id,
                        file_name,
                        serde_json::to_string(row)?,
                        uploaded_at,
                    ])?;
                }
            }

            commit(tx)?;
            Ok(rows.len())
        })
        .await
    }

    async fn list_excel_rows(&self, mapping_id: &str) -> RepositoryResult<Vec<ExcelDataRow>> {
        let mapping_id = mapping_id.to_string();
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, user_id, mapping_id, file_name, row_data, uploaded_at
                FROM excel_data
                WHERE mapping_id = ?1
                ORDER BY uploaded_at, rowid
                "#,
            )?;

            let raw_rows = stmt
                .query_map(params![mapping_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, DateTime<Utc>>(5)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            raw_rows
                .into_iter()
                .map(|(id, user_id, mapping_id, file_name, row_data, uploaded_at)| -> RepositoryResult<ExcelDataRow> {
                    Ok(ExcelDataRow {
                        id,
                        user_id,
                        mapping_id,
                        file_name,
                        row_data: serde_json::from_str(&row_data)?,
                        uploaded_at,
                    })
                })
                .collect()
        })
        .await
    }

    async fn get_user_preferences(&self) -> RepositoryResult<Option<UserPreferences>> {
        let user_id = self.user_id.clone();
        self.run_blocking(move |conn| {
            let prefs = conn
                .query_row(
                    r#"
                    SELECT user_id, last_datum_column, last_stunden_teg_column, last_schicht_column
                    FROM user_preferences
                    WHERE user_id = ?1
                    "#,
                    params![user_id],
                    |row| {
                        Ok(UserPreferences {
                            user_id: row.get(0)?,
                            last_datum_column: row.get(1)?,
                            last_stunden_teg_column: row.get(2)?,
                            last_schicht_column: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(prefs)
        })
        .await
    }

    async fn upsert_user_preferences(&self, preferences: UserPreferences) -> RepositoryResult<()> {
        let user_id = self.user_id.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                r#"
                INSERT INTO user_preferences (
                    user_id, last_datum_column, last_stunden_teg_column, last_schicht_column, updated_at
                ) VALUES (?1, ?2, ?3, ?4, datetime('now'))
                ON CONFLICT(user_id) DO UPDATE SET
                    last_datum_column = excluded.last_datum_column,
                    last_stunden_teg_column = excluded.last_stunden_teg_column,
                    last_schicht_column = excluded.last_schicht_column,
                    updated_at = excluded.updated_at
                "#,
                params![
                    user_id,
                    preferences.last_datum_column,
                    preferences.last_stunden_teg_column,
                    preferences.last_schicht_column,
                ],
            )?;
            Ok(())
        })
        .await
    }
}
