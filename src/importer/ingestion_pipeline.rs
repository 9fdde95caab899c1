// ==========================================
// 车间报表看板 - 聚合写入管道
// ==========================================
// 阶段 3b: 聚合结果 → 持久化（工时 upsert / 废品写入 / 新机台登记）
// 并发: 三个写入步骤通过 try_join! 并发执行；首个错误即返回，已完成的步骤不回滚
// 超时: 每次后端调用都包裹 tokio::time::timeout
// ==========================================

use crate::config::import_config_trait::ImportSettings;
use crate::domain::mapping::{ColumnMapping, RecordRow, RowAccess};
use crate::domain::records::{MachineTarget, StoredColumnMapping, UserPreferences};
use crate::domain::schema::fields;
use crate::domain::types::{HoursRule, ScrapGrouping, ScrapPersistMode, TargetPeriod};
use crate::domain::validation::ValidatedRow;
use crate::importer::aggregation::{
    aggregate_hours, aggregate_scrap, build_hours_records, build_scrap_records, discover_machines,
    observed_machines, ResolvedRow, SkipCounts,
};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::period_hours::{compute_period_hours, PeriodHours};
use crate::importer::row_validator::RowValidator;
use crate::repository::error::RepositoryResult;
use crate::repository::ingest_store::IngestStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

// ==========================================
// ImportReport - 导入结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    /// 交给管道的行数（筛选前）
    pub rows_received: usize,
    /// 参与聚合的行数（筛选后）
    pub rows_processed: usize,
    pub machine_hours_written: usize,
    pub scrap_records_written: usize,
    pub machines_discovered: Vec<String>,
    pub hours_skipped: SkipCounts,
    pub scrap_skipped: SkipCounts,
}

// ==========================================
// IngestionPipeline
// ==========================================
pub struct IngestionPipeline {
    store: Arc<dyn IngestStore>,
    settings: ImportSettings,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn IngestStore>, settings: ImportSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn IngestStore> {
        &self.store
    }

    /// 后端调用统一加超时；超时映射为 BackendTimeout
    async fn guarded<T, F>(&self, step: &'static str, call: F) -> ImportResult<T>
    where
        F: Future<Output = RepositoryResult<T>>,
    {
        let timeout_ms = self.settings.backend_timeout.as_millis() as u64;
        match tokio::time::timeout(self.settings.backend_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(step, timeout_ms, "后端调用超时");
                Err(ImportError::BackendTimeout {
                    step: step.to_string(),
                    timeout_ms,
                })
            }
        }
    }

    async fn target_lookup(&self, step: &'static str) -> ImportResult<Vec<MachineTarget>> {
        self.guarded(step, self.store.list_machine_targets()).await
    }

    // ===== 主流程 =====

    /// 聚合并写入；三个写入步骤并发，首个错误即返回
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn aggregate_and_persist(
        &self,
        rows: &[ResolvedRow],
        hours_rule: HoursRule,
        scrap_grouping: ScrapGrouping,
    ) -> ImportResult<ImportReport> {
        let user_id = self.store.current_user_id().to_string();

        let hours = aggregate_hours(rows, hours_rule);
        let scrap = aggregate_scrap(rows, scrap_grouping);
        let observed = observed_machines(rows);

        let hours_step = async {
            if hours.machine_days.is_empty() {
                return Ok::<_, ImportError>(0);
            }
            let targets: HashMap<String, f64> = self
                .target_lookup("machine_targets lesen")
                .await?
                .into_iter()
                .map(|t| (t.machine_name, t.target_hours_14d))
                .collect();
            let records = build_hours_records(&hours, &targets, &user_id);
            self.guarded("machine_hours upsert", self.store.upsert_machine_hours(records))
                .await
        };

        let scrap_step = async {
            let records = build_scrap_records(&scrap, &user_id);
            if records.is_empty() {
                return Ok::<_, ImportError>(0);
            }
            match self.settings.scrap_persist_mode {
                ScrapPersistMode::Insert => {
                    self.guarded("scrap_data insert", self.store.insert_scrap_records(records))
                        .await
                }
                ScrapPersistMode::ReplaceByKey => {
                    self.guarded("scrap_data replace", self.store.replace_scrap_records(records))
                        .await
                }
            }
        };

        let discovery_step = async {
            if observed.is_empty() {
                return Ok::<_, ImportError>(Vec::new());
            }
            let existing: HashSet<String> = self
                .target_lookup("machine_targets lesen")
                .await?
                .into_iter()
                .map(|t| t.machine_name)
                .collect();
            let new_machines = discover_machines(&observed, &existing);
            if new_machines.is_empty() {
                return Ok(new_machines);
            }

            let targets = new_machines
                .iter()
                .map(|name| MachineTarget {
                    machine_name: name.clone(),
                    target_hours_14d: 0.0,
                    user_id: Some(user_id.clone()),
                })
                .collect();
            self.guarded("machine_targets insert", self.store.insert_machine_targets(targets))
                .await?;
            Ok(new_machines)
        };

        let (machine_hours_written, scrap_records_written, machines_discovered) =
            futures::try_join!(hours_step, scrap_step, discovery_step)?;

        if hours.skipped.total() > 0 || scrap.skipped.total() > 0 {
            debug!(hours_skipped = ?hours.skipped, scrap_skipped = ?scrap.skipped, "聚合时跳过的行");
        }
        info!(
            machine_hours_written,
            scrap_records_written,
            discovered = machines_discovered.len(),
            hours_skipped = hours.skipped.total(),
            scrap_skipped = scrap.skipped.total(),
            "聚合写入完成"
        );

        Ok(ImportReport {
            rows_received: rows.len(),
            rows_processed: rows.len(),
            machine_hours_written,
            scrap_records_written,
            machines_discovered,
            hours_skipped: hours.skipped,
            scrap_skipped: scrap.skipped,
        })
    }

    /// 导入已校验的行（按配置筛选 有效行 / 全部行）
    pub async fn import_validated(&self, rows: &[ValidatedRow]) -> ImportResult<ImportReport> {
        let selected: Vec<ResolvedRow> = RowValidator::filter_rows(rows, self.settings.row_filter)
            .into_iter()
            .map(ResolvedRow::from_validated)
            .collect();
        debug!(
            received = rows.len(),
            selected = selected.len(),
            filter = %self.settings.row_filter,
            "导入行筛选完成"
        );

        let mut report = self
            .aggregate_and_persist(&selected, self.settings.hours_rule, self.settings.scrap_grouping)
            .await?;
        report.rows_received = rows.len();
        Ok(report)
    }

    /// 导入未经类型校验的原始行（直接按映射解析）
    pub async fn import_raw_rows<R: RowAccess + Sync>(
        &self,
        rows: &[R],
        mapping: &ColumnMapping,
        hours_rule: HoursRule,
        scrap_grouping: ScrapGrouping,
    ) -> ImportResult<ImportReport> {
        let resolved: Vec<ResolvedRow> = rows
            .iter()
            .map(|row| ResolvedRow::from_raw(row, mapping))
            .collect();
        self.aggregate_and_persist(&resolved, hours_rule, scrap_grouping)
            .await
    }

    // ===== 映射 / 归档 / 偏好 =====

    pub async fn save_mapping(
        &self,
        mapping_name: &str,
        mapping: &ColumnMapping,
    ) -> ImportResult<StoredColumnMapping> {
        self.guarded(
            "column_mappings insert",
            self.store.insert_column_mapping(mapping_name, mapping),
        )
        .await
    }

    pub async fn archive_rows(
        &self,
        mapping_id: &str,
        file_name: &str,
        rows: Vec<RecordRow>,
    ) -> ImportResult<usize> {
        self.guarded(
            "excel_data insert",
            self.store.insert_excel_rows(mapping_id, file_name, rows),
        )
        .await
    }

    pub async fn load_preferences(&self) -> ImportResult<Option<UserPreferences>> {
        self.guarded("user_preferences lesen", self.store.get_user_preferences())
            .await
    }

    pub async fn save_preferences(&self, preferences: UserPreferences) -> ImportResult<()> {
        self.guarded(
            "user_preferences upsert",
            self.store.upsert_user_preferences(preferences),
        )
        .await
    }

    // ===== 回填 =====

    /// 从最近映射的归档行重新计算机台日工时
    ///
    /// # 规则
    /// - 机台名按严格规则（拒绝 Excel 错误值、纯数字、空值）
    /// - 订单号必填；(订单, 机台, 日) 分钟数 ≤ 0 的分组被丢弃
    ///
    /// # 返回
    /// - Ok(usize): 写入的机台日记录数
    #[instrument(skip(self))]
    pub async fn backfill_machine_hours(&self) -> ImportResult<usize> {
        let stored = self
            .guarded("column_mappings lesen", self.store.latest_column_mapping())
            .await?
            .ok_or(ImportError::NoStoredMapping)?;

        let mapping = &stored.mapping;
        let mut missing: Vec<&str> = [
            fields::MACHINE_NAME,
            fields::DATE,
            fields::SETUP_TIME,
            fields::PRODUCTION_TIME,
        ]
        .into_iter()
        .filter(|key| !mapping.is_mapped(key))
        .collect();
        if !mapping.is_mapped(fields::BAB_NUMBER) && !mapping.is_mapped(fields::ORDER_NUMBER) {
            missing.push(fields::BAB_NUMBER);
        }
        if !missing.is_empty() {
            return Err(ImportError::MappingIncomplete(missing.join(", ")));
        }

        let archived = self
            .guarded("excel_data lesen", self.store.list_excel_rows(&stored.id))
            .await?;
        if archived.is_empty() {
            return Err(ImportError::NoStoredRows);
        }

        let resolved: Vec<ResolvedRow> = archived
            .iter()
            .map(|row| ResolvedRow::from_raw_strict(&row.row_data, mapping))
            .collect();
        let hours = aggregate_hours(&resolved, HoursRule::OrderGroupedMinutes);
        if hours.machine_days.is_empty() {
            info!(rows = archived.len(), skipped = ?hours.skipped, "回填无可写入的工时");
            return Ok(0);
        }

        let targets: HashMap<String, f64> = self
            .target_lookup("machine_targets lesen")
            .await?
            .into_iter()
            .map(|t| (t.machine_name, t.target_hours_14d))
            .collect();
        let records = build_hours_records(&hours, &targets, self.store.current_user_id());

        let written = self
            .guarded("machine_hours upsert", self.store.upsert_machine_hours(records))
            .await?;
        info!(rows = archived.len(), written, skipped = ?hours.skipped, "工时回填完成");
        Ok(written)
    }

    // ===== 周期工时 =====

    /// 最近映射下的周期工时；无映射或无归档行时返回零值
    pub async fn period_hours(
        &self,
        period: TargetPeriod,
        today: NaiveDate,
    ) -> ImportResult<PeriodHours> {
        let targets = &self.settings.period_targets;
        let Some(stored) = self
            .guarded("column_mappings lesen", self.store.latest_column_mapping())
            .await?
        else {
            return Ok(compute_period_hours(&[], &ColumnMapping::new(), period, targets, today));
        };

        let records: Vec<RecordRow> = self
            .guarded("excel_data lesen", self.store.list_excel_rows(&stored.id))
            .await?
            .into_iter()
            .map(|row| row.row_data)
            .collect();

        Ok(compute_period_hours(&records, &stored.mapping, period, targets, today))
    }
}
