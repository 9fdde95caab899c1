// ==========================================
// 车间报表看板 - 导入API
// ==========================================
// 职责: 封装导入向导流程（上传 → 映射 → 校验 → 导入）
//       以及模板导入、工时回填、周期工时
// 说明: 每次调用重新读取配置快照，交给 IngestionPipeline
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::import_config_trait::{ImportConfigReader, ImportSettings};
use crate::domain::mapping::{ColumnMapping, TableRow};
use crate::domain::schema::FieldSchema;
use crate::domain::table::RawTable;
use crate::domain::types::{HoursRule, RowFilter, ScrapGrouping, TargetPeriod};
use crate::domain::validation::{MappingValidation, ValidatedRow, ValidationSummary};
use crate::importer::column_mapper::ColumnMapper;
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::ingestion_pipeline::{ImportReport, IngestionPipeline};
use crate::importer::period_hours::PeriodHours;
use crate::importer::row_validator::RowValidator;
use crate::repository::ingest_store::IngestStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// 文件预览响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePreview {
    pub file_name: String,
    pub headers: Vec<String>,
    pub column_letters: Vec<String>,
    /// 前 N 行，单元格已格式化为展示文本
    pub preview_rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

/// 行校验响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowValidationResponse {
    pub rows: Vec<ValidatedRow>,
    pub summary: ValidationSummary,
}

/// 向导导入响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineImportResponse {
    pub file_name: String,
    pub mapping_warnings: Vec<String>,
    pub summary: ValidationSummary,
    pub report: ImportReport,
    /// 导入耗时（毫秒）
    pub elapsed_ms: i64,
}

/// 模板导入响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateImportResponse {
    pub file_name: String,
    /// 本次保存的映射ID（归档行挂在该映射下）
    pub mapping_id: String,
    pub mapping_warnings: Vec<String>,
    pub rows_archived: usize,
    pub report: ImportReport,
    pub elapsed_ms: i64,
}

/// 导入API
pub struct ImportApi {
    store: Arc<dyn IngestStore>,
    config: Arc<dyn ImportConfigReader>,
    parser: UniversalFileParser,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    ///
    /// # 参数
    /// - store: 持久化与身份上下文
    /// - config: 导入配置读取器
    pub fn new(store: Arc<dyn IngestStore>, config: Arc<dyn ImportConfigReader>) -> Self {
        Self {
            store,
            config,
            parser: UniversalFileParser,
        }
    }

    async fn load_settings(&self) -> ApiResult<ImportSettings> {
        self.config
            .load_import_settings()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    async fn pipeline(&self) -> ApiResult<IngestionPipeline> {
        let settings = self.load_settings().await?;
        Ok(IngestionPipeline::new(self.store.clone(), settings))
    }

    // ==========================================
    // 步骤 1: 上传
    // ==========================================

    /// 解析上传文件
    pub async fn read_file(&self, bytes: Vec<u8>, file_name: &str) -> ApiResult<RawTable> {
        Ok(self.parser.parse_async(bytes, file_name.to_string()).await?)
    }

    /// 生成预览（行数取自配置 preview_rows）
    pub async fn preview(&self, table: &RawTable, file_name: &str) -> ApiResult<FilePreview> {
        let settings = self.load_settings().await?;
        let preview_rows = table
            .preview_rows(settings.preview_rows)
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();

        Ok(FilePreview {
            file_name: file_name.to_string(),
            headers: table.headers.clone(),
            column_letters: table.column_letters.clone(),
            preview_rows,
            total_rows: table.row_count(),
        })
    }

    // ==========================================
    // 步骤 2: 映射
    // ==========================================

    /// 按关键字建议列映射（按列号）
    pub fn suggest_mapping(&self, table: &RawTable, schema: &FieldSchema) -> ColumnMapping {
        ColumnMapper::auto_detect(&table.headers, schema)
    }

    pub fn validate_mapping(
        &self,
        table: &RawTable,
        mapping: &ColumnMapping,
        schema: &FieldSchema,
    ) -> MappingValidation {
        ColumnMapper::validate(mapping, &schema.required_keys(), &table.headers)
    }

    // ==========================================
    // 步骤 3: 校验
    // ==========================================

    pub fn validate_rows(
        &self,
        table: &RawTable,
        mapping: &ColumnMapping,
        schema: &FieldSchema,
    ) -> RowValidationResponse {
        let rows = RowValidator::validate_table(table, mapping, &schema.field_types());
        let summary = RowValidator::summarize(&rows);
        RowValidationResponse { rows, summary }
    }

    // ==========================================
    // 步骤 4: 导入
    // ==========================================

    /// 导入已校验的行
    ///
    /// # 参数
    /// - row_filter: 覆盖配置中的筛选策略（用户选择"仅有效行"或"全部"）
    pub async fn import_validated(
        &self,
        rows: &[ValidatedRow],
        row_filter: Option<RowFilter>,
    ) -> ApiResult<ImportReport> {
        let mut settings = self.load_settings().await?;
        if let Some(filter) = row_filter {
            settings.row_filter = filter;
        }
        let pipeline = IngestionPipeline::new(self.store.clone(), settings);
        Ok(pipeline.import_validated(rows).await?)
    }

    /// 向导流程一次走完（CLI 使用）
    ///
    /// # 参数
    /// - mapping: 用户给定映射；None 时按关键字自动识别
    ///
    /// # 返回
    /// - Err(ApiError::MappingInvalid): 映射不完整，不做任何写入
    #[instrument(skip(self, bytes, mapping), fields(size = bytes.len()))]
    pub async fn import_machine_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mapping: Option<ColumnMapping>,
        row_filter: Option<RowFilter>,
    ) -> ApiResult<MachineImportResponse> {
        let start = Instant::now();
        let schema = FieldSchema::machine_minutes();
        let table = self.read_file(bytes, file_name).await?;

        let mapping = mapping.unwrap_or_else(|| self.suggest_mapping(&table, &schema));
        let mapping_check = self.validate_mapping(&table, &mapping, &schema);
        if !mapping_check.is_valid {
            return Err(ApiError::MappingInvalid {
                errors: mapping_check.errors,
            });
        }

        let validation = self.validate_rows(&table, &mapping, &schema);
        if validation.summary.invalid_rows > 0 {
            warn!(
                invalid_rows = validation.summary.invalid_rows,
                "存在校验失败的行"
            );
        }

        let report = self.import_validated(&validation.rows, row_filter).await?;
        let elapsed_ms = start.elapsed().as_millis() as i64;
        info!(file_name, elapsed_ms, "向导导入完成");

        Ok(MachineImportResponse {
            file_name: file_name.to_string(),
            mapping_warnings: mapping_check.warnings,
            summary: validation.summary,
            report,
            elapsed_ms,
        })
    }

    // ==========================================
    // 模板导入（按列名寻址）
    // ==========================================

    /// 模板文件导入
    ///
    /// # 流程
    /// 1. 解析文件，按列名自动识别 + 叠加用户偏好
    /// 2. 校验必填字段（工时/废品/日期/订单/机台）
    /// 3. 保存映射、更新偏好、归档全部原始行
    /// 4. 机台发现 + 工时（直接列）+ 逐行废品
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn import_template_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> ApiResult<TemplateImportResponse> {
        let start = Instant::now();
        let schema = FieldSchema::template_hours();
        let pipeline = self.pipeline().await?;
        let table = self.read_file(bytes, file_name).await?;

        let mut mapping = ColumnMapper::auto_detect_by_name(&table.headers, &schema);
        if let Some(preferences) = pipeline.load_preferences().await? {
            ColumnMapper::apply_preferences(&mut mapping, &preferences, &table.headers);
        }

        let mapping_check = ColumnMapper::validate(&mapping, &schema.required_keys(), &table.headers);
        if !mapping_check.is_valid {
            return Err(ApiError::MappingInvalid {
                errors: mapping_check.errors,
            });
        }

        let stored = pipeline
            .save_mapping(&format!("Import {}", file_name), &mapping)
            .await?;
        let preferences =
            ColumnMapper::preferences_from_mapping(self.store.current_user_id(), &mapping);
        pipeline.save_preferences(preferences).await?;
        let rows_archived = pipeline
            .archive_rows(&stored.id, file_name, table.to_records())
            .await?;

        let rows: Vec<TableRow<'_>> = table
            .all_rows()
            .iter()
            .map(|cells| TableRow::new(&table.headers, cells))
            .collect();
        let report = pipeline
            .import_raw_rows(&rows, &mapping, HoursRule::DirectColumn, ScrapGrouping::PerRow)
            .await?;

        let elapsed_ms = start.elapsed().as_millis() as i64;
        info!(file_name, rows_archived, elapsed_ms, "模板导入完成");

        Ok(TemplateImportResponse {
            file_name: file_name.to_string(),
            mapping_id: stored.id,
            mapping_warnings: mapping_check.warnings,
            rows_archived,
            report,
            elapsed_ms,
        })
    }

    // ==========================================
    // 回填 / 周期工时
    // ==========================================

    /// 从归档行重新计算机台日工时
    pub async fn backfill_machine_hours(&self) -> ApiResult<usize> {
        Ok(self.pipeline().await?.backfill_machine_hours().await?)
    }

    pub async fn period_hours(&self, period: TargetPeriod, today: NaiveDate) -> ApiResult<PeriodHours> {
        Ok(self.pipeline().await?.period_hours(period, today).await?)
    }

    /// 三个周期一次取齐（看板顶部卡片）
    pub async fn all_period_hours(&self, today: NaiveDate) -> ApiResult<Vec<PeriodHours>> {
        let pipeline = self.pipeline().await?;
        let mut results = Vec::with_capacity(3);
        for period in [
            TargetPeriod::FourteenDays,
            TargetPeriod::Weeks3And4,
            TargetPeriod::EightWeeks,
        ] {
            results.push(pipeline.period_hours(period, today).await?);
        }
        Ok(results)
    }
}
