// ==========================================
// 车间报表看板 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::{
    HoursRule, PeriodTargets, RowFilter, ScrapGrouping, ScrapPersistMode, TargetPeriod,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// 后端调用超时默认值（毫秒）
pub const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 30_000;

/// 预览行数默认值
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

// ==========================================
// ImportSettings - 导入配置快照
// ==========================================
// 每次导入开始时解析一次，交给管道使用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub hours_rule: HoursRule,
    pub scrap_grouping: ScrapGrouping,
    pub scrap_persist_mode: ScrapPersistMode,
    pub row_filter: RowFilter,
    pub backend_timeout: Duration,
    pub preview_rows: usize,
    pub period_targets: PeriodTargets,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            hours_rule: HoursRule::default(),
            scrap_grouping: ScrapGrouping::default(),
            scrap_persist_mode: ScrapPersistMode::default(),
            row_filter: RowFilter::default(),
            backend_timeout: Duration::from_millis(DEFAULT_BACKEND_TIMEOUT_MS),
            preview_rows: DEFAULT_PREVIEW_ROWS,
            period_targets: PeriodTargets::default(),
        }
    }
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 聚合规则 =====

    /// 工时计算规则
    ///
    /// # 默认值
    /// - setup_plus_production
    async fn get_hours_rule(&self) -> ConfigResult<HoursRule>;

    /// 废品分组方式
    ///
    /// # 默认值
    /// - order_machine_day
    async fn get_scrap_grouping(&self) -> ConfigResult<ScrapGrouping>;

    /// 废品写入方式
    ///
    /// # 默认值
    /// - insert（重复导入会累积）
    async fn get_scrap_persist_mode(&self) -> ConfigResult<ScrapPersistMode>;

    /// 导入行筛选策略
    ///
    /// # 默认值
    /// - valid_only
    async fn get_row_filter(&self) -> ConfigResult<RowFilter>;

    // ===== 运行参数 =====

    /// 后端调用超时（毫秒）
    async fn get_backend_timeout_ms(&self) -> ConfigResult<u64>;

    async fn get_preview_rows(&self) -> ConfigResult<usize>;

    // ===== 周期目标 =====

    /// 14 天基准目标工时
    ///
    /// # 默认值
    /// - 450
    async fn get_base_target_hours(&self) -> ConfigResult<f64>;

    /// 周期倍数（14 天 ×1，第 3-4 周 ×1，8 周 ×4）
    async fn get_target_multiplier(&self, period: TargetPeriod) -> ConfigResult<f64>;

    /// 汇总为一次性快照
    async fn load_import_settings(&self) -> ConfigResult<ImportSettings> {
        Ok(ImportSettings {
            hours_rule: self.get_hours_rule().await?,
            scrap_grouping: self.get_scrap_grouping().await?,
            scrap_persist_mode: self.get_scrap_persist_mode().await?,
            row_filter: self.get_row_filter().await?,
            backend_timeout: Duration::from_millis(self.get_backend_timeout_ms().await?),
            preview_rows: self.get_preview_rows().await?,
            period_targets: PeriodTargets {
                base_target_hours: self.get_base_target_hours().await?,
                fourteen_days: self.get_target_multiplier(TargetPeriod::FourteenDays).await?,
                weeks_3_and_4: self.get_target_multiplier(TargetPeriod::Weeks3And4).await?,
                eight_weeks: self.get_target_multiplier(TargetPeriod::EightWeeks).await?,
            },
        })
    }
}
