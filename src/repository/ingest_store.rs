// ==========================================
// 车间报表看板 - 导入持久化 Trait
// ==========================================
// 职责: 定义导入管道所需的持久化 + 身份上下文（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据读写
// 说明: 显式注入到每个管道阶段，测试可替换为内存假实现
// ==========================================

use crate::domain::mapping::{ColumnMapping, RecordRow};
use crate::domain::records::{
    ExcelDataRow, MachineHoursRecord, MachineTarget, ScrapRecord, StoredColumnMapping,
    UserPreferences,
};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// IngestStore Trait
// ==========================================
// 实现者: SqliteIngestStore（使用 rusqlite）
#[async_trait]
pub trait IngestStore: Send + Sync {
    // ===== 身份 =====

    /// 当前用户 ID（所有写入均归属该用户）
    fn current_user_id(&self) -> &str;

    // ===== machine_targets =====

    /// 读取全部机台目标工时
    async fn list_machine_targets(&self) -> RepositoryResult<Vec<MachineTarget>>;

    /// 登记新机台（已存在的机台名保持不变）
    ///
    /// # 返回
    /// - Ok(usize): 实际新增的行数
    async fn insert_machine_targets(&self, targets: Vec<MachineTarget>) -> RepositoryResult<usize>;

    // ===== machine_hours =====

    /// 按 (user_id, machine_name, date) upsert，冲突时覆盖（非累加）
    async fn upsert_machine_hours(&self, records: Vec<MachineHoursRecord>)
        -> RepositoryResult<usize>;

    // ===== scrap_data =====

    /// 纯插入（重复导入会累积）
    async fn insert_scrap_records(&self, records: Vec<ScrapRecord>) -> RepositoryResult<usize>;

    /// 先删除相同 (user, machine, bab, date) 的旧记录再插入
    async fn replace_scrap_records(&self, records: Vec<ScrapRecord>) -> RepositoryResult<usize>;

    // ===== column_mappings =====

    /// 保存映射，返回带 ID 的记录
    async fn insert_column_mapping(
        &self,
        mapping_name: &str,
        mapping: &ColumnMapping,
    ) -> RepositoryResult<StoredColumnMapping>;

    /// 当前用户最近一次保存的映射
    async fn latest_column_mapping(&self) -> RepositoryResult<Option<StoredColumnMapping>>;

    // ===== excel_data =====

    /// 追加归档原始行
    async fn insert_excel_rows(
        &self,
        mapping_id: &str,
        file_name: &str,
        rows: Vec<RecordRow>,
    ) -> RepositoryResult<usize>;

    /// 读取某映射下的全部归档行（按上传顺序）
    async fn list_excel_rows(&self, mapping_id: &str) -> RepositoryResult<Vec<ExcelDataRow>>;

    // ===== user_preferences =====

    async fn get_user_preferences(&self) -> RepositoryResult<Option<UserPreferences>>;

    /// 存在则更新，否则插入
    async fn upsert_user_preferences(&self, preferences: UserPreferences) -> RepositoryResult<()>;
}
