// ==========================================
// 车间报表看板 - 领域类型定义
// ==========================================
// 职责: 字段类型、聚合规则、持久化策略等枚举
// 序列化格式: snake_case (与 config_kv 存储一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 字段类型 (Field Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Number, // 数值（支持德式小数逗号）
    String, // 文本（TRIM）
    Date,   // 日期（德式/ISO/Excel 序列号）
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Number => write!(f, "number"),
            FieldType::String => write!(f, "string"),
            FieldType::Date => write!(f, "date"),
        }
    }
}

// ==========================================
// 工时计算规则 (Hours Rule)
// ==========================================
// 同一聚合步骤的三种可选配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HoursRule {
    /// 直接读取工时列（TEG [h]）
    DirectColumn,
    /// (Rüstzeit + Serienzeit) / 60
    #[default]
    SetupPlusProduction,
    /// 先按 (订单, 机台, 日) 汇总分钟数，剔除非正值分组，再折算小时
    OrderGroupedMinutes,
}

impl fmt::Display for HoursRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoursRule::DirectColumn => write!(f, "direct_column"),
            HoursRule::SetupPlusProduction => write!(f, "setup_plus_production"),
            HoursRule::OrderGroupedMinutes => write!(f, "order_grouped_minutes"),
        }
    }
}

impl FromStr for HoursRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "direct_column" => Ok(HoursRule::DirectColumn),
            "setup_plus_production" => Ok(HoursRule::SetupPlusProduction),
            "order_grouped_minutes" => Ok(HoursRule::OrderGroupedMinutes),
            other => Err(format!("未知工时规则: {}", other)),
        }
    }
}

// ==========================================
// 废品分组方式 (Scrap Grouping)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScrapGrouping {
    /// 按 (订单, 机台, 日) 合并
    #[default]
    OrderMachineDay,
    /// 不合并，每行一条记录
    PerRow,
}

impl fmt::Display for ScrapGrouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrapGrouping::OrderMachineDay => write!(f, "order_machine_day"),
            ScrapGrouping::PerRow => write!(f, "per_row"),
        }
    }
}

impl FromStr for ScrapGrouping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "order_machine_day" => Ok(ScrapGrouping::OrderMachineDay),
            "per_row" => Ok(ScrapGrouping::PerRow),
            other => Err(format!("未知废品分组方式: {}", other)),
        }
    }
}

// ==========================================
// 废品落库方式 (Scrap Persist Mode)
// ==========================================
// Insert: 纯插入，重复导入会累加（原有行为）
// ReplaceByKey: 先删除同键 (user, machine, bab, date) 再插入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScrapPersistMode {
    #[default]
    Insert,
    ReplaceByKey,
}

impl fmt::Display for ScrapPersistMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrapPersistMode::Insert => write!(f, "insert"),
            ScrapPersistMode::ReplaceByKey => write!(f, "replace_by_key"),
        }
    }
}

impl FromStr for ScrapPersistMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "insert" => Ok(ScrapPersistMode::Insert),
            "replace_by_key" => Ok(ScrapPersistMode::ReplaceByKey),
            other => Err(format!("未知废品落库方式: {}", other)),
        }
    }
}

// ==========================================
// 行过滤策略 (Row Filter)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RowFilter {
    /// 仅导入无校验错误的行
    #[default]
    ValidOnly,
    /// 导入全部行（含被标记的行）
    All,
}

impl fmt::Display for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowFilter::ValidOnly => write!(f, "valid_only"),
            RowFilter::All => write!(f, "all"),
        }
    }
}

impl FromStr for RowFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "valid_only" => Ok(RowFilter::ValidOnly),
            "all" => Ok(RowFilter::All),
            other => Err(format!("未知行过滤策略: {}", other)),
        }
    }
}

// ==========================================
// 工时统计周期 (Target Period)
// ==========================================
// 目标工时以 14 天为基准，各周期使用显式命名的倍数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPeriod {
    /// 最近 14 天
    FourteenDays,
    /// 第 3-4 周（往前 28 天到往前 14 天）
    Weeks3And4,
    /// 最近 8 周
    EightWeeks,
}

impl TargetPeriod {
    /// 窗口起点：距今天数
    pub fn days_back(&self) -> i64 {
        match self {
            TargetPeriod::FourteenDays => 14,
            TargetPeriod::Weeks3And4 => 28,
            TargetPeriod::EightWeeks => 56,
        }
    }

    /// 窗口终点：距今天数
    pub fn days_forward(&self) -> i64 {
        match self {
            TargetPeriod::FourteenDays => 0,
            TargetPeriod::Weeks3And4 => 14,
            TargetPeriod::EightWeeks => 0,
        }
    }

    pub fn days_count(&self) -> i64 {
        self.days_back() - self.days_forward()
    }
}

impl fmt::Display for TargetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetPeriod::FourteenDays => write!(f, "hours_14d"),
            TargetPeriod::Weeks3And4 => write!(f, "hours_week_3_4"),
            TargetPeriod::EightWeeks => write!(f, "hours_8_weeks"),
        }
    }
}

impl FromStr for TargetPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hours_14d" | "14d" => Ok(TargetPeriod::FourteenDays),
            "hours_week_3_4" | "week_3_4" => Ok(TargetPeriod::Weeks3And4),
            "hours_8_weeks" | "8_weeks" => Ok(TargetPeriod::EightWeeks),
            other => Err(format!("未知统计周期: {}", other)),
        }
    }
}

// ==========================================
// 周期目标工时 (Period Targets)
// ==========================================
// 目标 = 14 天基准 × 周期倍数；倍数作为显式配置项
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodTargets {
    pub base_target_hours: f64,
    pub fourteen_days: f64,
    pub weeks_3_and_4: f64,
    pub eight_weeks: f64,
}

impl PeriodTargets {
    pub fn multiplier(&self, period: TargetPeriod) -> f64 {
        match period {
            TargetPeriod::FourteenDays => self.fourteen_days,
            TargetPeriod::Weeks3And4 => self.weeks_3_and_4,
            TargetPeriod::EightWeeks => self.eight_weeks,
        }
    }

    pub fn target_hours(&self, period: TargetPeriod) -> f64 {
        self.base_target_hours * self.multiplier(period)
    }
}

impl Default for PeriodTargets {
    fn default() -> Self {
        Self {
            base_target_hours: 450.0,
            fourteen_days: 1.0,
            weeks_3_and_4: 1.0,
            eight_weeks: 4.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_rule_round_trip_from_config_text() {
        for rule in [
            HoursRule::DirectColumn,
            HoursRule::SetupPlusProduction,
            HoursRule::OrderGroupedMinutes,
        ] {
            assert_eq!(rule.to_string().parse::<HoursRule>().unwrap(), rule);
        }
        assert!("bogus".parse::<HoursRule>().is_err());
    }

    #[test]
    fn test_target_period_windows() {
        assert_eq!(TargetPeriod::FourteenDays.days_count(), 14);
        assert_eq!(TargetPeriod::Weeks3And4.days_count(), 14);
        assert_eq!(TargetPeriod::EightWeeks.days_count(), 56);
        assert_eq!("8_weeks".parse::<TargetPeriod>().unwrap(), TargetPeriod::EightWeeks);
    }

    #[test]
    fn test_period_targets_defaults() {
        let targets = PeriodTargets::default();
        assert_eq!(targets.target_hours(TargetPeriod::FourteenDays), 450.0);
        assert_eq!(targets.target_hours(TargetPeriod::Weeks3And4), 450.0);
        assert_eq!(targets.target_hours(TargetPeriod::EightWeeks), 1800.0);
    }
}
