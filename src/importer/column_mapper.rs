// ==========================================
// 车间报表看板 - 列映射解析器实现
// ==========================================
// 职责: 表头 → 业务字段的自动识别 + 映射完整性校验
// 识别规则: 先精确匹配（忽略大小写/首尾空白），再子串匹配；关键字按优先级
// ==========================================

use crate::domain::mapping::{ColumnMapping, ColumnRef};
use crate::domain::records::UserPreferences;
use crate::domain::schema::{field_keywords, fields, FieldSchema};
use crate::domain::table::column_letter;
use crate::domain::validation::MappingValidation;
use std::collections::HashSet;
use tracing::debug;

pub struct ColumnMapper;

impl ColumnMapper {
    /// 按关键字查找列序号；未命中返回 None
    pub fn detect_column(headers: &[String], keywords: &[&str]) -> Option<usize> {
        let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

        // 第一轮: 精确匹配
        for keyword in keywords {
            let keyword = keyword.to_lowercase();
            if let Some(idx) = normalized.iter().position(|h| *h == keyword) {
                return Some(idx);
            }
        }

        // 第二轮: 子串匹配
        for keyword in keywords {
            let keyword = keyword.to_lowercase();
            if let Some(idx) = normalized.iter().position(|h| h.contains(&keyword)) {
                return Some(idx);
            }
        }

        None
    }

    /// 自动识别（按列序号寻址）
    pub fn auto_detect(headers: &[String], schema: &FieldSchema) -> ColumnMapping {
        let mut mapping = ColumnMapping::new();
        for entry in &schema.entries {
            if let Some(idx) = Self::detect_column(headers, field_keywords(&entry.key)) {
                mapping.set(&entry.key, ColumnRef::Index(idx));
            }
        }
        debug!(mapped = mapping.entries.len(), total = schema.entries.len(), "列映射自动识别完成");
        mapping
    }

    /// 自动识别（按列名寻址）
    pub fn auto_detect_by_name(headers: &[String], schema: &FieldSchema) -> ColumnMapping {
        Self::auto_detect(headers, schema).to_named(headers)
    }

    /// 叠加用户上次使用的列（仅当该列存在于当前表头）
    pub fn apply_preferences(
        mapping: &mut ColumnMapping,
        preferences: &UserPreferences,
        headers: &[String],
    ) {
        let remembered = [
            (fields::DATE, &preferences.last_datum_column),
            (fields::HOURS, &preferences.last_stunden_teg_column),
            (fields::SCRAP_AMOUNT, &preferences.last_schicht_column),
        ];

        for (field_key, column) in remembered {
            if let Some(column) = column {
                if headers.iter().any(|h| h == column) {
                    mapping.set(field_key, ColumnRef::Name(column.clone()));
                }
            }
        }
    }

    /// 从映射提取偏好（日期/工时/废品三列）
    pub fn preferences_from_mapping(user_id: &str, mapping: &ColumnMapping) -> UserPreferences {
        UserPreferences {
            user_id: user_id.to_string(),
            last_datum_column: mapping.column_name(fields::DATE).map(str::to_string),
            last_stunden_teg_column: mapping.column_name(fields::HOURS).map(str::to_string),
            last_schicht_column: mapping.column_name(fields::SCRAP_AMOUNT).map(str::to_string),
        }
    }

    /// 校验映射：必填字段须映射到 [0, 列数) 内；重复使用同一列仅警告
    pub fn validate(
        mapping: &ColumnMapping,
        required_keys: &[String],
        headers: &[String],
    ) -> MappingValidation {
        let column_count = headers.len();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for field in required_keys {
            match mapping.get(field) {
                None => errors.push(format!("Pflichtfeld \"{}\" wurde nicht zugeordnet", field)),
                Some(ColumnRef::Index(idx)) if *idx >= column_count => {
                    errors.push(format!("Ungültiger Spaltenindex für \"{}\"", field))
                }
                Some(ColumnRef::Name(name)) if !headers.iter().any(|h| h == name) => errors.push(
                    format!("Spalte \"{}\" für \"{}\" wurde nicht gefunden", name, field),
                ),
                Some(_) => {}
            }
        }

        let mut used = HashSet::new();
        for (field, _) in mapping.iter() {
            if let Some(idx) = mapping.column_index(field, headers) {
                if !used.insert(idx) {
                    warnings.push(format!(
                        "Spalte {} wurde mehrfach zugeordnet",
                        column_letter(idx)
                    ));
                }
            }
        }

        MappingValidation {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_auto_detect_exact_matches() {
        let headers = headers(&["Maschine", "Datum", "Ausschuss"]);
        let schema = FieldSchema::machine_minutes();
        let mapping = ColumnMapper::auto_detect(&headers, &schema);

        assert_eq!(mapping.get(fields::MACHINE_NAME), Some(&ColumnRef::Index(0)));
        assert_eq!(mapping.get(fields::DATE), Some(&ColumnRef::Index(1)));
        assert_eq!(mapping.get(fields::SCRAP_AMOUNT), Some(&ColumnRef::Index(2)));
        assert!(!mapping.is_mapped(fields::SETUP_TIME));
    }

    #[test]
    fn test_exact_match_beats_earlier_substring_match() {
        // "Menge gut" 含 "menge"，但 "Ausschuss" 精确命中优先
        let headers = headers(&["Menge gut", "  AUSSCHUSS "]);
        assert_eq!(
            ColumnMapper::detect_column(&headers, field_keywords(fields::SCRAP_AMOUNT)),
            Some(1)
        );
    }

    #[test]
    fn test_substring_fallback() {
        let headers = headers(&["Lfd. Nr.", "Rüstzeit [min]", "Buchungsdatum"]);
        assert_eq!(
            ColumnMapper::detect_column(&headers, field_keywords(fields::SETUP_TIME)),
            Some(1)
        );
        assert_eq!(
            ColumnMapper::detect_column(&headers, field_keywords(fields::DATE)),
            Some(2)
        );
        assert_eq!(ColumnMapper::detect_column(&headers, &["xyz"]), None);
    }

    #[test]
    fn test_template_headers_by_name() {
        let headers = headers(&[
            "TEG [h]",
            "Ausschuss",
            "Datum",
            "Internes BA-Kürzel",
            "Ressource",
            "Menge gut",
        ]);
        let mapping = ColumnMapper::auto_detect_by_name(&headers, &FieldSchema::template_hours());

        assert_eq!(mapping.column_name(fields::HOURS), Some("TEG [h]"));
        assert_eq!(mapping.column_name(fields::ORDER_NUMBER), Some("Internes BA-Kürzel"));
        assert_eq!(mapping.column_name(fields::MACHINE_NAME), Some("Ressource"));
        assert_eq!(mapping.column_name(fields::GOOD_QUANTITY), Some("Menge gut"));
    }

    #[test]
    fn test_validate_missing_and_out_of_range() {
        let headers = headers(&["Maschine", "Datum"]);
        let required = vec![fields::MACHINE_NAME.to_string(), fields::DATE.to_string()];

        let mapping = ColumnMapping::by_index([(fields::MACHINE_NAME, 0)]);
        let result = ColumnMapper::validate(&mapping, &required, &headers);
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["Pflichtfeld \"date\" wurde nicht zugeordnet"]);

        let mapping = ColumnMapping::by_index([(fields::MACHINE_NAME, 0), (fields::DATE, 7)]);
        let result = ColumnMapper::validate(&mapping, &required, &headers);
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("\"date\""));
    }

    #[test]
    fn test_validate_duplicate_column_is_only_a_warning() {
        let headers = headers(&["Maschine", "Datum"]);
        let required = vec![fields::MACHINE_NAME.to_string(), fields::DATE.to_string()];
        let mapping = ColumnMapping::by_index([(fields::MACHINE_NAME, 1), (fields::DATE, 1)]);

        let result = ColumnMapper::validate(&mapping, &required, &headers);
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings, vec!["Spalte B wurde mehrfach zugeordnet"]);
    }

    #[test]
    fn test_preferences_overlay_only_existing_columns() {
        let headers = headers(&["Tag", "Std", "Ausschuss"]);
        let mut mapping = ColumnMapper::auto_detect_by_name(&headers, &FieldSchema::template_hours());
        let prefs = UserPreferences {
            user_id: "u1".into(),
            last_datum_column: Some("Tag".into()),
            last_stunden_teg_column: Some("Std".into()),
            last_schicht_column: Some("Schicht".into()),
        };

        ColumnMapper::apply_preferences(&mut mapping, &prefs, &headers);

        assert_eq!(mapping.column_name(fields::DATE), Some("Tag"));
        assert_eq!(mapping.column_name(fields::HOURS), Some("Std"));
        assert_eq!(mapping.column_name(fields::SCRAP_AMOUNT), Some("Ausschuss"));
    }
}
