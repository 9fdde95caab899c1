// ==========================================
// 车间报表看板 - 单元格类型转换
// ==========================================
// 职责: 原始单元格 → 数值 / 日期 / 文本（纯函数，无依赖）
// 数值: 去空白 → 去千分位 "." → 小数逗号转 "."
// 日期: 原生日期直通 / Excel 序列号 / DD.MM.YYYY / YYYY-MM-DD / DD/MM/YYYY / 通用格式
// ==========================================

use crate::domain::table::RawCell;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

/// Excel 序列号纪元（1899-12-30，保留 Excel 1900 闰年偏差以兼容表格日期）
pub fn excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0))
}

// 约 27000 年，超出即视为非日期
const MAX_SERIAL_DAYS: f64 = 10_000_000.0;

/// Excel 序列号 → 日期时间（纪元 + value 天，小数部分为当天时刻）
pub fn excel_serial_to_datetime(value: f64) -> Option<NaiveDateTime> {
    if !value.is_finite() || value.abs() > MAX_SERIAL_DAYS {
        return None;
    }
    let millis = (value * 86_400_000.0).round() as i64;
    excel_epoch()?.checked_add_signed(Duration::milliseconds(millis))
}

/// 解析数值单元格；空值或无法解析返回 None
pub fn parse_number(cell: &RawCell) -> Option<f64> {
    match cell {
        RawCell::Null | RawCell::Date(_) => None,
        RawCell::Number(n) => n.is_finite().then_some(*n),
        RawCell::Text(s) => parse_number_str(s),
    }
}

/// 德式数值文本解析（"1.234,56" → 1234.56, "12,5" → 12.5）
pub fn parse_number_str(value: &str) -> Option<f64> {
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if normalized.is_empty() {
        return None;
    }

    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// 解析日期单元格；空值、0 或无法识别返回 None
pub fn parse_date(cell: &RawCell) -> Option<NaiveDateTime> {
    match cell {
        RawCell::Null => None,
        RawCell::Date(d) => Some(*d),
        RawCell::Number(n) if *n == 0.0 => None,
        RawCell::Number(n) => excel_serial_to_datetime(*n),
        RawCell::Text(s) => parse_date_str(s),
    }
}

/// 日期文本解析，按顺序尝试 DD.MM.YYYY → YYYY-MM-DD → DD/MM/YYYY → 通用格式
pub fn parse_date_str(value: &str) -> Option<NaiveDateTime> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }

    let date = split_date_parts(s, '.')
        .and_then(|(d, m, y)| date_from_parts(y, m, d))
        .or_else(|| split_date_parts(s, '-').and_then(|(y, m, d)| date_from_parts(y, m, d)))
        .or_else(|| split_date_parts(s, '/').and_then(|(d, m, y)| date_from_parts(y, m, d)));

    if let Some(date) = date {
        return date.and_hms_opt(0, 0, 0);
    }

    parse_generic_datetime(s)
}

/// 拆分为三段纯数字
fn split_date_parts(s: &str, sep: char) -> Option<(&str, &str, &str)> {
    let mut parts = s.split(sep);
    let a = parts.next()?;
    let b = parts.next()?;
    let c = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let all_digits = |p: &str| !p.is_empty() && p.chars().all(|ch| ch.is_ascii_digit());
    if all_digits(a) && all_digits(b) && all_digits(c) {
        Some((a, b, c))
    } else {
        None
    }
}

/// 年 4 位，月/日 1-2 位；非法日期（如 31.02.）返回 None
fn date_from_parts(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    if year.len() != 4 || !(1..=2).contains(&month.len()) || !(1..=2).contains(&day.len()) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn parse_generic_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    const FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d.%m.%Y %H:%M:%S",
        "%d.%m.%Y %H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y/%m/%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// 文本化单元格（null → 空串），并 TRIM
pub fn cell_to_text(cell: &RawCell) -> String {
    match cell {
        RawCell::Null => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_number_german_format() {
        assert_eq!(parse_number(&RawCell::from("1.234,56")), Some(1234.56));
        assert_eq!(parse_number(&RawCell::from("12,5")), Some(12.5));
        assert_eq!(parse_number(&RawCell::from(" 4 500 ")), Some(4500.0));
        assert_eq!(parse_number(&RawCell::from("abc")), None);
        assert_eq!(parse_number(&RawCell::from("")), None);
        assert_eq!(parse_number(&RawCell::from("   ")), None);
        assert_eq!(parse_number(&RawCell::Number(7.0)), Some(7.0));
        assert_eq!(parse_number(&RawCell::Null), None);
    }

    #[test]
    fn test_parse_number_dot_is_thousands_separator() {
        // "." 一律视为千分位
        assert_eq!(parse_number(&RawCell::from("12.5")), Some(125.0));
        assert_eq!(parse_number(&RawCell::from("-5")), Some(-5.0));
    }

    #[test]
    fn test_parse_date_german_format() {
        let parsed = parse_date(&RawCell::from("05.03.2024")).unwrap();
        assert_eq!(parsed.year(), 2024);
        assert_eq!(parsed.month0(), 2);
        assert_eq!(parsed.day(), 5);

        assert_eq!(parse_date(&RawCell::from("5.3.2024")), Some(ymd(2024, 3, 5)));
    }

    #[test]
    fn test_parse_date_iso_and_slash_formats() {
        assert_eq!(parse_date(&RawCell::from("2024-01-15")), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date(&RawCell::from("15/01/2024")), Some(ymd(2024, 1, 15)));
        assert_eq!(
            parse_date(&RawCell::from("2024-01-15T08:30:00")),
            Some(ymd(2024, 1, 15).with_hour(8).unwrap().with_minute(30).unwrap())
        );
    }

    #[test]
    fn test_parse_date_rejects_garbage_and_impossible_dates() {
        assert_eq!(parse_date(&RawCell::from("kein Datum")), None);
        assert_eq!(parse_date(&RawCell::from("31.02.2024")), None);
        assert_eq!(parse_date(&RawCell::from("05.03.24")), None);
        assert_eq!(parse_date(&RawCell::from("")), None);
        assert_eq!(parse_date(&RawCell::Null), None);
    }

    #[test]
    fn test_excel_serial_dates() {
        let expected = excel_epoch().unwrap() + Duration::days(45000);
        assert_eq!(parse_date(&RawCell::Number(45000.0)), Some(expected));
        assert_eq!(expected.date(), NaiveDate::from_ymd_opt(2023, 3, 15).unwrap());

        // 小数部分为当天时刻
        let noon = parse_date(&RawCell::Number(45000.5)).unwrap();
        assert_eq!(noon.hour(), 12);

        assert_eq!(parse_date(&RawCell::Number(0.0)), None);
        assert_eq!(excel_serial_to_datetime(f64::NAN), None);
    }

    #[test]
    fn test_native_date_passes_through() {
        let d = ymd(2024, 1, 15);
        assert_eq!(parse_date(&RawCell::Date(d)), Some(d));
    }

    #[test]
    fn test_cell_to_text() {
        assert_eq!(cell_to_text(&RawCell::Null), "");
        assert_eq!(cell_to_text(&RawCell::from("  M1 ")), "M1");
        assert_eq!(cell_to_text(&RawCell::Number(42.0)), "42");
    }
}
