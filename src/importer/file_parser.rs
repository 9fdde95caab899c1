// ==========================================
// 车间报表看板 - 文件解析器实现
// ==========================================
// 阶段 0: 上传文件 → RawTable（表头 + 列字母 + 原始数据行）
// 支持: CSV (.csv) / Excel (.xlsx/.xls，仅首个工作表)
// ==========================================

use crate::domain::table::{RawCell, RawTable};
use crate::importer::cell_coercion::{excel_serial_to_datetime, parse_date_str};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::FileParser;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::{ReaderBuilder, Trim};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, instrument};

/// 候选分隔符（按优先级，计数相同时保留靠前者）
const CANDIDATE_DELIMITERS: [u8; 4] = [b';', b',', b'\t', b'|'];

// ==========================================
// 文件类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Xlsx,
    Xls,
}

impl FileKind {
    /// 按扩展名（不区分大小写）判定文件类型
    pub fn from_file_name(file_name: &str) -> ImportResult<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => Ok(FileKind::Csv),
            "xlsx" => Ok(FileKind::Xlsx),
            "xls" => Ok(FileKind::Xls),
            _ => Err(ImportError::UnsupportedFormat(file_name.to_string())),
        }
    }
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 以首行字段数最多者为分隔符（; , \t |）
    pub fn detect_delimiter(line: &str) -> u8 {
        let mut best = CANDIDATE_DELIMITERS[0];
        let mut max_count = 0;

        for delimiter in CANDIDATE_DELIMITERS {
            let count = line.split(delimiter as char).count();
            if count > max_count {
                max_count = count;
                best = delimiter;
            }
        }

        best
    }
}

impl FileParser for CsvParser {
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<RawTable> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_start_matches('\u{feff}');

        // 跳过空白行
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let first_line = lines
            .first()
            .ok_or_else(|| ImportError::EmptyFile("CSV-Datei ist leer".to_string()))?;

        let delimiter = Self::detect_delimiter(first_line);
        debug!(delimiter = %(delimiter as char).escape_default(), lines = lines.len(), "CSV 分隔符识别完成");

        let content = lines.join("\n");
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .flexible(true) // 允许行长度不一致
            .trim(Trim::All)
            .from_reader(content.as_bytes());

        let mut records = reader.records();
        let headers: Vec<String> = match records.next() {
            Some(record) => record?.iter().map(|h| h.to_string()).collect(),
            None => return Err(ImportError::EmptyFile("CSV-Datei ist leer".to_string())),
        };

        let mut rows = Vec::new();
        for record in records {
            let record = record?;
            rows.push(record.iter().map(RawCell::from).collect::<Vec<_>>());
        }

        if rows.is_empty() {
            return Err(ImportError::EmptyFile(
                "CSV-Datei enthält keine Datenzeilen".to_string(),
            ));
        }

        Ok(RawTable::new(headers, rows))
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl ExcelParser {
    /// calamine 单元格 → RawCell
    fn to_raw_cell(cell: &Data) -> RawCell {
        match cell {
            Data::Empty => RawCell::Null,
            Data::String(s) => RawCell::Text(s.clone()),
            Data::Float(f) => RawCell::Number(*f),
            Data::Int(i) => RawCell::Number(*i as f64),
            Data::Bool(b) => RawCell::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
                .map(RawCell::Date)
                .unwrap_or(RawCell::Number(dt.as_f64())),
            Data::DateTimeIso(s) => parse_date_str(s)
                .map(RawCell::Date)
                .unwrap_or_else(|| RawCell::Text(s.clone())),
            Data::DurationIso(s) => RawCell::Text(s.clone()),
            Data::Error(e) => RawCell::Text(e.to_string()),
        }
    }

    fn header_text(cell: &Data) -> String {
        match cell {
            Data::Empty => String::new(),
            other => other.to_string().trim().to_string(),
        }
    }
}

impl FileParser for ExcelParser {
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<RawTable> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        // 读取第一个 sheet
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ImportError::EmptyFile("Excel-Datei ist leer".to_string()))??;

        let mut sheet_rows = range.rows();
        let header_row = sheet_rows
            .next()
            .ok_or_else(|| ImportError::EmptyFile("Excel-Datei ist leer".to_string()))?;
        let headers: Vec<String> = header_row.iter().map(Self::header_text).collect();

        let mut rows = Vec::new();
        for data_row in sheet_rows {
            let cells: Vec<RawCell> = data_row.iter().map(Self::to_raw_cell).collect();

            // 跳过完全空白的行（部分空白保留）
            if cells.iter().all(RawCell::is_blank) {
                continue;
            }
            rows.push(cells);
        }

        if rows.is_empty() {
            return Err(ImportError::EmptyFile(
                "Excel-Datei enthält keine Datenzeilen".to_string(),
            ));
        }

        Ok(RawTable::new(headers, rows))
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub fn parse(&self, bytes: &[u8], file_name: &str) -> ImportResult<RawTable> {
        let table = match FileKind::from_file_name(file_name)? {
            FileKind::Csv => CsvParser.parse_bytes(bytes)?,
            FileKind::Xlsx | FileKind::Xls => ExcelParser.parse_bytes(bytes)?,
        };

        debug!(
            columns = table.width(),
            rows = table.row_count(),
            "文件解析完成"
        );
        Ok(table)
    }

    /// 整体解码作为一个挂起点：要么得到完整 RawTable，要么整体失败
    pub async fn parse_async(&self, bytes: Vec<u8>, file_name: String) -> ImportResult<RawTable> {
        tokio::task::spawn_blocking(move || UniversalFileParser.parse(&bytes, &file_name))
            .await
            .map_err(|e| ImportError::InternalError(format!("解析任务失败: {}", e)))?
    }

    pub fn parse_path<P: AsRef<Path>>(&self, path: P) -> ImportResult<RawTable> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        // 先校验扩展名再读文件
        FileKind::from_file_name(&file_name)?;
        let bytes = std::fs::read(path)?;
        self.parse(&bytes, &file_name)
    }
}
