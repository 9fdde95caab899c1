// ==========================================
// 车间报表看板 - 命令行入口
// ==========================================
// 子命令: preview / import / import-template / backfill / hours / config
// 输出: 结果以 JSON 打印到 stdout，日志走 stderr
// ==========================================

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use shopfloor_dashboard::config::ConfigManager;
use shopfloor_dashboard::domain::{ColumnMapping, RowFilter, TargetPeriod};
use shopfloor_dashboard::repository::SqliteIngestStore;
use shopfloor_dashboard::{logging, ImportApi};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "shopfloor-dashboard", version, about = "Tabellenimport für das Fertigungs-Dashboard")]
struct Cli {
    /// SQLite 数据库路径
    #[arg(long, env = "SHOPFLOOR_DB_PATH")]
    db: Option<PathBuf>,

    /// 当前用户ID
    #[arg(long, env = "SHOPFLOOR_USER", default_value = "local")]
    user: String,

    /// JSON 格式日志
    #[arg(long)]
    json_log: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 解析文件并显示表头与前几行
    Preview { file: PathBuf },

    /// 分步导入（Rüstzeit + Serienzeit）
    Import {
        file: PathBuf,
        /// 手动映射，格式 field=列名，可重复
        #[arg(long = "map", value_parser = parse_mapping_pair)]
        mappings: Vec<(String, String)>,
        /// 同时导入校验失败的行
        #[arg(long)]
        all_rows: bool,
    },

    /// 模板文件导入（TEG [h] / Ausschuss / Datum / Internes BA-Kürzel / Ressource）
    ImportTemplate { file: PathBuf },

    /// 从归档行重新计算机台日工时
    Backfill,

    /// 周期工时统计
    Hours {
        /// hours_14d / hours_week_3_4 / hours_8_weeks；省略时输出全部
        #[arg(long)]
        period: Option<TargetPeriod>,
        /// 统计基准日（默认今天）
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// 查看或修改 config_kv
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Set { key: String, value: String },
}

fn parse_mapping_pair(raw: &str) -> Result<(String, String), String> {
    let (field, column) = raw
        .split_once('=')
        .ok_or_else(|| format!("映射格式应为 field=列名: {}", raw))?;
    Ok((field.trim().to_string(), column.trim().to_string()))
}

fn default_db_path() -> PathBuf {
    match dirs::data_dir() {
        Some(data_dir) => {
            let dir = data_dir.join("shopfloor-dashboard");
            std::fs::create_dir_all(&dir).ok();
            dir.join("shopfloor_dashboard.db")
        }
        None => PathBuf::from("./shopfloor_dashboard.db"),
    }
}

fn read_upload(path: &Path) -> Result<(Vec<u8>, String)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("无效文件名: {}", path.display()))?
        .to_string();
    let bytes = std::fs::read(path).with_context(|| format!("读取文件失败: {}", path.display()))?;
    Ok((bytes, file_name))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.json_log {
        logging::init_json();
    } else {
        logging::init();
    }

    let db_path = cli.db.unwrap_or_else(default_db_path);
    let db_path = db_path
        .to_str()
        .ok_or_else(|| anyhow!("数据库路径不是有效 UTF-8: {}", db_path.display()))?
        .to_string();
    tracing::info!(
        version = shopfloor_dashboard::VERSION,
        db_path = %db_path,
        user = %cli.user,
        "车间报表看板启动"
    );

    let store = SqliteIngestStore::new(&db_path, &cli.user)?;
    let config = ConfigManager::from_connection(store.connection())
        .map_err(|e| anyhow!("配置初始化失败: {}", e))?;
    let config = Arc::new(config);
    let api = ImportApi::new(Arc::new(store), config.clone());

    match cli.command {
        Command::Preview { file } => {
            let (bytes, file_name) = read_upload(&file)?;
            let table = api.read_file(bytes, &file_name).await?;
            print_json(&api.preview(&table, &file_name).await?)?;
        }
        Command::Import {
            file,
            mappings,
            all_rows,
        } => {
            let (bytes, file_name) = read_upload(&file)?;
            let mapping = (!mappings.is_empty()).then(|| ColumnMapping::by_name(mappings));
            let row_filter = all_rows.then_some(RowFilter::All);
            let response = api
                .import_machine_file(bytes, &file_name, mapping, row_filter)
                .await?;

            let (shown, more) = response.summary.preview_errors(10);
            for error in shown {
                eprintln!("{}", error);
            }
            if more > 0 {
                eprintln!("+{} weitere", more);
            }
            print_json(&response)?;
        }
        Command::ImportTemplate { file } => {
            let (bytes, file_name) = read_upload(&file)?;
            print_json(&api.import_template_file(bytes, &file_name).await?)?;
        }
        Command::Backfill => {
            let written = api.backfill_machine_hours().await?;
            print_json(&serde_json::json!({ "machine_hours_written": written }))?;
        }
        Command::Hours { period, today } => {
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            match period {
                Some(period) => print_json(&api.period_hours(period, today).await?)?,
                None => print_json(&api.all_period_hours(today).await?)?,
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Show => {
                let snapshot = config
                    .get_config_snapshot()
                    .map_err(|e| anyhow!("读取配置失败: {}", e))?;
                println!("{}", snapshot);
            }
            ConfigAction::Set { key, value } => {
                config
                    .set_config_value(&key, &value)
                    .map_err(|e| anyhow!("写入配置失败: {}", e))?;
                tracing::info!(key = %key, value = %value, "配置已更新");
            }
        },
    }

    Ok(())
}
