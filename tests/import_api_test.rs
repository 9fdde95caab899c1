// ==========================================
// ImportApi 端到端测试
// ==========================================
// 测试目标: 向导导入（xlsx）、模板导入（csv）、偏好叠加、
//           工时回填、周期工时、配置驱动的废品写入方式
// ==========================================


use chrono::NaiveDate;
use shopfloor_dashboard::config::config_keys;
use shopfloor_dashboard::domain::{
    fields, ColumnMapping, FieldSchema, RawCell, RecordRow, TargetPeriod, UserPreferences,
};
use shopfloor_dashboard::logging;
use shopfloor_dashboard::repository::IngestStore;
use shopfloor_dashboard::ApiError;
use test_helpers::{create_api, create_store_and_config, create_test_db, csv_bytes, xlsx_bytes, Cell};

const WIZARD_HEADERS: [&str; 7] = [
    "Maschine",
    "Datum",
    "Rüstzeit",
    "Serienzeit",
    "Ausschuss",
    "BAB",
    "Auftragsnummer",
];

fn wizard_rows() -> Vec<Vec<Cell>> {
    vec![
        vec![
            Cell::Text("M1"),
            Cell::Text("15.01.2024"),
            Cell::Number(30.0),
            Cell::Number(90.0),
            Cell::Number(2.0),
            Cell::Text("BA-1"),
            Cell::Text("A1"),
        ],
        vec![
            Cell::Text("M1"),
            Cell::Text("15.01.2024"),
            Cell::Number(0.0),
            Cell::Number(60.0),
            Cell::Number(1.0),
            Cell::Text("BA-1"),
            Cell::Text("A1"),
        ],
        vec![
            Cell::Text("M2"),
            Cell::Text("kein Datum"),
            Cell::Number(10.0),
            Cell::Number(10.0),
            Cell::Number(0.0),
            Cell::Empty,
            Cell::Text("A2"),
        ],
    ]
}

fn template_csv() -> Vec<u8> {
    csv_bytes(&[
        "TEG [h];Ausschuss;Datum;Internes BA-Kürzel;Ressource;Menge gut",
        "3,5;2;28.02.2024;BA-7;M1;100",
        "4,0;0;28.02.2024;BA-8;M1;80",
        "4,0;0;28.02.2024;BA-8;M1;80",
        "6;1;10.02.2024;BA-9;M2;50",
        "2;5;20.02.2024;BA-9;Unbekannt;10",
    ])
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

// ==========================================
// 上传 / 预览
// ==========================================

#[tokio::test]
async fn test_preview_xlsx_formats_cells() {
    logging::init_test();
    let (_temp, db_path) = create_test_db().unwrap();
    let (store, config) = create_store_and_config(&db_path).unwrap();
    let api = create_api(&store, &config);

    let bytes = xlsx_bytes(&WIZARD_HEADERS, &wizard_rows()).unwrap();
    let table = api.read_file(bytes, "schicht.xlsx").await.unwrap();
    let preview = api.preview(&table, "schicht.xlsx").await.unwrap();

    assert_eq!(preview.total_rows, 3);
    assert_eq!(preview.column_letters[6], "G");
    assert_eq!(preview.preview_rows[0][2], "30");
    assert_eq!(preview.preview_rows[2][5], "");
}

#[tokio::test]
async fn test_unsupported_extension_is_format_error() {
    let (_temp, db_path) = create_test_db().unwrap();
    let (store, config) = create_store_and_config(&db_path).unwrap();
    let api = create_api(&store, &config);

    let err = api.read_file(b"x".to_vec(), "daten.txt").await.unwrap_err();
    assert!(matches!(err, ApiError::FileFormat(_)));
    assert!(err.to_string().starts_with("Nicht unterstütztes Dateiformat"));
}

#[tokio::test]
async fn test_header_only_csv_is_empty_file() {
    let (_temp, db_path) = create_test_db().unwrap();
    let (store, config) = create_store_and_config(&db_path).unwrap();
    let api = create_api(&store, &config);

    let err = api
        .read_file(csv_bytes(&["Maschine;Datum"]), "leer.csv")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::FileFormat(_)));
}

// ==========================================
// 向导导入
// ==========================================

#[tokio::test]
async fn test_wizard_import_from_xlsx() {
    let (_temp, db_path) = create_test_db().unwrap();
    let (store, config) = create_store_and_config(&db_path).unwrap();
    let api = create_api(&store, &config);

    let bytes = xlsx_bytes(&WIZARD_HEADERS, &wizard_rows()).unwrap();
    let response = api
        .import_machine_file(bytes, "schicht.xlsx", None, None)
        .await
        .unwrap();

    assert_eq!(response.summary.total_rows, 3);
    assert_eq!(response.summary.invalid_rows, 1);
    assert_eq!(
        response.summary.errors,
        vec!["Zeile 4, Feld \"date\": Ungültiges Datum \"kein Datum\"".to_string()]
    );
    assert_eq!(response.report.rows_processed, 2);

    let hours = store.list_machine_hours().unwrap();
    assert_eq!(hours.len(), 1);
    assert_eq!(hours[0].hours_worked, 3.0);

    let scrap = store.list_scrap_records().unwrap();
    assert_eq!(scrap.len(), 1);
    assert_eq!(scrap[0].bab_number, "BA-1");
    assert_eq!(scrap[0].scrap_amount, 3.0);
    assert_eq!(response.report.machines_discovered, vec!["M1".to_string()]);
}

#[tokio::test]
async fn test_wizard_rejects_incomplete_mapping() {
    let (_temp, db_path) = create_test_db().unwrap();
    let (store, config) = create_store_and_config(&db_path).unwrap();
    let api = create_api(&store, &config);

    let bytes = xlsx_bytes(&WIZARD_HEADERS, &wizard_rows()).unwrap();
    let mapping = ColumnMapping::by_name([(fields::MACHINE_NAME, "Maschine")]);
    let err = api
        .import_machine_file(bytes, "schicht.xlsx", Some(mapping), None)
        .await
        .unwrap_err();

    match err {
        ApiError::MappingInvalid { errors } => {
            assert_eq!(errors.len(), 6);
            assert!(errors.contains(&"Pflichtfeld \"date\" wurde nicht zugeordnet".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.list_machine_hours().unwrap().is_empty());
}

#[tokio::test]
async fn test_configured_replace_mode_applies_to_wizard() {
    let (_temp, db_path) = create_test_db().unwrap();
    let (store, config) = create_store_and_config(&db_path).unwrap();
    config
        .set_config_value(config_keys::SCRAP_PERSIST_MODE, "replace_by_key")
        .unwrap();
    let api = create_api(&store, &config);

    for _ in 0..2 {
        let bytes = xlsx_bytes(&WIZARD_HEADERS, &wizard_rows()).unwrap();
        api.import_machine_file(bytes, "schicht.xlsx", None, None)
            .await
            .unwrap();
    }

    assert_eq!(store.list_scrap_records().unwrap().len(), 1);
    assert_eq!(store.list_machine_hours().unwrap()[0].hours_worked, 3.0);
}

// ==========================================
// 模板导入
// ==========================================

#[tokio::test]
async fn test_template_import_archives_and_aggregates() {
    let (_temp, db_path) = create_test_db().unwrap();
    let (store, config) = create_store_and_config(&db_path).unwrap();
    let api = create_api(&store, &config);

    let response = api
        .import_template_file(template_csv(), "vorlage.csv")
        .await
        .unwrap();

    assert_eq!(response.rows_archived, 5);
    assert_eq!(response.report.machines_discovered, vec!["M1".to_string(), "M2".to_string()]);

    let stored = store.latest_column_mapping().await.unwrap().unwrap();
    assert_eq!(stored.id, response.mapping_id);
    assert_eq!(stored.mapping_name, "Import vorlage.csv");
    assert_eq!(stored.mapping.column_name(fields::ORDER_NUMBER), Some("Internes BA-Kürzel"));

    let prefs = store.get_user_preferences().await.unwrap().unwrap();
    assert_eq!(prefs.last_stunden_teg_column.as_deref(), Some("TEG [h]"));
    assert_eq!(prefs.last_schicht_column.as_deref(), Some("Ausschuss"));

    let hours = store.list_machine_hours().unwrap();
    assert_eq!(hours.len(), 2);
    assert_eq!(hours[0].machine_name, "M1");
    assert_eq!(hours[0].hours_worked, 11.5);

    // 逐行写入，不分组
    let scrap = store.list_scrap_records().unwrap();
    assert_eq!(scrap.len(), 2);
}

#[tokio::test]
async fn test_template_import_uses_remembered_columns() {
    let (_temp, db_path) = create_test_db().unwrap();
    let (store, config) = create_store_and_config(&db_path).unwrap();
    let api = create_api(&store, &config);

    let file = || {
        csv_bytes(&[
            "Std;Ausschuss;Datum;Internes BA-Kürzel;Ressource",
            "8;0;28.02.2024;BA-1;M1",
        ])
    };

    let err = api.import_template_file(file(), "a.csv").await.unwrap_err();
    assert!(matches!(err, ApiError::MappingInvalid { .. }));

    store
        .upsert_user_preferences(UserPreferences {
            user_id: "u1".to_string(),
            last_stunden_teg_column: Some("Std".to_string()),
            ..UserPreferences::default()
        })
        .await
        .unwrap();

    let response = api.import_template_file(file(), "a.csv").await.unwrap();
    assert_eq!(response.report.machine_hours_written, 1);
    assert_eq!(store.list_machine_hours().unwrap()[0].hours_worked, 8.0);
}

// ==========================================
// 周期工时
// ==========================================

#[tokio::test]
async fn test_period_hours_over_archived_rows() {
    let (_temp, db_path) = create_test_db().unwrap();
    let (store, config) = create_store_and_config(&db_path).unwrap();
    let api = create_api(&store, &config);

    let empty = api.period_hours(TargetPeriod::FourteenDays, today()).await.unwrap();
    assert_eq!(empty.total_hours, 0.0);

    api.import_template_file(template_csv(), "vorlage.csv")
        .await
        .unwrap();

    let recent = api.period_hours(TargetPeriod::FourteenDays, today()).await.unwrap();
    // 重复行只计一次
    assert_eq!(recent.unique_rows, 4);
    assert_eq!(recent.total_hours, 3.5 + 4.0 + 2.0);
    assert_eq!(recent.target_hours, 450.0);

    let all = api.all_period_hours(today()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[1].total_hours, 6.0);
    assert_eq!(all[2].target_hours, 1800.0);
}

// ==========================================
// 工时回填
// ==========================================

fn archived(machine: RawCell, datum: &str, setup: f64, production: f64, bab: &str) -> RecordRow {
    let mut row = RecordRow::new();
    row.insert("Maschine".into(), machine);
    row.insert("Datum".into(), RawCell::from(datum));
    row.insert("Rüstzeit".into(), RawCell::Number(setup));
    row.insert("Serienzeit".into(), RawCell::Number(production));
    row.insert("BAB".into(), RawCell::from(bab));
    row
}

#[tokio::test]
async fn test_backfill_without_mapping_is_not_found() {
    let (_temp, db_path) = create_test_db().unwrap();
    let (store, config) = create_store_and_config(&db_path).unwrap();
    let api = create_api(&store, &config);

    let err = api.backfill_machine_hours().await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_backfill_rejects_template_mapping() {
    let (_temp, db_path) = create_test_db().unwrap();
    let (store, config) = create_store_and_config(&db_path).unwrap();
    let api = create_api(&store, &config);

    api.import_template_file(template_csv(), "vorlage.csv")
        .await
        .unwrap();

    let err = api.backfill_machine_hours().await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
    assert!(err.to_string().contains("setup_time"));
}

#[tokio::test]
async fn test_backfill_recomputes_hours_from_archive() {
    let (_temp, db_path) = create_test_db().unwrap();
    let (store, config) = create_store_and_config(&db_path).unwrap();
    let api = create_api(&store, &config);

    let mapping = ColumnMapping::by_name([
        (fields::MACHINE_NAME, "Maschine"),
        (fields::DATE, "Datum"),
        (fields::SETUP_TIME, "Rüstzeit"),
        (fields::PRODUCTION_TIME, "Serienzeit"),
        (fields::BAB_NUMBER, "BAB"),
    ]);
    let stored = store
        .insert_column_mapping("Rückrechnung", &mapping)
        .await
        .unwrap();
    let rows = vec![
        archived(RawCell::from("M1"), "15.01.2024", 30.0, 30.0, "BA1"),
        archived(RawCell::from("M1"), "15.01.2024", 60.0, 0.0, "BA2"),
        archived(RawCell::from("#NV"), "15.01.2024", 60.0, 0.0, "BA1"),
        archived(RawCell::Number(123.0), "15.01.2024", 60.0, 0.0, "BA1"),
        archived(RawCell::from("456"), "15.01.2024", 60.0, 0.0, "BA1"),
        archived(RawCell::from("M2"), "16.01.2024", -30.0, 0.0, "BA1"),
        archived(RawCell::from("M3"), "16.01.2024", 30.0, 0.0, ""),
    ];

    let err = api.backfill_machine_hours().await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    store
        .insert_excel_rows(&stored.id, "alt.xlsx", rows)
        .await
        .unwrap();

    let written = api.backfill_machine_hours().await.unwrap();
    assert_eq!(written, 1);

    let hours = store.list_machine_hours().unwrap();
    assert_eq!(hours.len(), 1);
    assert_eq!(hours[0].machine_name, "M1");
    assert_eq!(hours[0].hours_worked, 2.0);

    // 回填可重复执行
    assert_eq!(api.backfill_machine_hours().await.unwrap(), 1);
    assert_eq!(store.list_machine_hours().unwrap()[0].hours_worked, 2.0);
}

// ==========================================
// 分步 API（映射建议 / 校验）
// ==========================================

#[tokio::test]
async fn test_step_by_step_mapping_and_validation() {
    let (_temp, db_path) = create_test_db().unwrap();
    let (store, config) = create_store_and_config(&db_path).unwrap();
    let api = create_api(&store, &config);
    let schema = FieldSchema::machine_minutes();

    let bytes = xlsx_bytes(&WIZARD_HEADERS, &wizard_rows()).unwrap();
    let table = api.read_file(bytes, "schicht.xlsx").await.unwrap();

    let mut mapping = api.suggest_mapping(&table, &schema);
    assert_eq!(mapping.column_index(fields::BAB_NUMBER, &table.headers), Some(5));
    assert!(api.validate_mapping(&table, &mapping, &schema).is_valid);

    // 同一列映射两次只产生警告
    mapping.set(fields::GOOD_QUANTITY, shopfloor_dashboard::ColumnRef::Index(4));
    let check = api.validate_mapping(&table, &mapping, &schema);
    assert!(check.is_valid);
    assert_eq!(check.warnings, vec!["Spalte E wurde mehrfach zugeordnet".to_string()]);

    let validation = api.validate_rows(&table, &mapping, &schema);
    assert_eq!(validation.rows.len(), table.row_count());
    let (shown, more) = validation.summary.preview_errors(5);
    assert_eq!(shown.len(), 1);
    assert_eq!(more, 0);
}
