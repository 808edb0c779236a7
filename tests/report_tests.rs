use shillscope::aggregate::StreamingAggregator;
use shillscope::archive;
use shillscope::config::Config;
use shillscope::message::{LinkAnnotation, RawMessage};
use shillscope::parser::normalize_all;
use shillscope::report::{layout, save_report, versioned_path, ReportFormat};
use shillscope::tables::ReportTables;
use tempfile::tempdir;

fn sample_messages() -> Vec<RawMessage> {
    vec![
        RawMessage {
            id: 1,
            message: "FOO Just launched\nLikes: 50 (+10)".into(),
            date: Some("2024-05-01T10:00:00Z".into()),
            views: 300,
            forwards: 4,
            entities: vec![LinkAnnotation::text_url(0, 3, "https://dexscreener.com/solana/foo")],
        },
        RawMessage {
            id: 2,
            message: "BAR Started\nhttps://dexscreener.com/solana/bar".into(),
            date: Some("2024-05-01T10:05:00Z".into()),
            views: 120,
            forwards: 9,
            entities: vec![],
        },
    ]
}

fn sample_tables() -> ReportTables {
    let mut agg = StreamingAggregator::new();
    agg.ingest_all(normalize_all(&sample_messages(), &Config::default(), None));
    agg.finalize()
}

#[test]
fn versioned_names_skip_existing_files() {
    let dir = tempdir().unwrap();
    assert_eq!(versioned_path(dir.path(), "01.05.2024", "xlsx"), dir.path().join("01.05.2024 V1.xlsx"));
    std::fs::write(dir.path().join("01.05.2024 V1.xlsx"), b"").unwrap();
    std::fs::write(dir.path().join("01.05.2024 V2.xlsx"), b"").unwrap();
    assert_eq!(versioned_path(dir.path(), "01.05.2024", "xlsx"), dir.path().join("01.05.2024 V3.xlsx"));
    assert_eq!(versioned_path(dir.path(), "01.05.2024", "json"), dir.path().join("01.05.2024 V1.json"));
}

#[test]
fn archive_survives_a_save_load_cycle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("history.json");
    let messages = sample_messages();
    archive::save(&path, &messages).unwrap();
    assert_eq!(archive::load(&path).unwrap(), messages);
}

#[test]
fn missing_archive_is_an_error() {
    let dir = tempdir().unwrap();
    let err = archive::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn layout_sheets_and_gaps() {
    let sheets = layout(&sample_tables());
    let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Most Recurring Charts", "Top 10 Disparities", "Top Metrics Instances", "Top Views & Forwards"]);

    // Only Likes has data, so only one disparity table is laid out.
    assert_eq!(sheets[1].tables.len(), 1);
    assert_eq!(sheets[1].tables[0].headers[3], "Max Likes Disparity");
    assert_eq!(sheets[2].tables.len(), 4);

    let views = &sheets[3];
    assert_eq!(views.table_starts(), vec![0, 4]);
    assert_eq!(views.tables[0].headers[0], "date");
}

#[test]
fn json_report_is_written_under_versioned_name() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("reports");
    let first = save_report(&out, "run", ReportFormat::Json, &sample_tables()).unwrap();
    let second = save_report(&out, "run", ReportFormat::Json, &sample_tables()).unwrap();
    assert_eq!(first, out.join("run V1.json"));
    assert_eq!(second, out.join("run V2.json"));

    let body: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&first).unwrap()).unwrap();
    let row = &body["most_recurring_charts"][0];
    assert_eq!(row["token_name"], "FOO");
    assert_eq!(row["avg_inter_arrival"], "N/A");
    assert_eq!(row["metric_means"]["Likes"], 50.0);
    assert_eq!(body["top_views"][0]["timestamp"], "11:00:00 01/05/2024");
}

#[test]
fn xlsx_report_is_written() {
    let dir = tempdir().unwrap();
    let path = save_report(dir.path(), "run", ReportFormat::Xlsx, &sample_tables()).unwrap();
    assert_eq!(path, dir.path().join("run V1.xlsx"));
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}
