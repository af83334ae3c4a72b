use std::net::SocketAddr;
use std::path::Path;

use objection_dashboard::dashboard::config_reader::Settings;
use objection_dashboard::dashboard::server::{build_router, AppState};
use objection_stats::{ColumnNames, ReportRules};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const HEADER: &str = "تاريخ تقديم الاعتراض,نوع الرقابة,اسم الادارة,حالة الاعتراض,اسم البلدية";

fn objections_csv() -> String {
    [
        HEADER,
        "2025-01-15,Building,Permits,مكتمل - مقبول,North",
        "2025-07-01, Building ,Permits,قيد المراجعة,North",
        "2025-08-11,Signage,Licensing,مكتمل - مقبول,South",
        "2025-03-03,Signage,Licensing,مكتمل - مقبول,بلدية اجادة",
        "2026-01-05,Building,Permits,مكتمل - مقبول,North",
        "not a date,Building,Permits,مكتمل - مقبول,North",
        "",
    ]
    .join("\n")
}

fn settings_for(path: &Path) -> Settings {
    Settings {
        input_path: path.to_path_buf(),
        worksheet: None,
        columns: ColumnNames::default(),
        rules: ReportRules::default(),
        bind: "127.0.0.1:0".parse().expect("bind address"),
    }
}

async fn spawn_app(settings: Settings) -> SocketAddr {
    let app = build_router(AppState::new(settings));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    addr
}

async fn send_raw(addr: SocketAddr, path: &str) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let req = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("status");
    (status, head.to_string(), body.to_string())
}

async fn get_json(addr: SocketAddr, path: &str) -> (u16, Value) {
    let (status, _, body) = send_raw(addr, path).await;
    let json: Value = serde_json::from_str(&body).expect("json body");
    (status, json)
}

fn percent_encode(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

#[tokio::test]
async fn options_and_data_on_a_csv_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("objections.csv");
    std::fs::write(&path, objections_csv()).expect("write csv");
    let addr = spawn_app(settings_for(&path)).await;

    let (status, options) = get_json(addr, "/options").await;
    assert_eq!(status, 200);
    assert_eq!(options["municipalities"], serde_json::json!(["North", "South"]));
    assert_eq!(options["departments"], serde_json::json!(["Licensing", "Permits"]));
    assert_eq!(options["types"], serde_json::json!(["Building", "Signage"]));

    let (status, data) = get_json(addr, "/data").await;
    assert_eq!(status, 200);
    assert_eq!(
        data["config"]["labels"],
        serde_json::json!(["2025-Q1", "2025-Q2", "2025-Q3", "2025-Q4"])
    );
    assert_eq!(data["config"]["year"], 2025);
    assert_eq!(data["config"]["cutoff"], "2025-12-13");
    assert_eq!(data["config"]["muni"], "ALL");
    assert_eq!(data["config"]["type"], "ALL");
    assert_eq!(data["excluded_rows"], 1);

    let cards = data["cards"].as_array().expect("cards");
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0]["title"], "Building");
    assert_eq!(cards[0]["slug"], "building");
    assert_eq!(cards[0]["series"]["total"], serde_json::json!([1, 0, 1, 0]));
    assert_eq!(cards[0]["series"]["approved"], serde_json::json!([1, 0, 0, 0]));
    assert_eq!(cards[1]["title"], "Signage");
    assert_eq!(cards[1]["series"]["total"], serde_json::json!([0, 0, 1, 0]));
    assert_eq!(cards[1]["series"]["approved"], serde_json::json!([0, 0, 1, 0]));
}

#[tokio::test]
async fn data_filters_are_independent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("objections.csv");
    std::fs::write(&path, objections_csv()).expect("write csv");
    let addr = spawn_app(settings_for(&path)).await;

    let (status, data) = get_json(addr, "/data?muni=north&dept=ALL&type=building").await;
    assert_eq!(status, 200);
    assert_eq!(data["config"]["muni"], "north");
    let cards = data["cards"].as_array().expect("cards");
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["title"], "building");
    assert_eq!(cards[0]["series"]["total"], serde_json::json!([1, 0, 1, 0]));

    let (status, data) = get_json(addr, "/data?dept=Licensing").await;
    assert_eq!(status, 200);
    let cards = data["cards"].as_array().expect("cards");
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["title"], "Signage");
}

#[tokio::test]
async fn unknown_municipality_gives_no_cards() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("objections.csv");
    std::fs::write(&path, objections_csv()).expect("write csv");
    let addr = spawn_app(settings_for(&path)).await;

    let query = format!("/data?muni={}", percent_encode("بلدية الوسط"));
    let (status, data) = get_json(addr, &query).await;
    assert_eq!(status, 200);
    assert_eq!(data["config"]["muni"], "بلدية الوسط");
    assert_eq!(data["cards"], serde_json::json!([]));
    assert_eq!(
        data["config"]["labels"].as_array().expect("labels").len(),
        4
    );
}

#[tokio::test]
async fn missing_columns_are_json_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("objections.csv");
    std::fs::write(&path, "تاريخ تقديم الاعتراض,نوع الرقابة\n2025-01-15,Building\n")
        .expect("write csv");
    let addr = spawn_app(settings_for(&path)).await;

    for endpoint in ["/options", "/data"] {
        let (status, head, body) = send_raw(addr, endpoint).await;
        assert_eq!(status, 500, "{endpoint}");
        assert!(
            head.to_lowercase().contains("application/json"),
            "{endpoint}: {head}"
        );
        let json: Value = serde_json::from_str(&body).expect("json body");
        let msg = json["error"].as_str().expect("error message");
        assert!(msg.contains("اسم البلدية"), "{endpoint}: {msg}");
    }
}

#[tokio::test]
async fn missing_file_is_retried_on_the_next_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("objections.csv");
    let addr = spawn_app(settings_for(&path)).await;

    let (status, json) = get_json(addr, "/options").await;
    assert_eq!(status, 500);
    let msg = json["error"].as_str().expect("error message");
    assert!(msg.contains("objections.csv"), "{msg}");

    std::fs::write(&path, objections_csv()).expect("write csv");
    let (status, options) = get_json(addr, "/options").await;
    assert_eq!(status, 200);
    assert_eq!(options["types"], serde_json::json!(["Building", "Signage"]));
}

#[tokio::test]
async fn health_does_not_load_the_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let addr = spawn_app(settings_for(&dir.path().join("absent.xlsx"))).await;

    let (status, json) = get_json(addr, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(json, serde_json::json!({"status": "ok"}));
}

#[tokio::test]
async fn malformed_queries_are_bad_requests() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("objections.csv");
    std::fs::write(&path, objections_csv()).expect("write csv");
    let addr = spawn_app(settings_for(&path)).await;

    for query in ["/data?muni=a&muni=b", "/data?muni=%FF", "/data?dept=North&type=%C3%28"] {
        let (status, json) = get_json(addr, query).await;
        assert_eq!(status, 400, "{query}");
        let msg = json["error"].as_str().expect("error message");
        assert!(!msg.is_empty(), "{query}");
    }

    let (_, json) = get_json(addr, "/data?muni=%FF").await;
    assert_eq!(json["error"], "query parameter muni is not valid UTF-8");

    // A well-formed query still works on the same server.
    let (status, _) = get_json(addr, "/data?muni=North").await;
    assert_eq!(status, 200);
}
