use axum::http::StatusCode;
use clowee::api;
use clowee::config::Config;
use clowee::db::init_db;
use clowee::domain::{MachineId, SettingField};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    repo: Arc<clowee::Repository>,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(clowee::Repository::new(pool));

    let config = Config {
        port: 0,
        bind_addr: [127, 0, 0, 1].into(),
        database_path: db_path,
        db_max_connections: 1,
        invoice_prefix: "CLW".to_string(),
    };

    TestApp {
        app: api::create_router(api::AppState::new(repo.clone(), config)),
        repo,
        _temp: temp_dir,
    }
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, body)
}

async fn request(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Machine with coin 2, doll 5, electricity 100, VAT 10%, maintenance 5%, 50/50 split,
/// read at 500/10 on Jan 15 and 1500/30 on Jan 31.
async fn seeded_machine(t: &TestApp) -> MachineId {
    let (_, created) = request(
        &t.app,
        "POST",
        "/v1/machines",
        Some(json!({
            "name": "Claw A",
            "location": "Gulshan",
            "coinPrice": 2,
            "dollPrice": 5,
            "electricityCost": 100,
            "vatPercentage": 10,
            "maintenancePercentage": 5,
            "ownerProfitSharePercentage": 50,
            "cloweeProfitSharePercentage": 50,
            "duration": "half_month"
        })),
    )
    .await;
    let id = MachineId::new(created["id"].as_str().unwrap().to_string());

    let d = |s: &str| clowee::domain::parse_date(s).unwrap();
    t.repo.upsert_counter_reading(&id, d("2024-01-15"), 500, 10).await.unwrap();
    t.repo.upsert_counter_reading(&id, d("2024-01-31"), 1500, 30).await.unwrap();
    id
}

fn period(id: &MachineId, start: &str, end: &str) -> Value {
    json!({"machineId": id.as_str(), "startDate": start, "endDate": end, "createdBy": "ops"})
}

#[tokio::test]
async fn test_preview_reference_breakdown() {
    let t = setup_test_app().await;
    let id = seeded_machine(&t).await;

    let (status, body) = request(
        &t.app,
        "POST",
        "/v1/settlements/preview",
        Some(period(&id, "2024-01-16", "2024-01-31")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let b = &body["breakdown"];
    assert_eq!(b["coins"], 1000);
    assert_eq!(b["prizes"], 20);
    assert_eq!(b["totalIncome"].as_f64(), Some(2000.0));
    assert_eq!(b["prizeCost"].as_f64(), Some(100.0));
    assert_eq!(b["vatAmount"].as_f64(), Some(200.0));
    assert_eq!(b["maintenanceCost"].as_f64(), Some(100.0));
    assert_eq!(b["profitShareAmount"].as_f64(), Some(800.0));
    assert_eq!(b["totalAmount"].as_f64(), Some(1500.0));
    assert_eq!(b["payToClowee"].as_f64(), Some(850.0));

    // Preview persists nothing.
    let (_, list) = request(&t.app, "GET", "/v1/settlements", None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_preview_uses_settings_in_force_at_period_end() {
    let t = setup_test_app().await;
    let id = seeded_machine(&t).await;
    let d = |s: &str| clowee::domain::parse_date(s).unwrap();

    t.repo
        .add_setting(&id, SettingField::DollPrice, "6", d("2024-01-20"), None)
        .await
        .unwrap();

    let (_, body) = request(
        &t.app,
        "POST",
        "/v1/settlements/preview",
        Some(period(&id, "2024-01-16", "2024-01-31")),
    )
    .await;
    assert_eq!(body["settings"]["dollPrice"].as_f64(), Some(6.0));
    assert_eq!(body["breakdown"]["prizeCost"].as_f64(), Some(120.0));
}

#[tokio::test]
async fn test_settlement_errors() {
    let t = setup_test_app().await;
    let id = seeded_machine(&t).await;

    // No reading on or before the period end.
    let (status, body) = request(
        &t.app,
        "POST",
        "/v1/settlements/preview",
        Some(period(&id, "2023-12-01", "2023-12-31")),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("2023-12-31"));

    let (status, _) = request(
        &t.app,
        "POST",
        "/v1/settlements/preview",
        Some(period(&id, "2024-02-01", "2024-01-31")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        &t.app,
        "POST",
        "/v1/settlements/preview",
        Some(period(&MachineId::new("ghost".into()), "2024-01-16", "2024-01-31")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_overflowing_settlement_is_bad_request() {
    let t = setup_test_app().await;
    let id = seeded_machine(&t).await;
    let d = |s: &str| clowee::domain::parse_date(s).unwrap();

    t.repo
        .add_setting(
            &id,
            SettingField::CoinPrice,
            "79228162514264337593543950335",
            d("2024-01-01"),
            None,
        )
        .await
        .unwrap();

    let (status, body) = request(
        &t.app,
        "POST",
        "/v1/settlements",
        Some(period(&id, "2024-01-16", "2024-01-31")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("overflow"));

    let (_, list) = request(&t.app, "GET", "/v1/settlements", None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_list_get_delete() {
    let t = setup_test_app().await;
    let id = seeded_machine(&t).await;

    let (status, saved) = request(
        &t.app,
        "POST",
        "/v1/settlements",
        Some(period(&id, "2024-01-16", "2024-01-31")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(saved["payToClowee"].as_f64(), Some(850.0));
    assert_eq!(saved["machineName"], "Claw A");
    let settlement_id = saved["id"].as_str().unwrap().to_string();

    let (_, mine) = request(&t.app, "GET", "/v1/settlements?createdBy=ops", None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    let (_, theirs) = request(&t.app, "GET", "/v1/settlements?createdBy=someone", None).await;
    assert!(theirs.as_array().unwrap().is_empty());

    let uri = format!("/v1/settlements/{}", settlement_id);
    let (status, fetched) = request(&t.app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], settlement_id.as_str());

    let (status, _) = request(&t.app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = request(&t.app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = request(&t.app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invoice_once_per_settlement() {
    let t = setup_test_app().await;
    let id = seeded_machine(&t).await;
    let (_, saved) = request(
        &t.app,
        "POST",
        "/v1/settlements",
        Some(period(&id, "2024-01-16", "2024-01-31")),
    )
    .await;
    let settlement_id = saved["id"].as_str().unwrap().to_string();
    let uri = format!("/v1/settlements/{}/invoice", settlement_id);

    let (status, invoice) = request(
        &t.app,
        "POST",
        &uri,
        Some(json!({"invoiceDate": "2024-02-01", "notes": "January, second half"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let number = invoice["invoiceNumber"].as_str().unwrap();
    assert!(number.starts_with("CLW-20240201-"), "{}", number);
    assert_eq!(number.len(), "CLW-20240201-".len() + 10);

    let (status, _) = request(&t.app, "POST", &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = request(&t.app, "POST", "/v1/settlements/missing/invoice", Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, invoices) = request(&t.app, "GET", "/v1/invoices", None).await;
    let invoices = invoices.as_array().unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0]["settlementId"], settlement_id.as_str());
    assert_eq!(invoices[0]["machineName"], "Claw A");
    assert_eq!(invoices[0]["payToClowee"].as_f64(), Some(850.0));
}

#[tokio::test]
async fn test_csv_export() {
    let t = setup_test_app().await;
    let id = seeded_machine(&t).await;
    request(
        &t.app,
        "POST",
        "/v1/settlements",
        Some(period(&id, "2024-01-16", "2024-01-31")),
    )
    .await;

    let (status, bytes) = send(&t.app, "GET", "/v1/settlements/export.csv", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("id,machine_id,machine_name"));
    assert!(lines[1].contains(",2024-01-16,2024-01-31,1000,20,2000.00,100.00,100.00,200.00,100.00,800.00,1500.00,850.00,ops,"));
}

#[tokio::test]
async fn test_health_and_ready() {
    let t = setup_test_app().await;
    let (status, body) = request(&t.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = request(&t.app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}
