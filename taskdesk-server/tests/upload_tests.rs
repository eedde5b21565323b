//! Integration tests for POST /api/upload
//!
//! Tests cover:
//! - CSV with invalid rows distributed across 7 agents
//! - XLSX with no data rows rejected, temp file removed
//! - legacy XLS (BIFF8) fixture routed by `application/vnd.ms-excel`
//! - fewer than five agents rejected, no agent mutated
//! - unsupported file type rejected before parsing
//! - five rows across five agents, one each
//! - requests without a file field, and without a token

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use taskdesk_common::api::issue_token;
use taskdesk_common::db::{self, init_memory_database, NewAgent};
use taskdesk_server::ingest::{DiskTempStorage, SqliteAgentStore, UploadOrchestrator};
use taskdesk_server::{build_router, AppState};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method
use uuid::Uuid;

const SECRET: &str = "upload-test-secret";
const BOUNDARY: &str = "taskdesk-test-boundary";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS_MIME: &str = "application/vnd.ms-excel";

/// Sheet "Leads": header plus 9 rows, one missing Notes, one missing Phone,
/// and Grace's phone stored as a number cell
const LEADS_XLS: &[u8] = include_bytes!("fixtures/leads.xls");

struct TestApp {
    app: Router,
    pool: SqlitePool,
    upload_dir: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    async fn with_agents(count: usize) -> Self {
        let pool = init_memory_database().await.expect("Should open memory database");
        for i in 0..count {
            db::agents::create_agent(
                &pool,
                &NewAgent {
                    name: format!("Agent {i}"),
                    email: format!("agent{i}@example.com"),
                    mobile: format!("+1 555 01{i:02}"),
                    password_hash: "not-a-real-hash".to_string(),
                },
            )
            .await
            .expect("Should create agent");
        }

        let dir = TempDir::new().unwrap();
        let upload_dir = dir.path().join("uploads");
        let uploads = UploadOrchestrator::with_rng(
            Arc::new(SqliteAgentStore::new(pool.clone())),
            Arc::new(DiskTempStorage::new(&upload_dir)),
            StdRng::seed_from_u64(2024),
        );
        let state = AppState::new(pool.clone(), SECRET, uploads, 1024 * 1024);

        Self {
            app: build_router(state),
            pool,
            upload_dir,
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        (status, serde_json::from_slice(&bytes).expect("Should parse JSON"))
    }

    async fn task_counts(&self) -> Vec<usize> {
        db::agents::list_agents(&self.pool)
            .await
            .unwrap()
            .iter()
            .map(|a| a.tasks.len())
            .collect()
    }
}

fn temp_files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

fn token() -> String {
    issue_token(Uuid::new_v4(), SECRET).unwrap()
}

/// Build a multipart request with one part named `field`
fn upload_request(field: &str, file_name: &str, content_type: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", token()))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn csv_content(valid: usize, missing_notes: usize) -> Vec<u8> {
    let mut csv = String::from("FirstName,Phone,Notes\n");
    for i in 0..valid {
        csv.push_str(&format!("Lead{i},555-{i:04},Follow up\n"));
    }
    for i in 0..missing_notes {
        csv.push_str(&format!("NoNotes{i},555-9{i:03},\n"));
    }
    csv.into_bytes()
}

fn xlsx_content(rows: &[[&str; 3]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, header) in ["FirstName", "Phone", "Notes"].iter().enumerate() {
        worksheet.write_string(0, col as u16, *header).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            worksheet.write_string(r as u32 + 1, col as u16, *value).unwrap();
        }
    }
    workbook.save_to_buffer().unwrap()
}

// =============================================================================
// Distribution scenarios
// =============================================================================

#[tokio::test]
async fn test_csv_with_invalid_rows_distributed_across_seven_agents() {
    let app = TestApp::with_agents(7).await;

    let request = upload_request("file", "leads.csv", "text/csv", &csv_content(12, 3));
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Tasks distributed successfully");

    let counts = app.task_counts().await;
    assert_eq!(counts.iter().sum::<usize>(), 12);
    assert!(counts.iter().all(|&c| c == 1 || c == 2), "counts: {counts:?}");
    assert_eq!(temp_files_in(&app.upload_dir), 0);
}

#[tokio::test]
async fn test_xlsx_without_data_rows_rejected() {
    let app = TestApp::with_agents(5).await;

    let request = upload_request("file", "empty.xlsx", XLSX_MIME, &xlsx_content(&[]));
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "XLS/XLSX is empty or invalid format");
    assert_eq!(temp_files_in(&app.upload_dir), 0);
}

#[tokio::test]
async fn test_xlsx_rows_distributed() {
    let app = TestApp::with_agents(5).await;
    let rows = [
        ["Ada", "555-0100", "Call after 5"],
        ["Grace", "555-0101", "Prefers email"],
        ["Linus", "", "No phone, dropped"],
        ["Barbara", "555-0103", "New lead"],
        ["Ken", "555-0104", "Existing customer"],
        ["Dennis", "555-0105", "Callback"],
        ["Margaret", "555-0106", "Demo booked"],
    ];

    let request = upload_request("file", "leads.xlsx", XLSX_MIME, &xlsx_content(&rows));
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    let mut counts = app.task_counts().await;
    counts.sort_unstable();
    assert_eq!(counts, vec![1, 1, 1, 1, 2]);
    assert_eq!(temp_files_in(&app.upload_dir), 0);
}

#[tokio::test]
async fn test_xls_rows_distributed() {
    let app = TestApp::with_agents(5).await;

    let request = upload_request("file", "leads.xls", XLS_MIME, LEADS_XLS);
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Tasks distributed successfully");
    let mut counts = app.task_counts().await;
    counts.sort_unstable();
    assert_eq!(counts, vec![1, 1, 1, 2, 2]);

    let tasks: Vec<_> = db::agents::list_agents(&app.pool)
        .await
        .unwrap()
        .into_iter()
        .flat_map(|a| a.tasks)
        .collect();
    let grace = tasks.iter().find(|t| t.first_name == "Grace").unwrap();
    assert_eq!(grace.phone, "5550101");
    assert!(tasks.iter().all(|t| t.first_name != "Linus" && t.first_name != "Dennis"));
    assert_eq!(temp_files_in(&app.upload_dir), 0);
}

#[tokio::test]
async fn test_xls_mime_routes_without_extension() {
    let app = TestApp::with_agents(5).await;

    let request = upload_request("file", "leads-export", XLS_MIME, LEADS_XLS);
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.task_counts().await.iter().sum::<usize>(), 7);

    // Without the MIME type an extensionless name is not accepted
    let request = upload_request("file", "leads-export", "application/octet-stream", LEADS_XLS);
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only CSV, XLS, XLSX files are allowed");
}

#[tokio::test]
async fn test_fewer_than_five_agents_rejected() {
    let app = TestApp::with_agents(4).await;

    let request = upload_request("file", "leads.csv", "text/csv", &csv_content(8, 0));
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Not enough agents to distribute tasks");
    assert_eq!(app.task_counts().await, vec![0, 0, 0, 0]);
    assert_eq!(temp_files_in(&app.upload_dir), 0);
}

#[tokio::test]
async fn test_text_file_rejected_before_parsing() {
    let app = TestApp::with_agents(5).await;

    let request = upload_request("file", "leads.txt", "text/plain", &csv_content(5, 0));
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only CSV, XLS, XLSX files are allowed");
    assert_eq!(app.task_counts().await.iter().sum::<usize>(), 0);
    assert_eq!(temp_files_in(&app.upload_dir), 0);
}

#[tokio::test]
async fn test_five_rows_five_agents_one_each() {
    let app = TestApp::with_agents(5).await;

    let request = upload_request("file", "leads.csv", "text/csv", &csv_content(5, 0));
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.task_counts().await, vec![1; 5]);
}

#[tokio::test]
async fn test_repeat_upload_appends() {
    let app = TestApp::with_agents(5).await;

    for _ in 0..2 {
        let request = upload_request("file", "leads.csv", "text/csv", &csv_content(5, 0));
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(app.task_counts().await, vec![2; 5]);
}

// =============================================================================
// Request shape
// =============================================================================

#[tokio::test]
async fn test_csv_with_only_invalid_rows_rejected() {
    let app = TestApp::with_agents(5).await;

    let request = upload_request("file", "leads.csv", "text/csv", &csv_content(0, 4));
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "File is empty or invalid format");
    assert_eq!(temp_files_in(&app.upload_dir), 0);
}

#[tokio::test]
async fn test_wrong_field_name_is_no_file() {
    let app = TestApp::with_agents(5).await;

    let request = upload_request("attachment", "leads.csv", "text/csv", &csv_content(5, 0));
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No file uploaded");
}

#[tokio::test]
async fn test_non_multipart_body_is_no_file() {
    let app = TestApp::with_agents(5).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", token()))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No file uploaded");
}

#[tokio::test]
async fn test_upload_requires_token() {
    let app = TestApp::with_agents(5).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(format!("--{BOUNDARY}--\r\n")))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token, authorization denied");
    assert_eq!(temp_files_in(&app.upload_dir), 0);
}
