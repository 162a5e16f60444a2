use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use labstock_auth::{hash_password, Authenticator, CredentialEntry, CredentialTable, Role};
use labstock_infra::config::LockSettings;
use labstock_infra::{LabServices, StorePaths};
use reqwest::StatusCode;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    data_dir: PathBuf,
}

impl TestServer {
    async fn spawn() -> Self {
        let data_dir = std::env::temp_dir().join(format!("labstock-api-{}", uuid::Uuid::new_v4()));
        let paths = StorePaths::under(&data_dir);
        for dir in paths.directories() {
            std::fs::create_dir_all(dir).unwrap();
        }
        let locks = LockSettings { timeout_ms: 500 };
        let services = Arc::new(LabServices::new(&paths, &locks, &["Nitrogen".to_string()]));

        let mut users = HashMap::new();
        users.insert(
            "central".to_string(),
            CredentialEntry {
                password_hash: hash_password("s3cret").unwrap(),
                role: Role::central_admin(),
                site: "HQ".to_string(),
            },
        );
        let auth: Arc<dyn Authenticator> = Arc::new(CredentialTable::new(users));

        // Same router as prod, bound to an ephemeral port.
        let app = labstock_api::app::build_app(services, auth);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            handle,
            data_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (StatusCode, Value) {
    let res = client.post(url).json(&body).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

async fn get(client: &reqwest::Client, url: String) -> (StatusCode, Value) {
    let res = client.get(url).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_returns_role_and_site() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        srv.url("/api/auth/login/"),
        json!({ "username": "central", "password": "s3cret" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["role"], "CENTRAL_ADMIN");
    assert_eq!(body["site"], "HQ");

    let (status, body) = post(
        &client,
        srv.url("/api/auth/login/"),
        json!({ "username": "central", "password": "wrong" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "invalid_credentials");
}

#[tokio::test]
async fn stock_borrow_and_approval_lifecycle() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        srv.url("/api/inventory/add-stock/"),
        json!({ "material": "Nitrogen", "quantity": 10, "unit": "MT", "supplier": "Acme" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_balance"].as_f64(), Some(10.0));

    // The stock form sends quantities as text.
    let (_, body) = post(
        &client,
        srv.url("/api/inventory/add-stock/"),
        json!({ "material": "Nitrogen", "quantity": "5", "unit": "MT" }),
    )
    .await;
    assert_eq!(body["new_balance"].as_f64(), Some(15.0));

    let (status, body) = post(
        &client,
        srv.url("/api/inventory/borrow/"),
        json!({
            "raw_material": "Nitrogen",
            "quantity": "4",
            "unit": "MT",
            "purpose": "purge line 2",
            "employee_name": "Ravi",
            "employee_id": "E-17",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ok"], true);
    let request_id = body["request_id"].as_str().unwrap().to_string();
    assert_eq!(request_id.len(), 8);

    let (status, body) = get(&client, srv.url("/api/inventory/requests/?status=Pending")).await;
    assert_eq!(status, StatusCode::OK);
    let pending = body["requests"].as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["request_id"], request_id.as_str());
    assert_eq!(pending[0]["raw_material"], "Nitrogen");
    assert_eq!(pending[0]["status"], "Pending");

    let (status, body) = post(
        &client,
        srv.url("/api/inventory/approve/"),
        json!({ "request_id": request_id, "action": "APPROVE" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Approved");
    assert_eq!(body["new_balance"].as_f64(), Some(11.0));

    let (_, body) = get(&client, srv.url("/api/inventory/requests/")).await;
    assert_eq!(body["requests"][0]["approved_by"], "Admin");

    let (_, body) = get(&client, srv.url("/api/inventory/balance/")).await;
    let nitrogen = body["balances"]
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["material"].as_str().unwrap().eq_ignore_ascii_case("nitrogen"))
        .unwrap();
    assert_eq!(nitrogen["balance"].as_f64(), Some(11.0));

    let (status, body) = post(
        &client,
        srv.url("/api/inventory/approve/"),
        json!({ "request_id": request_id, "action": "APPROVE" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn invalid_input_is_a_validation_error() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        srv.url("/api/inventory/add-stock/"),
        json!({ "material": "", "quantity": 3 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = post(
        &client,
        srv.url("/api/inventory/add-stock/"),
        json!({ "material": "Nitrogen", "quantity": "lots" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);

    let (status, body) = post(
        &client,
        srv.url("/api/inventory/approve/"),
        json!({ "request_id": "ABCDEF12", "action": "MAYBE" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn malformed_bodies_get_the_error_envelope() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/inventory/add-stock/"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("JSON"));

    // No content type at all.
    let res = client
        .post(srv.url("/api/tanker/arrival/"))
        .body(r#"{"tanker_number":"MH-12-4455"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "validation_error");

    // Wrong field type.
    let (status, body) = post(
        &client,
        srv.url("/api/auth/login/"),
        json!({ "username": ["central"], "password": "s3cret" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn bad_status_filter_is_a_validation_error() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = get(&client, srv.url("/api/inventory/requests/?status=Lost")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        srv.url("/api/inventory/approve/"),
        json!({ "request_id": "ABCDEF12", "action": "REJECT" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn arrival_shows_up_in_history() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        srv.url("/api/tanker/arrival/"),
        json!({
            "tanker_number": "MH-12-4455",
            "raw_material": "Caustic Soda",
            "quantity": "18.5",
            "supplier": "Port Depot",
            "arrival_date": "2026-10-19",
            "arrival_time": "08:30",
            "batch_number": "B-7",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["movement_type"], "ARRIVAL");

    let (status, body) = get(&client, srv.url("/api/tanker/history/")).await;
    assert_eq!(status, StatusCode::OK);
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["tanker_number"], "MH-12-4455");
    assert_eq!(history[0]["movement_type"], "ARRIVAL");
    assert_eq!(history[0]["batch_number"], "B-7");
    assert_eq!(history[0]["date"], "2026-10-19");
}

#[tokio::test]
async fn lab_sample_is_saved() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        srv.url("/api/labdata/save/"),
        json!({ "sample_id": "S-1", "product": "Caustic Soda", "purity": "98.2" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}
