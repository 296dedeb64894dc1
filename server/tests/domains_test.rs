//! Integration tests for the domain settings endpoints:
//! read/write/list/delete round trips, the response envelope, method
//! restrictions and the landing page.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use sesam_server::auth::htpasswd::HtPasswd;
use sesam_server::auth::middleware::AuthGate;
use sesam_server::domains::store::BlobStore;

const REALM: &str = "c't SESAM";

/// Helper: start the server on a random port and return the base URL.
/// Users: alice/alice-pw and bob/bob-pw.
async fn start_test_server() -> String {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = sesam_server::db::init_db(&data_dir).expect("Failed to init DB");

    let htpasswd = format!(
        "# test users\nalice:{}\nbob:{}\n",
        bcrypt::hash("alice-pw", 4).unwrap(),
        bcrypt::hash("bob-pw", 4).unwrap()
    );
    let credentials = HtPasswd::parse(&htpasswd).expect("Failed to parse htpasswd");

    let state = sesam_server::state::AppState {
        store: BlobStore::new(db),
        auth: AuthGate {
            credentials: Arc::new(credentials),
            realm: Arc::from(REALM),
        },
        store_timeout: Some(Duration::from_secs(5)),
        max_blob_bytes: 64 * 1024,
    };

    let app = sesam_server::routes::build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        // Keep tmp_dir alive so the data directory isn't deleted
        let _keep = tmp_dir;
    });

    format!("http://{}", addr)
}

async fn get_json(client: &reqwest::Client, url: String, user: &str) -> Value {
    let resp = client
        .get(url)
        .basic_auth(user, Some(format!("{}-pw", user)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

async fn write(client: &reqwest::Client, base_url: &str, user: &str, data: &str) -> Value {
    let resp = client
        .post(format!("{}/write", base_url))
        .basic_auth(user, Some(format!("{}-pw", user)))
        .form(&[("data", data)])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

/// Every envelope that carries an error must report status "error".
fn assert_envelope_consistent(body: &Value) {
    if body.get("error").is_some() {
        assert_eq!(body["status"], "error", "envelope: {}", body);
    }
}

#[tokio::test]
async fn test_health_check() {
    let base_url = start_test_server().await;
    let resp = reqwest::get(format!("{}/health", base_url)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_read_without_data_is_ok_with_info() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    let body = get_json(&client, format!("{}/read", base_url), "alice").await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["info"], "no data for this user");
    assert!(body.get("result").is_none());
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_write_read_list_scenario() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    let body = write(&client, &base_url, "alice", "cfgA").await;
    assert_eq!(body, serde_json::json!({ "status": "ok" }));

    tokio::time::sleep(Duration::from_secs(1)).await;
    write(&client, &base_url, "alice", "cfgB").await;

    let body = get_json(&client, format!("{}/read", base_url), "alice").await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["result"], "cfgB");

    let body = get_json(&client, format!("{}/list", base_url), "alice").await;
    assert_eq!(body["status"], "ok");
    let versions = body["result"].as_array().unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["size"], 4);
    assert_eq!(versions[1]["size"], 4);
    assert!(versions[0]["id"].as_i64().unwrap() < versions[1]["id"].as_i64().unwrap());

    let first = versions[0]["created"].as_str().unwrap();
    let second = versions[1]["created"].as_str().unwrap();
    let first = chrono::DateTime::parse_from_rfc3339(first).unwrap();
    let second = chrono::DateTime::parse_from_rfc3339(second).unwrap();
    assert!(second - first >= chrono::Duration::milliseconds(900));
}

#[tokio::test]
async fn test_users_are_isolated() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    write(&client, &base_url, "alice", "alice-config").await;

    let body = get_json(&client, format!("{}/read", base_url), "bob").await;
    assert_eq!(body["info"], "no data for this user");

    let body = get_json(&client, format!("{}/list", base_url), "bob").await;
    assert_eq!(body["result"], serde_json::json!([]));
}

#[tokio::test]
async fn test_write_restores_plus_signs() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    // Older clients send base64 unencoded, so '+' arrives as a space
    let resp = client
        .post(format!("{}/write", base_url))
        .basic_auth("alice", Some("alice-pw"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("data=YWJj+ZGVm+Pw==")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body = get_json(&client, format!("{}/read", base_url), "alice").await;
    assert_eq!(body["result"], "YWJj+ZGVm+Pw==");
}

#[tokio::test]
async fn test_write_empty_data_is_accepted() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    write(&client, &base_url, "alice", "").await;

    let body = get_json(&client, format!("{}/read", base_url), "alice").await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["result"], "");
}

#[tokio::test]
async fn test_write_missing_data_is_rejected() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/write", base_url))
        .basic_auth("alice", Some("alice-pw"))
        .form(&[("other", "x")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_envelope_consistent(&body);

    let body = get_json(&client, format!("{}/list", base_url), "alice").await;
    assert_eq!(body["result"], serde_json::json!([]));
}

#[tokio::test]
async fn test_write_without_form_body_gets_envelope() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/write", base_url))
        .basic_auth("alice", Some("alice-pw"))
        .body("data=cfg")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert!(!body["error"].as_str().unwrap().is_empty());
    assert_envelope_consistent(&body);

    let body = get_json(&client, format!("{}/list", base_url), "alice").await;
    assert_eq!(body["result"], serde_json::json!([]));
}

#[tokio::test]
async fn test_write_too_large_is_rejected() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    let big = "x".repeat(64 * 1024 + 1);
    let resp = client
        .post(format!("{}/write", base_url))
        .basic_auth("alice", Some("alice-pw"))
        .form(&[("data", big.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
    let body: Value = resp.json().await.unwrap();
    assert_envelope_consistent(&body);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_write_requires_post() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/write?data=cfg", base_url))
        .basic_auth("alice", Some("alice-pw"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);

    let body = get_json(&client, format!("{}/list", base_url), "alice").await;
    assert_eq!(body["result"], serde_json::json!([]));
}

#[tokio::test]
async fn test_delete_removes_all_versions() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    for data in ["one", "two", "three"] {
        write(&client, &base_url, "alice", data).await;
    }
    write(&client, &base_url, "bob", "keep").await;

    let body = get_json(&client, format!("{}/delete", base_url), "alice").await;
    assert_eq!(body, serde_json::json!({ "status": "ok", "rowsAffected": 3 }));

    let body = get_json(&client, format!("{}/read", base_url), "alice").await;
    assert_eq!(body["info"], "no data for this user");
    let body = get_json(&client, format!("{}/list", base_url), "alice").await;
    assert_eq!(body["result"], serde_json::json!([]));

    // POST works too, and deleting nothing is not an error
    let resp = client
        .post(format!("{}/delete", base_url))
        .basic_auth("alice", Some("alice-pw"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "status": "ok", "rowsAffected": 0 }));

    let body = get_json(&client, format!("{}/read", base_url), "bob").await;
    assert_eq!(body["result"], "keep");
}

#[tokio::test]
async fn test_index_page_shows_host_and_user() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    for path in ["/", "/index"] {
        let resp = client
            .get(format!("{}{}", base_url, path))
            .basic_auth("bob", Some("bob-pw"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let html = resp.text().await.unwrap();
        let host = base_url.trim_start_matches("http://");
        assert!(html.contains(host), "page should show host {}", host);
        assert!(html.contains("<code>bob</code>"));
    }
}
