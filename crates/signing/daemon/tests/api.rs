//! HTTP surface of signd, driven through the router without a socket

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use signing_daemon::api::create_router;
use signing_daemon::config::AuthConfig;
use signing_daemon::{DaemonConfig, Server};
use tower::ServiceExt;

const CODE: &str = "246810";

fn app() -> Router {
    let config = DaemonConfig {
        auth: AuthConfig {
            shared_code: Some(CODE.to_string()),
        },
        ..DaemonConfig::default()
    };
    let server = Server::new(config).unwrap();
    create_router(server.state().clone(), &DaemonConfig::default().server)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn upload(app: &Router, document_ref: &str, content: &'static str) -> Value {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/v1/documents/{}", document_ref))
                .body(Body::from(content))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create(app: &Router, order: &str, emails: &[&str]) -> Value {
    let signers: Vec<Value> = emails
        .iter()
        .map(|email| json!({ "email": email, "name": email.split('@').next().unwrap() }))
        .collect();
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/requests",
        Some(json!({
            "document_ref": "msa-7",
            "signature_type": "ADVANCED",
            "signing_order": order,
            "signers": signers,
            "expires_in_days": 14,
            "created_by": "legal-ops"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = send(&app(), "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn sequential_request_signed_end_to_end() {
    let app = app();
    let uploaded = upload(&app, "msa-7", "Master services agreement").await;
    let request = create(&app, "SEQUENTIAL", &["ana@acme.io", "ben@acme.io"]).await;
    let id = request["id"].as_str().unwrap().to_string();
    assert_eq!(request["status"], "IN_PROGRESS");

    let (status, eligible) =
        send(&app, "GET", &format!("/api/v1/requests/{id}/eligible"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(eligible.as_array().unwrap().len(), 1);
    assert_eq!(eligible[0]["signer_email"], "ana@acme.io");

    // Ben's turn has not come yet.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/requests/{id}/signers/ben@acme.io/sign"),
        Some(json!({ "signature_data": "Ben", "auth_proof": CODE })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    for email in ["ana@acme.io", "ben@acme.io"] {
        let (status, signature) = send(
            &app,
            "POST",
            &format!("/api/v1/requests/{id}/signers/{email}/sign"),
            Some(json!({
                "signature_data": email,
                "auth_proof": CODE,
                "ip_address": "10.0.0.8"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{signature}");
        assert_eq!(signature["document_hash"], uploaded["digest"]);
    }

    let (_, done) = send(&app, "GET", &format!("/api/v1/requests/{id}"), None).await;
    assert_eq!(done["status"], "COMPLETED");

    let (_, signatures) =
        send(&app, "GET", &format!("/api/v1/requests/{id}/signatures"), None).await;
    assert_eq!(signatures.as_array().unwrap().len(), 2);

    let (_, trail) = send(&app, "GET", &format!("/api/v1/requests/{id}/audit"), None).await;
    let actions: Vec<&str> = trail
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions.first(), Some(&"CREATED"));
    assert_eq!(actions.last(), Some(&"COMPLETED"));
    assert_eq!(actions.iter().filter(|a| **a == "SIGNED").count(), 2);

    let (status, verification) = send(
        &app,
        "GET",
        &format!("/api/v1/requests/{id}/audit/verify"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verification["valid"], true);

    let (_, listed) = send(&app, "GET", "/api/v1/documents/msa-7/requests", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn wrong_code_is_unauthorized() {
    let app = app();
    upload(&app, "msa-7", "Master services agreement").await;
    let request = create(&app, "PARALLEL", &["ana@acme.io"]).await;
    let id = request["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/requests/{id}/signers/ana@acme.io/sign"),
        Some(json!({ "signature_data": "Ana", "auth_proof": "000000" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTHENTICATION_FAILED");
}

#[tokio::test]
async fn decline_then_cancel_conflicts() {
    let app = app();
    let request = create(&app, "PARALLEL", &["ana@acme.io", "ben@acme.io"]).await;
    let id = request["id"].as_str().unwrap();

    let (status, declined) = send(
        &app,
        "POST",
        &format!("/api/v1/requests/{id}/signers/ana@acme.io/decline"),
        Some(json!({ "reason": "terms changed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(declined["status"], "DECLINED");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/requests/{id}/cancel"),
        Some(json!({ "actor_id": "legal-ops" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn invalid_create_is_unprocessable() {
    let (status, body) = send(
        &app(),
        "POST",
        "/api/v1/requests",
        Some(json!({
            "document_ref": "msa-7",
            "signature_type": "SIMPLE",
            "signing_order": "PARALLEL",
            "signers": []
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let app = app();
    let (status, _) = send(
        &app,
        "GET",
        "/api/v1/requests/6f1c2a7e-5d7b-4c1e-9a3b-2f0d8e4c1b55",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "GET", "/api/v1/requests/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn missing_document_is_unavailable() {
    let app = app();
    let request = create(&app, "PARALLEL", &["ana@acme.io"]).await;
    let id = request["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/requests/{id}/signers/ana@acme.io/sign"),
        Some(json!({ "signature_data": "Ana", "auth_proof": CODE })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (_, state) = send(&app, "GET", &format!("/api/v1/requests/{id}"), None).await;
    assert_eq!(state["signers"][0]["status"], "SENT");
}

#[tokio::test]
async fn reminder_and_sweep() {
    let app = app();
    let request = create(&app, "PARALLEL", &["ana@acme.io"]).await;
    let id = request["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/requests/{id}/signers/ana@acme.io/remind"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, report) = send(&app, "POST", "/api/v1/expiration/sweep", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["expired"], 0);
}
