//! Daily summary integration tests: create, send, archive.

mod common;

use common::TestApp;
use invoicing_service::services::Fault;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn create(app: &TestApp, id: &str) -> reqwest::Response {
    app.post_json(
        &format!("/summary-forms/{id}/create"),
        &json!({ "fecha_resumen": "2025-07-28" }),
    )
    .await
}

#[tokio::test]
async fn summary_is_created_sent_and_archived() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path("/boletas/create-daily-summary"))
        .and(body_json(json!({
            "company_id": "1",
            "branch_id": "1",
            "fecha_resumen": "2025-07-28"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "",
            "data": {
                "id": 31,
                "numero_completo": "RC-20250728-1",
                "fecha_resumen": "2025-07-28",
                "estado_proceso": "GENERADO",
                "estado_sunat": "PENDIENTE"
            }
        })))
        .mount(&app.billing_api)
        .await;
    app.mock_send_summary().await;
    let id = app.open_summary_form().await;

    let response = create(&app, &id).await;
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["summary"]["id"], 31);
    assert_eq!(body["notice"]["title"], "Resumen Generado");
    assert_eq!(body["state"]["status"], "created");
    assert_eq!(body["steps"][0]["status"], "completed");
    assert_eq!(body["steps"][1]["status"], "pending");

    let body: Value = app
        .post_json(&format!("/summary-forms/{id}/send"), &json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["report"]["archive"]["status"], "saved");
    assert_eq!(body["report"]["notice"]["title"], "Éxito");
    assert_eq!(body["steps"][1]["status"], "completed");

    let history: Value = app
        .client
        .get(app.url("/daily-summaries"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history[0]["ticket"], "T-123");
    assert_eq!(history[0]["fecha_resumen"], "2025-07-28");
    assert_eq!(app.store.detail_rows().await.len(), 1);
}

#[tokio::test]
async fn detail_failure_deletes_header_and_names_ticket() {
    let app = TestApp::spawn().await;
    app.mock_create_summary().await;
    app.mock_send_summary().await;
    app.store.inject_fault(Fault::SummaryDetailInsert).await;
    let id = app.open_summary_form().await;

    create(&app, &id).await;
    let response = app
        .post_json(&format!("/summary-forms/{id}/send"), &json!({}))
        .await;
    assert!(response.status().is_success());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["report"]["archive"]["status"], "failed");
    assert_eq!(body["report"]["archive"]["header_removed"], true);
    assert!(body["report"]["notice"]["description"]
        .as_str()
        .unwrap()
        .contains("T-123"));
    assert!(app.store.summary_rows().await.is_empty());
    assert!(app.store.detail_rows().await.is_empty());
}

#[tokio::test]
async fn second_create_is_rejected_while_a_summary_is_pending() {
    let app = TestApp::spawn().await;
    app.mock_create_summary().await;
    let id = app.open_summary_form().await;

    assert!(create(&app, &id).await.status().is_success());
    assert_eq!(create(&app, &id).await.status().as_u16(), 409);
}

#[tokio::test]
async fn invalid_date_is_rejected_before_calling_the_api() {
    let app = TestApp::spawn().await;
    let id = app.open_summary_form().await;

    let response = app
        .post_json(
            &format!("/summary-forms/{id}/create"),
            &json!({ "fecha_resumen": "28/07/2025" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);
    assert!(app.billing_api.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn send_rejection_clears_pending_summary() {
    let app = TestApp::spawn().await;
    app.mock_create_summary().await;
    Mock::given(method("POST"))
        .and(path("/daily-summaries/31/send-sunat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "El servicio de SUNAT no está disponible"
        })))
        .mount(&app.billing_api)
        .await;
    let id = app.open_summary_form().await;
    create(&app, &id).await;

    let response = app
        .post_json(&format!("/summary-forms/{id}/send"), &json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "El servicio de SUNAT no está disponible");

    let form: Value = app
        .client
        .get(app.url(&format!("/summary-forms/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(form["state"]["status"], "send_failed");
    assert_eq!(form["steps"][1]["status"], "failed");
    assert!(app.store.summary_rows().await.is_empty());

    assert!(create(&app, &id).await.status().is_success());
}

#[tokio::test]
async fn send_without_created_summary_conflicts() {
    let app = TestApp::spawn().await;
    let id = app.open_summary_form().await;
    let response = app
        .post_json(&format!("/summary-forms/{id}/send"), &json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn discarding_a_form_with_a_pending_summary() {
    let app = TestApp::spawn().await;
    app.mock_create_summary().await;
    let id = app.open_summary_form().await;
    create(&app, &id).await;

    let response = app
        .client
        .delete(app.url(&format!("/summary-forms/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = app
        .client
        .get(app.url(&format!("/summary-forms/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
