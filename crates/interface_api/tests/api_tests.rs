//! HTTP tests driving the router over the in-process adapters

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use core_kernel::{InvoiceId, PaymentId, StudentId, TenantContext};
use interface_api::auth::{create_token, permissions};
use interface_api::config::ApiConfig;
use interface_api::create_router;
use test_utils::{BillingHarness, DateFixtures, StudentBuilder, TenantFixtures};

const SECRET: &str = "api-test-secret";

struct Api {
    router: Router,
    harness: BillingHarness,
}

impl Api {
    async fn with_students(count: usize) -> Self {
        let harness = BillingHarness::new(DateFixtures::march_first());
        harness.enroll_roster(count, 0).await;
        let config = ApiConfig {
            jwt_secret: SECRET.to_string(),
            ..ApiConfig::default()
        };
        Self {
            router: create_router(harness.service.clone(), config),
            harness,
        }
    }

    fn token(&self, roles: &[&str]) -> String {
        token_for(&self.harness.ctx, roles)
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn generate_class(&self, token: &str) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/challans/generate",
                Some(token),
                Some(json!({ "class_id": self.harness.class.id, "month": 3, "year": 2025 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }
}

fn token_for(ctx: &TenantContext, roles: &[&str]) -> String {
    create_token(ctx, roles.iter().map(|r| r.to_string()).collect(), SECRET, 600).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let api = Api::with_students(0).await;

    let (status, body) = api.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = api.call(Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let api = Api::with_students(1).await;

    let (status, _) = api.call(Method::GET, "/api/v1/challans", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = create_token(&api.harness.ctx, vec!["admin".into()], "wrong-secret", 600).unwrap();
    let (status, _) = api.call(Method::GET, "/api/v1/challans", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reader_cannot_generate() {
    let api = Api::with_students(2).await;
    let reader = api.token(&[permissions::FEES_READ]);

    let (status, body) = api
        .call(
            Method::POST,
            "/api/v1/challans/generate",
            Some(&reader),
            Some(json!({ "class_id": api.harness.class.id, "month": 3, "year": 2025 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_generate_pay_and_overpay_flow() {
    let api = Api::with_students(1).await;
    let writer = api.token(&[permissions::FEES_WRITE]);

    let report = api.generate_class(&writer).await;
    assert_eq!(report["created_count"], 1);
    let created = &report["created"][0];
    assert_eq!(created["invoice_number"], "CH-2025-000001");
    assert_eq!(created["total_amount"], "3000.00");
    let invoice_id = created["id"].as_str().unwrap().to_string();
    let payments_uri = format!("/api/v1/challans/{invoice_id}/payments");

    let (status, receipt) = api
        .call(Method::POST, &payments_uri, Some(&writer), Some(json!({ "amount": "1000", "method": "cash" })))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(receipt["invoice"]["status"], "partially_paid");
    assert_eq!(receipt["invoice"]["balance"], "2000.00");
    assert_eq!(receipt["payment"]["periods_covered"], json!(["March 2025"]));

    let (status, body) = api
        .call(Method::POST, &payments_uri, Some(&writer), Some(json!({ "amount": "2500", "method": "cash" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, receipt) = api
        .call(
            Method::POST,
            &payments_uri,
            Some(&writer),
            Some(json!({ "amount": "2000", "method": "bank_transfer", "reference": "HBL-7781" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["invoice"]["status"], "paid");
    assert_eq!(receipt["invoice"]["balance"], "0.00");

    // A rerun bills nobody new
    let rerun = api.generate_class(&writer).await;
    assert_eq!(rerun["created_count"], 0);
    assert_eq!(rerun["skipped"][0]["reason"], "already_billed");
}

#[tokio::test]
async fn test_invalid_bodies_are_unprocessable() {
    let api = Api::with_students(1).await;
    let writer = api.token(&[permissions::FEES_WRITE]);

    let (status, body) = api
        .call(
            Method::POST,
            "/api/v1/challans/generate",
            Some(&writer),
            Some(json!({ "class_id": api.harness.class.id, "month": 13, "year": 2025 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = api
        .call(Method::POST, "/api/v1/challans/generate", Some(&writer), Some(json!({ "month": 3, "year": 2025 })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let report = api.generate_class(&writer).await;
    let invoice_id = report["created"][0]["id"].as_str().unwrap().to_string();
    let (status, _) = api
        .call(
            Method::POST,
            &format!("/api/v1/challans/{invoice_id}/payments"),
            Some(&writer),
            Some(json!({ "amount": "-5", "method": "cash" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_other_school_sees_not_found() {
    let api = Api::with_students(1).await;
    let writer = api.token(&[permissions::FEES_WRITE]);
    let report = api.generate_class(&writer).await;
    let invoice_id = report["created"][0]["id"].as_str().unwrap().to_string();

    let outsider = token_for(&TenantFixtures::school(), &["admin"]);
    let (status, body) = api
        .call(Method::GET, &format!("/api/v1/challans/{invoice_id}"), Some(&outsider), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, list) = api.call(Method::GET, "/api/v1/challans", Some(&outsider), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn test_cancel_requires_admin_and_frees_the_period() {
    let api = Api::with_students(1).await;
    let writer = api.token(&[permissions::FEES_WRITE]);
    let admin = api.token(&[permissions::FEES_ADMIN]);
    let report = api.generate_class(&writer).await;
    let invoice_id = report["created"][0]["id"].as_str().unwrap().to_string();
    let cancel_uri = format!("/api/v1/challans/{invoice_id}/cancel");

    let (status, _) = api
        .call(Method::POST, &cancel_uri, Some(&writer), Some(json!({ "reason": "issued twice" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = api
        .call(Method::POST, &cancel_uri, Some(&admin), Some(json!({ "reason": "issued twice" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["cancellation"]["reason"], "issued twice");

    let (status, body) = api
        .call(
            Method::POST,
            &format!("/api/v1/challans/{invoice_id}/payments"),
            Some(&writer),
            Some(json!({ "amount": "100", "method": "cash" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let regenerated = api.generate_class(&writer).await;
    assert_eq!(regenerated["created"][0]["invoice_number"], "CH-2025-000002");
}

#[tokio::test]
async fn test_delete_payment_reverts_status() {
    let api = Api::with_students(1).await;
    let admin = api.token(&["admin"]);
    let report = api.generate_class(&admin).await;
    let invoice_id = report["created"][0]["id"].as_str().unwrap().to_string();

    let (_, receipt) = api
        .call(
            Method::POST,
            &format!("/api/v1/challans/{invoice_id}/payments"),
            Some(&admin),
            Some(json!({ "amount": "3000", "method": "card", "reference": "POS-1" })),
        )
        .await;
    let payment_id = receipt["payment"]["id"].as_str().unwrap().to_string();

    let (status, _) = api
        .call(Method::DELETE, &format!("/api/v1/challans/{invoice_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, invoice) = api
        .call(Method::DELETE, &format!("/api/v1/payments/{payment_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoice["status"], "pending");
    assert_eq!(invoice["balance"], "3000.00");

    let (status, _) = api
        .call(Method::DELETE, &format!("/api/v1/challans/{invoice_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_reports_and_statement() {
    let api = Api::with_students(0).await;
    let student = StudentBuilder::in_class(&api.harness.class)
        .with_name("Ayesha Khan")
        .build();
    api.harness.enroll([student.clone()]).await;
    let admin = api.token(&["admin"]);

    let (status, report) = api
        .call(
            Method::POST,
            "/api/v1/challans/generate",
            Some(&admin),
            Some(json!({ "student_id": student.id, "month": 3, "year": 2025, "due_in_days": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let invoice_id = report["created"][0]["id"].as_str().unwrap().to_string();

    api.call(
        Method::POST,
        &format!("/api/v1/challans/{invoice_id}/payments"),
        Some(&admin),
        Some(json!({ "amount": "750", "method": "online", "reference": "EP-55" })),
    )
    .await;
    api.harness.advance_to(DateFixtures::on(3, 20));

    let (status, defaulters) = api.call(Method::GET, "/api/v1/reports/defaulters", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(defaulters[0]["student_name"], "Ayesha Khan");
    assert_eq!(defaulters[0]["total_due"], "2250.00");
    assert_eq!(defaulters[0]["days_overdue"], 14);

    let (status, summary) = api
        .call(Method::GET, "/api/v1/reports/class-summary?period=March%202025", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary[0]["collected_amount"], "750.00");
    assert_eq!(summary[0]["collection_percentage"], "25.00");

    let (status, collections) = api
        .call(Method::GET, "/api/v1/reports/collections?from=2025-03-01&to=2025-03-31", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(collections["grand_total"], "750.00");
    assert_eq!(collections["rows"][0]["method"], "online");

    let (status, _) = api
        .call(Method::GET, "/api/v1/reports/collections?from=2025-04-01&to=2025-03-01", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, statement) = api
        .call(Method::GET, &format!("/api/v1/students/{}/statement", student.id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(statement["total_outstanding"], "2250.00");
    assert_eq!(statement["invoices"][0]["status"], "partially_paid");
}

#[tokio::test]
async fn test_display_form_ids_resolve_in_paths() {
    let api = Api::with_students(1).await;
    let admin = api.token(&["admin"]);
    let report = api.generate_class(&admin).await;
    let created = &report["created"][0];
    let bare = created["id"].as_str().unwrap().to_string();
    let invoice_id: InvoiceId = bare.parse().unwrap();
    assert!(invoice_id.to_string().starts_with("CHL-"));

    for id in [invoice_id.to_string(), bare.clone()] {
        let (status, invoice) = api
            .call(Method::GET, &format!("/api/v1/challans/{id}"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{id}");
        assert_eq!(invoice["id"], bare.as_str());
    }

    let (status, _) = api
        .call(Method::GET, &format!("/api/v1/challans/STU-{bare}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, receipt) = api
        .call(
            Method::POST,
            &format!("/api/v1/challans/{invoice_id}/payments"),
            Some(&admin),
            Some(json!({ "amount": "500", "method": "cash" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");

    let student_id: StudentId = created["student_id"].as_str().unwrap().parse().unwrap();
    let (status, statement) = api
        .call(Method::GET, &format!("/api/v1/students/{student_id}/statement"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(statement["total_paid"], "500.00");

    let payment_id: PaymentId = receipt["payment"]["id"].as_str().unwrap().parse().unwrap();
    let (status, invoice) = api
        .call(Method::DELETE, &format!("/api/v1/payments/{payment_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoice["status"], "pending");
}

#[tokio::test]
async fn test_resolve_period() {
    let api = Api::with_students(0).await;
    let reader = api.token(&[permissions::FEES_READ]);

    let (status, period) = api
        .call(Method::GET, "/api/v1/periods/resolve?plan=quarterly&month=5&year=2025", Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(period["label"], "Q1 2025-26");
    assert_eq!(period["start"], "2025-04-01");
    assert_eq!(period["end"], "2025-06-30");
    assert_eq!(period["months"], json!(["April 2025", "May 2025", "June 2025"]));

    let (status, _) = api
        .call(Method::GET, "/api/v1/periods/resolve?plan=weekly&month=5&year=2025", Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
