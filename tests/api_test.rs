//! End-to-end HTTP tests, wired against the in-memory ledger store.

use actix_web::{test, web, App};
use balance_engine::handlers;
use balance_engine::services::TransactionService;
use balance_engine::store::memory::MemoryLedger;
use balance_engine::store::LedgerStore;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

fn seeded_service() -> Arc<TransactionService> {
    let ledger = MemoryLedger::new();
    ledger.seed_user(1, dec!(100.00));
    ledger.seed_user(2, dec!(200.00));
    ledger.seed_user(3, dec!(50.00));
    ledger.seed_user(4, dec!(33.33));

    let store: Arc<dyn LedgerStore> = Arc::new(ledger);
    Arc::new(TransactionService::new(store))
}

macro_rules! app {
    ($service:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($service))
                .configure(handlers::configure_routes),
        )
        .await
    };
}

fn win_body(amount: &str) -> serde_json::Value {
    json!({
        "state": "win",
        "amount": amount,
        "transactionId": Uuid::new_v4().to_string(),
    })
}

#[actix_web::test]
async fn balance_of_seeded_users() {
    let app = app!(seeded_service());

    for (user_id, expected) in [(1, "100.00"), (2, "200.00"), (3, "50.00"), (4, "33.33")] {
        let req = test::TestRequest::get()
            .uri(&format!("/user/{user_id}/balance"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"userId": user_id, "balance": expected}));
    }
}

#[actix_web::test]
async fn balance_of_unknown_user_is_not_found() {
    let app = app!(seeded_service());

    let req = test::TestRequest::get().uri("/user/42/balance").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn balance_of_invalid_user_id_is_bad_request() {
    let app = app!(seeded_service());

    for raw in ["0", "-1", "abc"] {
        let req = test::TestRequest::get()
            .uri(&format!("/user/{raw}/balance"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400, "user id {raw:?} should be rejected");
    }
}

#[actix_web::test]
async fn win_transaction_increases_balance() {
    let app = app!(seeded_service());

    let req = test::TestRequest::post()
        .uri("/user/1/transaction")
        .insert_header(("Source-Type", "game"))
        .set_json(win_body("10.15"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get().uri("/user/1/balance").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"userId": 1, "balance": "110.15"}));
}

#[actix_web::test]
async fn lose_transaction_decreases_balance() {
    let app = app!(seeded_service());

    let req = test::TestRequest::post()
        .uri("/user/1/transaction")
        .insert_header(("Source-Type", "server"))
        .set_json(json!({
            "state": "lose",
            "amount": "15.25",
            "transactionId": Uuid::new_v4().to_string(),
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get().uri("/user/1/balance").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"userId": 1, "balance": "84.75"}));
}

#[actix_web::test]
async fn lose_transaction_may_drive_balance_negative() {
    let app = app!(seeded_service());

    let req = test::TestRequest::post()
        .uri("/user/3/transaction")
        .insert_header(("Source-Type", "payment"))
        .set_json(json!({
            "state": "lose",
            "amount": "60.00",
            "transactionId": Uuid::new_v4().to_string(),
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get().uri("/user/3/balance").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"userId": 3, "balance": "-10.00"}));
}

#[actix_web::test]
async fn replayed_transaction_leaves_balance_unchanged() {
    let app = app!(seeded_service());

    let body = json!({
        "state": "win",
        "amount": "10.00",
        "transactionId": Uuid::new_v4().to_string(),
    });

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/user/1/transaction")
            .insert_header(("Source-Type", "game"))
            .set_json(body.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200, "replays are accepted as success");
    }

    let req = test::TestRequest::get().uri("/user/1/balance").to_request();
    let balance: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(balance, json!({"userId": 1, "balance": "110.00"}));
}

#[actix_web::test]
async fn invalid_payloads_are_bad_requests() {
    let app = app!(seeded_service());

    let valid_id = Uuid::new_v4().to_string();
    let cases = [
        json!({"state": "win", "amount": "0.00", "transactionId": valid_id.clone()}),
        json!({"state": "win", "amount": "-5.00", "transactionId": valid_id.clone()}),
        json!({"state": "win", "amount": "abc", "transactionId": valid_id.clone()}),
        json!({"state": "draw", "amount": "1.00", "transactionId": valid_id}),
        json!({"state": "win", "amount": "1.00", "transactionId": "not-a-uuid"}),
        json!({"state": "win", "amount": "1.00", "transactionId": Uuid::nil().to_string()}),
    ];

    for body in cases {
        let req = test::TestRequest::post()
            .uri("/user/1/transaction")
            .insert_header(("Source-Type", "game"))
            .set_json(body.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400, "payload {body} should be rejected");
    }

    // Balance untouched by any of the rejected submissions.
    let req = test::TestRequest::get().uri("/user/1/balance").to_request();
    let balance: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(balance, json!({"userId": 1, "balance": "100.00"}));
}

#[actix_web::test]
async fn missing_or_unknown_source_type_is_bad_request() {
    let app = app!(seeded_service());

    let req = test::TestRequest::post()
        .uri("/user/1/transaction")
        .set_json(win_body("1.00"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri("/user/1/transaction")
        .insert_header(("Source-Type", "casino"))
        .set_json(win_body("1.00"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn transaction_for_unknown_user_is_not_found() {
    let app = app!(seeded_service());

    let req = test::TestRequest::post()
        .uri("/user/42/transaction")
        .insert_header(("Source-Type", "game"))
        .set_json(win_body("1.00"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn health_endpoint_reports_healthy() {
    let app = app!(seeded_service());

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "balance-engine");
}

#[actix_web::test]
async fn metrics_endpoint_exposes_prometheus_text() {
    let app = app!(seeded_service());

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body = test::read_body(resp).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("balance_http_requests_total"));
}
