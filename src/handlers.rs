use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::errors::LedgerError;
use crate::metrics::METRICS;
use crate::models::{BalanceResponse, SourceType, TransactionBody, UserId};
use crate::services::{ProcessOutcome, TransactionService};

const SOURCE_TYPE_HEADER: &str = "Source-Type";

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "balance-engine",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Current balance for a user
pub async fn get_balance(
    service: web::Data<Arc<TransactionService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, LedgerError> {
    METRICS.http_requests_total.inc();
    let user_id = parse_user_id(&path)?;

    let balance = service.balance(user_id).await?;
    METRICS.balance_queries_total.inc();

    Ok(HttpResponse::Ok().json(BalanceResponse::new(user_id, balance)))
}

/// Submit a win/lose transaction for a user
pub async fn process_transaction(
    service: web::Data<Arc<TransactionService>>,
    path: web::Path<String>,
    req: HttpRequest,
    body: web::Json<TransactionBody>,
) -> Result<HttpResponse, LedgerError> {
    METRICS.http_requests_total.inc();
    let user_id = parse_user_id(&path)?;
    let source_type = source_type_from_request(&req)?;

    let transaction = body.into_inner().into_new_transaction(user_id, source_type)?;

    let timer = METRICS.transaction_duration_seconds.start_timer();
    let outcome = match service.process_transaction(transaction).await {
        Ok(outcome) => outcome,
        Err(err) => {
            METRICS.transactions_failed_total.inc();
            return Err(err);
        }
    };
    timer.observe_duration();

    match outcome {
        ProcessOutcome::Applied => METRICS.transactions_applied_total.inc(),
        ProcessOutcome::AlreadyProcessed => METRICS.transactions_duplicate_total.inc(),
    }

    // Idempotent replays are success to the caller.
    Ok(HttpResponse::Ok().finish())
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> HttpResponse {
    match METRICS.export() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(err) => HttpResponse::InternalServerError().json(json!({
            "error": "Failed to gather metrics",
            "details": err.to_string()
        })),
    }
}

fn parse_user_id(raw: &str) -> Result<UserId, LedgerError> {
    match raw.parse::<UserId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(LedgerError::InvalidArgument("invalid user ID".into())),
    }
}

fn source_type_from_request(req: &HttpRequest) -> Result<SourceType, LedgerError> {
    req.headers()
        .get(SOURCE_TYPE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .parse()
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/user")
            .route("/{user_id}/balance", web::get().to(get_balance))
            .route("/{user_id}/transaction", web::post().to(process_transaction)),
    )
    .route("/health", web::get().to(health_check))
    .route("/metrics", web::get().to(metrics_endpoint));
}
