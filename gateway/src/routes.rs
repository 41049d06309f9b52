//! Public operational surface
//!
//! Tenant-scoped HTTP endpoints over the orchestration core. Handlers stay
//! thin: decode, delegate to a component, map errors through [`ApiError`].

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use orchestration::PaymentInstruction;
use repair::{CorrectiveAction, RepairFilter, RepairStatus, RepairType, TransactionRepair};
use resiliency::{QueuedMessageFilter, QueuedMessageStatus};
use routing::RouteContext;
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/uetr/generate", post(uetr_generate))
        .route("/uetr/track/:uetr", get(uetr_track))
        .route("/uetr/journey/:uetr", get(uetr_journey))
        .route("/uetr/statistics", get(uetr_statistics))
        .route("/uetr/validate/:uetr", get(uetr_validate))
        .route("/routing/route", get(route_payment_query).post(route_payment))
        .route("/orchestration/payments", post(submit_payment))
        .route("/orchestration/payments/:reference", get(get_payment))
        .route(
            "/orchestration/payments/:reference/callback",
            post(clearing_callback),
        )
        .route("/repairs", get(list_repairs).post(create_repair))
        .route("/repairs/statistics", get(repair_statistics))
        .route("/repairs/:id/assign", post(assign_repair))
        .route("/repairs/:id/action", post(apply_repair_action))
        .route("/repairs/:id/resolve", post(resolve_repair))
        .route("/resiliency/health", get(resiliency_health))
        .route("/resiliency/queued-messages", get(queued_messages))
        .route(
            "/resiliency/queued-messages/reprocess",
            post(reprocess_queued),
        )
        .route("/resiliency/recovery/trigger", post(trigger_recovery))
        .route(
            "/fraud/configurations",
            get(list_fraud_configs).post(upsert_fraud_config),
        )
        .route("/fraud/assessments", get(list_assessments))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// Service health and metrics

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "paygrid-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

async fn metrics(State(state): State<AppState>) -> Result<String, ApiError> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&state.envelope.metrics().registry().gather(), &mut buffer)
        .map_err(|e| ApiError::internal(format!("metrics encoding failed: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| ApiError::internal(format!("metrics encoding failed: {}", e)))
}

// UETR

#[derive(Debug, Deserialize)]
struct GenerateUetrRequest {
    tenant_id: String,
    #[serde(default = "default_message_type")]
    message_type: String,
}

fn default_message_type() -> String {
    "pacs.008".to_string()
}

async fn uetr_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateUetrRequest>,
) -> Json<serde_json::Value> {
    let uetr = state
        .generator
        .generate(&request.message_type, &request.tenant_id);
    Json(serde_json::json!({ "uetr": uetr }))
}

async fn uetr_track(
    State(state): State<AppState>,
    Path(uetr): Path<String>,
) -> Result<Json<uetr::UetrTrackingRecord>, ApiError> {
    state
        .tracking
        .latest(&uetr)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no tracking records for {}", uetr)))
}

async fn uetr_journey(
    State(state): State<AppState>,
    Path(uetr): Path<String>,
) -> Result<Json<Vec<uetr::UetrTrackingRecord>>, ApiError> {
    Ok(Json(state.tracking.get_journey(&uetr)?))
}

#[derive(Debug, Deserialize)]
struct StatisticsQuery {
    tenant_id: String,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

async fn uetr_statistics(
    State(state): State<AppState>,
    Query(query): Query<StatisticsQuery>,
) -> Json<uetr::UetrStatistics> {
    Json(
        state
            .tracking
            .statistics(&query.tenant_id, query.from, query.to),
    )
}

async fn uetr_validate(
    State(state): State<AppState>,
    Path(value): Path<String>,
) -> Json<serde_json::Value> {
    let valid = state.generator.validate_format(&value);
    let segments = valid.then(|| uetr::extract(&value).ok()).flatten();
    Json(serde_json::json!({ "uetr": value, "valid": valid, "segments": segments }))
}

// Routing

#[derive(Debug, Deserialize)]
struct RouteRequest {
    tenant_id: String,
    payment_type: String,
    local_instrument_code: String,
    #[serde(default = "default_message_type")]
    message_type: String,
    from_account: Option<String>,
    to_account: Option<String>,
}

async fn route_payment(
    State(state): State<AppState>,
    Json(request): Json<RouteRequest>,
) -> Result<Json<routing::PaymentRoute>, ApiError> {
    resolve_route(&state, request).await
}

async fn route_payment_query(
    State(state): State<AppState>,
    Query(request): Query<RouteRequest>,
) -> Result<Json<routing::PaymentRoute>, ApiError> {
    resolve_route(&state, request).await
}

async fn resolve_route(
    state: &AppState,
    request: RouteRequest,
) -> Result<Json<routing::PaymentRoute>, ApiError> {
    let route = state
        .routing
        .route_message(&RouteContext {
            tenant_id: request.tenant_id,
            payment_type: request.payment_type,
            local_instrument_code: request.local_instrument_code,
            message_type: request.message_type,
            from_account: request.from_account,
            to_account: request.to_account,
        })
        .await?;
    Ok(Json(route))
}

// Orchestration

async fn submit_payment(
    State(state): State<AppState>,
    Json(instruction): Json<PaymentInstruction>,
) -> Result<Json<orchestration::PaymentOutcome>, ApiError> {
    let reference = instruction.transaction_reference.clone();
    let uetr = instruction.uetr.clone();
    state
        .orchestrator
        .submit_payment(instruction)
        .await
        .map(Json)
        .map_err(|e| ApiError::from(e).with_context(uetr, Some(reference)))
}

async fn get_payment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<orchestration::PaymentOutcome>, ApiError> {
    Ok(Json(state.orchestrator.get_payment(&reference)?))
}

#[derive(Debug, Deserialize)]
struct CallbackRequest {
    accepted: bool,
    reason: Option<String>,
}

async fn clearing_callback(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(request): Json<CallbackRequest>,
) -> Result<Json<orchestration::PaymentOutcome>, ApiError> {
    let outcome = state
        .orchestrator
        .handle_clearing_callback(&reference, request.accepted, request.reason.as_deref())
        .await
        .map_err(|e| ApiError::from(e).with_context(None, Some(reference)))?;
    Ok(Json(outcome))
}

// Repairs

#[derive(Debug, Deserialize)]
struct RepairsQuery {
    tenant_id: Option<String>,
    status: Option<RepairStatus>,
    repair_type: Option<RepairType>,
    assigned_to: Option<String>,
    #[serde(default)]
    high_priority_only: bool,
}

async fn list_repairs(
    State(state): State<AppState>,
    Query(query): Query<RepairsQuery>,
) -> Json<Vec<TransactionRepair>> {
    Json(state.repairs.list(&RepairFilter {
        tenant_id: query.tenant_id,
        status: query.status,
        repair_type: query.repair_type,
        assigned_to: query.assigned_to,
        high_priority_only: query.high_priority_only,
    }))
}

#[derive(Debug, Deserialize)]
struct CreateRepairRequest {
    transaction_reference: String,
    tenant_id: String,
    repair_type: RepairType,
    from_account: String,
    to_account: String,
    amount: Decimal,
    currency: String,
    #[serde(default = "default_repair_priority")]
    priority: i32,
}

fn default_repair_priority() -> i32 {
    5
}

async fn create_repair(
    State(state): State<AppState>,
    Json(request): Json<CreateRepairRequest>,
) -> Json<TransactionRepair> {
    let record = TransactionRepair::new(
        request.transaction_reference,
        request.tenant_id,
        request.repair_type,
        request.from_account,
        request.to_account,
        request.amount,
        request.currency,
        request.priority,
    );
    let id = state.repairs.create(record.clone());
    Json(state.repairs.get(id).unwrap_or(record))
}

#[derive(Debug, Deserialize)]
struct AssignRequest {
    user: String,
}

async fn assign_repair(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<TransactionRepair>, ApiError> {
    Ok(Json(state.repairs.assign(id, &request.user)?))
}

#[derive(Debug, Deserialize)]
struct ActionRequest {
    action: CorrectiveAction,
    version: u64,
    actor: String,
    details: Option<String>,
}

async fn apply_repair_action(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<TransactionRepair>, ApiError> {
    let repair = state
        .repairs
        .apply_corrective_action(
            id,
            request.version,
            request.action,
            request.details,
            &request.actor,
        )
        .await?;
    Ok(Json(repair))
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    actor: String,
    notes: String,
}

async fn resolve_repair(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<TransactionRepair>, ApiError> {
    Ok(Json(state.repairs.resolve(id, &request.actor, &request.notes)?))
}

#[derive(Debug, Deserialize)]
struct TenantQuery {
    tenant_id: String,
}

async fn repair_statistics(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> Json<repair::RepairStatistics> {
    Json(state.repairs.statistics(&query.tenant_id))
}

// Resiliency

async fn resiliency_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "services": state.monitor.health_snapshot(),
        "recoveries": state.monitor.recovery_records(),
    }))
}

#[derive(Debug, Deserialize)]
struct QueuedQuery {
    tenant_id: Option<String>,
    service_name: Option<String>,
    status: Option<QueuedMessageStatus>,
}

async fn queued_messages(
    State(state): State<AppState>,
    Query(query): Query<QueuedQuery>,
) -> Json<Vec<resiliency::QueuedMessage>> {
    Json(state.queue.list(&QueuedMessageFilter {
        tenant_id: query.tenant_id,
        service_name: query.service_name,
        status: query.status,
    }))
}

#[derive(Debug, Deserialize)]
struct ReprocessRequest {
    service_name: String,
    tenant_id: Option<String>,
}

async fn reprocess_queued(
    State(state): State<AppState>,
    Json(request): Json<ReprocessRequest>,
) -> Json<serde_json::Value> {
    let (processed, failed) = state
        .monitor
        .process_queued_messages_for_service(&request.service_name, request.tenant_id.as_deref())
        .await;
    Json(serde_json::json!({ "processed": processed, "failed": failed }))
}

#[derive(Debug, Deserialize)]
struct RecoveryRequest {
    service_name: String,
    tenant_id: String,
}

async fn trigger_recovery(
    State(state): State<AppState>,
    Json(request): Json<RecoveryRequest>,
) -> Json<resiliency::RecoveryRecord> {
    Json(
        state
            .monitor
            .recover_service(&request.service_name, &request.tenant_id)
            .await,
    )
}

// Fraud

async fn list_fraud_configs(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> Json<Vec<fraud::FraudConfiguration>> {
    Json(state.fraud_configs.list(&query.tenant_id))
}

async fn upsert_fraud_config(
    State(state): State<AppState>,
    Json(config): Json<fraud::FraudConfiguration>,
) -> Json<serde_json::Value> {
    let name = config.configuration_name.clone();
    state.fraud_configs.upsert(config);
    Json(serde_json::json!({ "configuration_name": name, "status": "saved" }))
}

async fn list_assessments(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> Json<Vec<fraud::FraudAssessment>> {
    Json(state.fraud.list(&query.tenant_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::state::build;
    use tower::ServiceExt;

    async fn app() -> Router {
        let (state, _background) = build(&GatewayConfig::default()).unwrap();
        router(state)
    }

    fn get_request(uri: &str) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(axum::body::Body::empty())
            .unwrap()
    }

    fn post_request(uri: &str, body: serde_json::Value) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = app().await.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_uetr_generate_and_validate() {
        let app = app().await;

        let response = app
            .clone()
            .oneshot(post_request(
                "/uetr/generate",
                serde_json::json!({"tenant_id": "demo-bank", "message_type": "pacs.008"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = body_json(response).await;
        let generated = body["uetr"].as_str().unwrap().to_string();
        assert_eq!(generated.len(), 36);

        let response = app
            .oneshot(get_request(&format!("/uetr/validate/{}", generated)))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["valid"], true);
        assert_eq!(body["segments"]["system_id"], "PGRD");
    }

    #[tokio::test]
    async fn test_submit_payment_and_journey() {
        let app = app().await;

        let response = app
            .clone()
            .oneshot(post_request(
                "/orchestration/payments",
                serde_json::json!({
                    "transaction_reference": "TXN-HTTP-1",
                    "tenant_id": "demo-bank",
                    "payment_type": "WIRE_DOMESTIC",
                    "local_instrument_code": "WIRE",
                    "from_account": "ACC-100",
                    "to_account": "ACC-200",
                    "amount": "1000.00",
                    "currency": "USD"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["state"], "SETTLED");
        let uetr = body["uetr"].as_str().unwrap().to_string();

        let response = app
            .oneshot(get_request(&format!("/uetr/journey/{}", uetr)))
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let journey = body_json(response).await;
        assert!(journey.as_array().unwrap().len() >= 3);
    }

    #[tokio::test]
    async fn test_unknown_journey_is_404() {
        let response = app()
            .await
            .oneshot(get_request(
                "/uetr/journey/20260115093000PGRDPACS008XABCDEFGH12",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_route_endpoint() {
        let response = app()
            .await
            .oneshot(post_request(
                "/routing/route",
                serde_json::json!({
                    "tenant_id": "demo-bank",
                    "payment_type": "ACH_CREDIT",
                    "local_instrument_code": "CCD",
                    "from_account": "ACC-100",
                    "to_account": "EXT-999"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["routing_type"], "OTHER_BANK");
        assert_eq!(body["clearing_system_code"], "ACH");
    }

    #[tokio::test]
    async fn test_repair_lifecycle_over_http() {
        let app = app().await;

        let response = app
            .clone()
            .oneshot(post_request(
                "/repairs",
                serde_json::json!({
                    "transaction_reference": "TXN-R-1",
                    "tenant_id": "demo-bank",
                    "repair_type": "CREDIT_FAILED",
                    "from_account": "ACC-100",
                    "to_account": "ACC-200",
                    "amount": "250.00",
                    "currency": "USD",
                    "priority": 7
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let created = body_json(response).await;
        let id = created["id"].as_str().unwrap().to_string();
        let version = created["version"].as_u64().unwrap();

        let response = app
            .clone()
            .oneshot(post_request(
                &format!("/repairs/{}/assign", id),
                serde_json::json!({"user": "ops@demo-bank"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let assigned = body_json(response).await;
        assert_eq!(assigned["repair_status"], "ASSIGNED");

        // Acting with the stale pre-assign version conflicts
        let response = app
            .oneshot(post_request(
                &format!("/repairs/{}/action", id),
                serde_json::json!({
                    "action": "NO_ACTION",
                    "version": version,
                    "actor": "ops@demo-bank"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::CONFLICT);
    }
}
