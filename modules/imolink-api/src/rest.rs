//! JSON handlers. A failed discovery still answers 200 with the default
//! URL; only unresolvable identifiers and store outages surface as
//! errors.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::{info, warn};

use imolink_common::types::DiscoveredLink;
use imolink_common::ImolinkError;
use imolink_engine::{resolve::resolve_target, TargetOutcome};
use imolink_store::LinkStore;

use crate::AppState;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "service": "imolink-api", "status": "ok" }))
}

#[derive(Deserialize)]
pub struct DiscoverRequest {
    locality: String,
    state: String,
    operation_type: String,
    platform: String,
}

pub async fn discover_link(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DiscoverRequest>,
) -> impl IntoResponse {
    let target = match resolve_target(
        &state.store,
        &body.locality,
        &body.state,
        &body.operation_type,
        &body.platform,
    )
    .await
    {
        Ok(target) => target,
        Err(err) => return error_response(err),
    };

    info!(target = %target, "On-demand discovery requested");

    let outcome = match state.orchestrator.process_target(&target).await {
        Ok(outcome) => outcome,
        Err(err) => return error_response(err),
    };

    if let TargetOutcome::Failed(reason) = &outcome {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "status": "error", "error": reason })),
        )
            .into_response();
    }

    let link = match state.store.find_link(&target.key()).await {
        Ok(link) => link,
        Err(err) => return error_response(err),
    };

    let status = response_status(&outcome, link.as_ref());
    Json(serde_json::json!({ "status": status, "link": link })).into_response()
}

/// Top-level status for a discovery response. A skipped target reports
/// the confidence of the row that made it fresh, not a blanket
/// "discovered".
fn response_status(outcome: &TargetOutcome, link: Option<&DiscoveredLink>) -> String {
    match outcome {
        TargetOutcome::Discovered { .. } => "discovered".to_string(),
        TargetOutcome::Defaulted { .. } => "default".to_string(),
        TargetOutcome::Skipped => link
            .map(|row| row.status.clone())
            .unwrap_or_else(|| "discovered".to_string()),
        TargetOutcome::Failed(_) => "error".to_string(),
    }
}

#[derive(Deserialize)]
pub struct ListParams {
    limit: Option<i64>,
}

pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);
    match state.store.list_links(limit).await {
        Ok(links) => Json(serde_json::json!({ "count": links.len(), "links": links }))
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    use imolink_store::ReferenceStore;

    let localities = state.store.active_localities().await;
    let platforms = state.store.active_platforms().await;
    let operations = state.store.operation_types().await;
    let summary = state.store.status_summary().await;
    let last_cycle = state.store.last_cycle().await;

    match (localities, platforms, operations, summary, last_cycle) {
        (Ok(localities), Ok(platforms), Ok(operations), Ok(summary), Ok(last_cycle)) => {
            Json(serde_json::json!({
                "database": "ok",
                "active_localities": localities.len(),
                "active_platforms": platforms.len(),
                "operation_types": operations.len(),
                "links_by_status": summary,
                "last_cycle": last_cycle,
            }))
            .into_response()
        }
        (l, p, o, s, c) => {
            let err = [
                l.err().map(|e| e.to_string()),
                p.err().map(|e| e.to_string()),
                o.err().map(|e| e.to_string()),
                s.err().map(|e| e.to_string()),
                c.err().map(|e| e.to_string()),
            ]
            .into_iter()
            .flatten()
            .next()
            .unwrap_or_else(|| "unknown".to_string());
            warn!(error = %err, "Status check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "database": "unreachable", "error": err })),
            )
                .into_response()
        }
    }
}


/// 1:1 mapping from the error taxonomy to response codes: identifier
/// resolution failures are the caller's problem, store outages are ours.
fn error_response(err: ImolinkError) -> axum::response::Response {
    let code = match &err {
        ImolinkError::PersistenceConflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ImolinkError::StoreUnavailable(_) | ImolinkError::ReferenceDataUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(error = %err, "Request failed");
    (
        code,
        Json(serde_json::json!({ "status": "error", "error": err.to_string() })),
    )
        .into_response()
}
