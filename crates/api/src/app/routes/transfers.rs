use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};

use quotaledger_core::MovementId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_transfers).post(propose_transfer))
        .route("/:id", delete(retract_transfer))
}

pub async fn list_transfers(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::ListTransfersQuery>,
) -> axum::response::Response {
    let period = match dto::parse_period(q.period) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match services
        .ledger
        .list_movements(principal.actor(), period, q.include_deleted)
        .await
    {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn propose_transfer(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::ProposeTransferRequest>,
) -> axum::response::Response {
    let request = match dto::to_transfer_request(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match services.ledger.propose_transfer(principal.actor(), &request).await {
        Ok(id) => (StatusCode::CREATED, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn retract_transfer(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MovementId = match id.parse() {
        Ok(id) => id,
        Err(_) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
    };
    match services.ledger.retract_transfer(principal.actor(), id).await {
        Ok(outcome) => (StatusCode::OK, Json(serde_json::json!({ "outcome": outcome }))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
