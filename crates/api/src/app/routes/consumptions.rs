use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};

use quotaledger_core::ConsumptionId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_consumption))
        .route("/:id", delete(retract_consumption))
}

pub async fn record_consumption(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RecordConsumptionRequest>,
) -> axum::response::Response {
    let request = match dto::to_consumption_request(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match services.ledger.record_consumption(principal.actor(), &request).await {
        Ok(id) => (StatusCode::CREATED, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn retract_consumption(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ConsumptionId = match id.parse() {
        Ok(id) => id,
        Err(_) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
    };
    match services.ledger.retract_consumption(principal.actor(), id).await {
        Ok(outcome) => (StatusCode::OK, Json(serde_json::json!({ "outcome": outcome }))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
