use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", post(open_entitlement).put(correct_entitlement))
}

pub async fn open_entitlement(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::EntitlementRequest>,
) -> axum::response::Response {
    let (holder, category, period) = match parse_key(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .ledger
        .open_entitlement(principal.actor(), &holder, &category, period, body.amount)
        .await
    {
        Ok(e) => (StatusCode::CREATED, Json(e)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn correct_entitlement(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::EntitlementRequest>,
) -> axum::response::Response {
    let (holder, category, period) = match parse_key(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .ledger
        .correct_entitlement(principal.actor(), &holder, &category, period, body.amount)
        .await
    {
        Ok(e) => (StatusCode::OK, Json(e)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

fn parse_key(
    body: &dto::EntitlementRequest,
) -> Result<(quotaledger_core::HolderId, quotaledger_core::CategoryCode, quotaledger_core::Period), axum::response::Response>
{
    Ok((
        dto::parse_holder(&body.holder)?,
        dto::parse_category(&body.category)?,
        dto::parse_period(body.period)?,
    ))
}
