use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_balances))
        .route("/groups", get(list_group_balances))
        .route("/:holder/:category/:period", get(get_balance))
}

pub async fn list_balances(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::PeriodQuery>,
) -> axum::response::Response {
    let period = match dto::parse_period(q.period) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match services.ledger.get_balances(principal.actor(), period).await {
        Ok(rows) => {
            let items = rows.iter().map(dto::balance_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_group_balances(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::PeriodQuery>,
) -> axum::response::Response {
    let period = match dto::parse_period(q.period) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match services.ledger.get_group_balances(principal.actor(), period).await {
        Ok(rows) => {
            let items = rows.iter().map(dto::group_balance_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// A key with no rows reads as a zero balance, never 404.
pub async fn get_balance(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Path((holder, category, period)): Path<(String, String, i32)>,
) -> axum::response::Response {
    let parsed = dto::parse_holder(&holder).and_then(|h| {
        let c = dto::parse_category(&category)?;
        let p = dto::parse_period(period)?;
        Ok((h, c, p))
    });
    let (holder, category, period) = match parsed {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .ledger
        .get_balance(principal.actor(), &holder, &category, period)
        .await
    {
        Ok(b) => (StatusCode::OK, Json(dto::balance_to_json(&b))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
