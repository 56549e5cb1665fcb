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
    Router::new().route("/:holder/activity", get(get_holder_activity))
}

pub async fn get_holder_activity(
    Extension(services): Extension<AppServices>,
    Extension(principal): Extension<PrincipalContext>,
    Path(holder): Path<String>,
    Query(q): Query<dto::PeriodQuery>,
) -> axum::response::Response {
    let holder = match dto::parse_holder(&holder) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let period = match dto::parse_period(q.period) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match services
        .ledger
        .get_holder_activity(principal.actor(), &holder, period)
        .await
    {
        Ok(activity) => {
            let balances = activity.balances.iter().map(dto::balance_to_json).collect::<Vec<_>>();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "holder": activity.holder,
                    "period": activity.period,
                    "balances": balances,
                    "transfers_in": activity.transfers_in,
                    "transfers_out": activity.transfers_out,
                    "consumptions": activity.consumptions,
                })),
            )
                .into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}
