use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use quotaledger_ledger::{ErrorClass, LedgerError};

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let code = err.code();
    match err {
        LedgerError::InsufficientBalance { available, requested } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": code,
                "message": err.to_string(),
                "available": available,
                "requested": requested,
            })),
        )
            .into_response(),
        LedgerError::SameHolder { .. } | LedgerError::InvalidAmount { .. } | LedgerError::Malformed(_) => {
            json_error(StatusCode::BAD_REQUEST, code, err.to_string())
        }
        LedgerError::DuplicateReference { .. } | LedgerError::DuplicateEntitlement { .. } => {
            json_error(StatusCode::CONFLICT, code, err.to_string())
        }
        // Cross-tenant ids are indistinguishable from unknown ones on the wire.
        LedgerError::NotFound | LedgerError::CrossTenantAccess => {
            json_error(StatusCode::NOT_FOUND, "not_found", "not found")
        }
        LedgerError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, code, msg),
        LedgerError::Contention { .. } => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            code,
            "balance is busy; try again",
        ),
        LedgerError::Unavailable(msg) => {
            tracing::error!(error = %msg, "ledger unavailable");
            json_error(StatusCode::SERVICE_UNAVAILABLE, code, "ledger unavailable")
        }
        other => {
            debug_assert_eq!(other.class(), ErrorClass::Validation);
            json_error(StatusCode::UNPROCESSABLE_ENTITY, code, other.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
