use axum::{routing::get, Router};

pub mod balances;
pub mod consumptions;
pub mod entitlements;
pub mod holders;
pub mod system;
pub mod transfers;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/balances", balances::router())
        .nest("/holders", holders::router())
        .nest("/entitlements", entitlements::router())
        .nest("/transfers", transfers::router())
        .nest("/consumptions", consumptions::router())
}
