use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use quotaledger_core::{CategoryCode, HolderId, Period};
use quotaledger_ledger::{Balance, ConsumptionRequest, ExternalRef, GroupBalance, RiskLevel, TransferRequest};

use crate::app::errors;

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub period: i32,
}

#[derive(Debug, Deserialize)]
pub struct ListTransfersQuery {
    pub period: i32,
    #[serde(default)]
    pub include_deleted: bool,
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ProposeTransferRequest {
    pub source: String,
    pub destination: String,
    pub category: String,
    pub period: i32,
    pub amount: i64,
    pub note: Option<String>,
    pub effective_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RecordConsumptionRequest {
    pub holder: String,
    pub category: String,
    pub amount: i64,
    pub event_date: NaiveDate,
    pub external_ref: String,
}

#[derive(Debug, Deserialize)]
pub struct EntitlementRequest {
    pub holder: String,
    pub category: String,
    pub period: i32,
    pub amount: i64,
}

// -------------------------
// Parsing helpers
// -------------------------

fn validation(msg: impl Into<String>) -> axum::response::Response {
    errors::json_error(StatusCode::BAD_REQUEST, "malformed", msg)
}

pub fn parse_period(year: i32) -> Result<Period, axum::response::Response> {
    Period::new(year).map_err(|e| validation(e.to_string()))
}

pub fn parse_holder(raw: &str) -> Result<HolderId, axum::response::Response> {
    HolderId::parse(raw).map_err(|e| validation(e.to_string()))
}

pub fn parse_category(raw: &str) -> Result<CategoryCode, axum::response::Response> {
    CategoryCode::parse(raw).map_err(|e| validation(e.to_string()))
}

pub fn to_transfer_request(body: ProposeTransferRequest) -> Result<TransferRequest, axum::response::Response> {
    Ok(TransferRequest {
        source: parse_holder(&body.source)?,
        destination: parse_holder(&body.destination)?,
        category: parse_category(&body.category)?,
        period: parse_period(body.period)?,
        amount: body.amount,
        note: body.note,
        effective_date: body.effective_date,
    })
}

pub fn to_consumption_request(body: RecordConsumptionRequest) -> Result<ConsumptionRequest, axum::response::Response> {
    Ok(ConsumptionRequest {
        holder: parse_holder(&body.holder)?,
        category: parse_category(&body.category)?,
        amount: body.amount,
        event_date: body.event_date,
        external_ref: ExternalRef::parse(&body.external_ref).map_err(|e| validation(e.to_string()))?,
    })
}

// -------------------------
// Response mapping
// -------------------------

pub fn balance_to_json(b: &Balance) -> Value {
    json!({
        "holder": b.holder,
        "category": b.category,
        "period": b.period,
        "entitlement": b.entitlement,
        "transfers_in": b.transfers_in,
        "transfers_out": b.transfers_out,
        "consumed": b.consumed,
        "remaining": b.remaining,
        "pct_remaining": b.pct_remaining(),
        "risk": b.risk(),
    })
}

pub fn group_balance_to_json(g: &GroupBalance) -> Value {
    let pct = (g.entitlement > 0).then(|| g.remaining as f64 / g.entitlement as f64 * 100.0);
    json!({
        "group": g.group.as_ref().map(|id| id.as_str()).unwrap_or("ungrouped"),
        "category": g.category,
        "period": g.period,
        "holders": g.holders,
        "entitlement": g.entitlement,
        "transfers_in": g.transfers_in,
        "transfers_out": g.transfers_out,
        "consumed": g.consumed,
        "remaining": g.remaining,
        "pct_remaining": pct,
        "risk": RiskLevel::from_pct_remaining(pct),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotaledger_ledger::LedgerTotals;

    #[test]
    fn balance_json_carries_derived_fields() {
        let b = Balance::from_parts(
            HolderId::parse("H1").unwrap(),
            CategoryCode::parse("COD").unwrap(),
            Period::new(2024).unwrap(),
            Some(10_000),
            LedgerTotals {
                transfers_in: 0,
                transfers_out: 3_500,
                consumed: 3_000,
            },
        );
        let v = balance_to_json(&b);
        assert_eq!(v["remaining"], 3_500);
        assert_eq!(v["pct_remaining"], 35.0);
        assert_eq!(v["risk"], "warning");
        assert_eq!(v["holder"], "H1");
        assert_eq!(v["period"], 2024);
    }

    #[test]
    fn missing_entitlement_has_no_percentage() {
        let b = Balance::from_parts(
            HolderId::parse("H3").unwrap(),
            CategoryCode::parse("COD").unwrap(),
            Period::new(2024).unwrap(),
            None,
            LedgerTotals::default(),
        );
        let v = balance_to_json(&b);
        assert!(v["pct_remaining"].is_null());
        assert_eq!(v["risk"], "n/a");
    }

    #[test]
    fn blank_codes_are_rejected() {
        assert_eq!(parse_holder("  ").unwrap_err().status(), StatusCode::BAD_REQUEST);
        assert_eq!(parse_period(12).unwrap_err().status(), StatusCode::BAD_REQUEST);
    }
}
