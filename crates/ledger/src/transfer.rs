//! Transfer validation rules.
//!
//! Steps run in a fixed order and each failure is reported on its own:
//! 1. source != destination
//! 2. amount > 0
//! 3. category is transferable
//! 4. both holders exist, are active and belong to the tenant
//! 5. source remaining >= amount
//!
//! Steps 1-4 are pure checks over the request and reference data. Step 5 must
//! run inside the storage layer's per-key serialization, against the balance
//! read under that same serialization.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use quotaledger_core::{CategoryCode, HolderId, Period, TenantId};

use crate::balance::Balance;
use crate::error::{LedgerError, LedgerResult};
use crate::reference::{Category, Holder};
use crate::MAX_AMOUNT;

pub const MAX_NOTE_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source: HolderId,
    pub destination: HolderId,
    pub category: CategoryCode,
    pub period: Period,
    pub amount: i64,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
}

impl TransferRequest {
    /// Steps 1 and 2, plus note length.
    pub fn validate_shape(&self) -> LedgerResult<()> {
        if self.source == self.destination {
            return Err(LedgerError::SameHolder {
                holder: self.source.to_string(),
            });
        }
        if self.amount <= 0 || self.amount > MAX_AMOUNT {
            return Err(LedgerError::InvalidAmount { amount: self.amount });
        }
        if let Some(note) = &self.note {
            if note.chars().count() > MAX_NOTE_LEN {
                return Err(LedgerError::malformed(format!(
                    "note longer than {MAX_NOTE_LEN} characters"
                )));
            }
        }
        Ok(())
    }

    /// Whitespace-only notes are stored as absent.
    pub fn normalized_note(&self) -> Option<String> {
        self.note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }
}

/// Step 3.
pub fn check_category<'a>(
    tenant_id: TenantId,
    code: &CategoryCode,
    category: Option<&'a Category>,
) -> LedgerResult<&'a Category> {
    let category = category
        .filter(|c| c.visible_to(tenant_id))
        .ok_or_else(|| LedgerError::UnknownCategory {
            category: code.to_string(),
        })?;
    if !category.transferable {
        return Err(LedgerError::NonTransferableCategory {
            category: code.to_string(),
        });
    }
    Ok(category)
}

/// Step 4, for a single holder.
pub fn check_holder(tenant_id: TenantId, id: &HolderId, holder: Option<&Holder>) -> LedgerResult<()> {
    match holder {
        Some(h) if h.tenant_id == tenant_id && h.active && &h.id == id => Ok(()),
        _ => Err(LedgerError::UnknownHolder {
            holder: id.to_string(),
        }),
    }
}

/// Step 5. Sign-agnostic: a negative remaining simply makes every positive
/// amount insufficient.
pub fn check_sufficient(source: &Balance, amount: i64) -> LedgerResult<()> {
    if source.remaining < amount {
        return Err(LedgerError::InsufficientBalance {
            available: source.remaining,
            requested: amount,
        });
    }
    Ok(())
}
