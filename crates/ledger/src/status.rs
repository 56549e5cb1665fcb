//! Audit columns and the soft-delete lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quotaledger_core::UserId;

/// Creation audit columns shared by every ledger row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Audit {
    pub fn new(created_by: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            created_by,
            created_at,
        }
    }
}

/// Two-state, one-way lifecycle of a ledger row.
///
/// `Deleted` rows stay in the log for audit but never contribute to any
/// aggregate. There is no transition back to `Active`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecordStatus {
    Active,
    Deleted {
        deleted_by: UserId,
        deleted_at: DateTime<Utc>,
    },
}

impl RecordStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, RecordStatus::Active)
    }

    pub fn is_deleted(&self) -> bool {
        !self.is_active()
    }

    /// Flip to `Deleted`. An already-deleted status keeps its original actor/timestamp.
    pub fn retract(&mut self, by: UserId, at: DateTime<Utc>) -> Retraction {
        match self {
            RecordStatus::Active => {
                *self = RecordStatus::Deleted {
                    deleted_by: by,
                    deleted_at: at,
                };
                Retraction::Retracted
            }
            RecordStatus::Deleted { .. } => Retraction::AlreadyRetracted,
        }
    }
}

/// Outcome of a soft delete. Both variants are success.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retraction {
    Retracted,
    AlreadyRetracted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retract_is_one_way_and_idempotent() {
        let first_actor = UserId::new();
        let first_at = Utc::now();
        let mut status = RecordStatus::Active;

        assert_eq!(status.retract(first_actor, first_at), Retraction::Retracted);
        let after_first = status;

        assert_eq!(status.retract(UserId::new(), Utc::now()), Retraction::AlreadyRetracted);
        assert_eq!(status, after_first);
        assert!(status.is_deleted());
    }
}
