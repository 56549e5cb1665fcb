//! `quotaledger-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{Entity, TenantScoped};
pub use error::DomainError;
pub use id::{CategoryCode, ConsumptionId, GroupId, HolderId, MovementId, Period, TenantId, UserId};
