//! `quotaledger-auth` — pure authorization boundary.
//!
//! The ledger receives an already-resolved actor; this crate decides what that
//! actor may do. It is decoupled from HTTP and storage. Token decoding lives
//! here only so the HTTP adapter can turn a bearer token into an [`Actor`].

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{can, Action, AuthzError, Resource};
pub use claims::{Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError, validate_claims};
pub use permissions::Permission;
pub use principal::Actor;
pub use roles::Role;
