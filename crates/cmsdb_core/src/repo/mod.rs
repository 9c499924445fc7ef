//! Command families for the reference entities, one module per backend.
//!
//! # Responsibility
//! - Implement the create/update/delete command contracts for `roles` and
//!   `permissions`.
//! - Keep backend SQL next to the command that issues it.
//!
//! # Invariants
//! - Update/delete commands read their before-image on the engine
//!   transaction and report `NotFound` when no row matches.

#[cfg(feature = "mysql")]
pub mod mysql_role_repo;
pub mod permission_repo;
#[cfg(feature = "postgres")]
pub mod pg_role_repo;
pub mod role_repo;
