//! Row and parameter shapes for the reference entities.
//!
//! # Invariants
//! - Row types mirror what the backend returns, including generated ids.
//! - Update params always carry the target id.

pub mod permission;
pub mod role;
