//! # npc Schema
//!
//! Pluggable validation for values crossing the npc boundary.
//!
//! ## Philosophy
//!
//! - **Validate at the boundary**: untyped values never cross into typed APIs
//! - **Contract, not library**: anything with `parse(raw) -> T` is a schema
//! - **Explain failures**: every failure carries the path and reason of each bad field
//!
//! Schemas are used twice: as registration middleware on the procedure side,
//! and to validate call results on the caller side.

pub mod error;
pub mod validator;

pub use error::{PathSegment, ValidationError, ValidationIssue};
pub use validator::{validate, Json, Raw, Validator};
