//! # Procedure Registry
//!
//! Address-based registration and dispatch of named procedures.
//!
//! ## Philosophy
//!
//! Procedures are found by their [`EndpointAddress`](npc_types::EndpointAddress),
//! never by reflection over an object. A group of procedures is declared
//! explicitly as a [`ProcedureSet`], so its order and middleware are visible
//! at the call site.
//!
//! The registry does not own any transport; the invocation layer asks it to
//! [`dispatch`](ProcedureRegistry::dispatch) and awaits the result.

pub mod procedure;
pub mod registry;
pub mod set;

pub use procedure::{BoxFuture, HandlerError, Procedure, ProcedureError};
pub use registry::{CollisionPolicy, ProcedureDescriptor, ProcedureRegistry, RegistryError};
pub use set::ProcedureSet;
