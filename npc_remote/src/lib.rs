//! # npc Remote
//!
//! Calling named procedures across a process boundary.
//!
//! The caller holds an [`NpcClient`]; the side that owns the procedures runs
//! an [`NpcServer`] over its [`ProcedureRegistry`](npc_registry::ProcedureRegistry).
//! Between them sits a [`Transport`], which only moves envelopes.
//!
//! Every failure a caller can observe is an [`NpcError`].

pub mod client;
pub mod error;
pub mod loopback;
pub mod server;
pub mod transport;
pub mod typed;

pub use client::NpcClient;
pub use error::NpcError;
pub use loopback::LoopbackTransport;
pub use server::NpcServer;
pub use transport::{Transport, TransportError};
pub use typed::{CallOptions, TypedEndpoint};
