//! # Host
//!
//! Wires the procedure registry, the call server and the extension-facing
//! registration API into one process-level runtime.
//!
//! ## Philosophy
//!
//! - Extensions never see the registry, only [`NpcApi`]
//! - Every registration lands under the host's root namespace
//! - Configuration is validated once, at [`NpcHost::start`]

pub mod api;
pub mod config;
pub mod host;
pub mod registrar;

pub use api::NpcApi;
pub use config::{ConfigError, HostConfig, DEFAULT_ROOT_NAMESPACE};
pub use host::{HostError, NpcHost};
pub use registrar::{HostRegistrar, ProcedureRegistrar};
