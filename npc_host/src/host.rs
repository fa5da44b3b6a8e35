//! Host runtime owning the registry and the server answering calls.

use crate::api::NpcApi;
use crate::config::{ConfigError, HostConfig};
use crate::registrar::HostRegistrar;
use npc_lifecycle::CancellationReason;
use npc_logger::LoggerError;
use npc_registry::ProcedureRegistry;
use npc_remote::{LoopbackTransport, NpcClient, NpcServer};
use npc_types::{EndpointAddress, InvalidAddressError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggerError),

    #[error("connecting a client requires a running tokio runtime")]
    NoRuntime,

    #[error("host has shut down")]
    ShutDown,
}

/// Owns the procedure table of one process
///
/// Extensions register through [`NpcHost::api`]; callers reach the
/// registered procedures through clients from [`NpcHost::connect`].
pub struct NpcHost {
    config: HostConfig,
    root: EndpointAddress,
    registry: Arc<ProcedureRegistry>,
    server: Arc<NpcServer>,
    api: NpcApi,
}

impl NpcHost {
    /// Validates `config` and builds an empty host
    ///
    /// Installs the global subscriber when the config carries logging
    /// settings.
    pub fn start(config: HostConfig) -> Result<Self, HostError> {
        config.validate()?;
        if let Some(logging) = &config.logging {
            npc_logger::init(logging)?;
        }

        let root = config.root()?;
        let registry = Arc::new(ProcedureRegistry::with_policy(config.collision_policy));
        let server = Arc::new(NpcServer::with_policy(
            Arc::clone(&registry),
            config.version_policy(),
        ));
        let registrar = HostRegistrar::new(root.clone(), Arc::clone(&registry));
        let api = NpcApi::new(Arc::new(registrar));

        tracing::info!(
            root = %root,
            policy = ?config.collision_policy,
            min_schema_major = config.min_schema_major,
            "npc host started"
        );

        Ok(Self {
            config,
            root,
            registry,
            server,
            api,
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn root(&self) -> &EndpointAddress {
        &self.root
    }

    /// Registration surface for extensions
    pub fn api(&self) -> NpcApi {
        self.api.clone()
    }

    pub fn registry(&self) -> &Arc<ProcedureRegistry> {
        &self.registry
    }

    pub fn server(&self) -> &Arc<NpcServer> {
        &self.server
    }

    /// Final address of `path` once registered on this host
    pub fn endpoint(&self, path: &str) -> Result<EndpointAddress, InvalidAddressError> {
        Ok(self.root.concat(&EndpointAddress::normalize(path)?))
    }

    /// Creates a client wired to this host's server
    ///
    /// Each client gets its own loopback channel; dropping the client
    /// cancels whatever it still has running.
    pub fn connect(&self) -> Result<NpcClient, HostError> {
        if self.registry.is_closed() {
            return Err(HostError::ShutDown);
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(HostError::NoRuntime);
        }
        let transport = LoopbackTransport::connect(Arc::clone(&self.server));
        Ok(NpcClient::new(Arc::new(transport)))
    }

    /// Cancels running calls and closes the registry
    ///
    /// Returns the number of calls that were cancelled.
    pub fn shutdown(&self) -> usize {
        let cancelled = self
            .server
            .cancel_all(CancellationReason::Custom("host shutting down".to_string()));
        let removed = self.registry.shutdown();
        tracing::info!(cancelled, removed, "npc host shut down");
        cancelled
    }
}
