//! The registration primitive the host exposes to extensions.

use async_trait::async_trait;
use npc_registry::{Procedure, ProcedureRegistry, RegistryError};
use npc_types::EndpointAddress;
use std::sync::Arc;

/// Registers procedures with whatever owns the procedure table
///
/// Returns the final address each procedure was registered at, which may
/// differ from the requested path (the host adds its root namespace).
#[async_trait]
pub trait ProcedureRegistrar: Send + Sync {
    async fn register_procedure(
        &self,
        path: &EndpointAddress,
        procedure: Procedure,
    ) -> Result<EndpointAddress, RegistryError>;

    /// Registers several procedures
    ///
    /// The default registers them one at a time and stops at the first
    /// failure, leaving earlier ones registered.
    async fn register_procedures(
        &self,
        entries: Vec<(EndpointAddress, Procedure)>,
    ) -> Result<Vec<EndpointAddress>, RegistryError> {
        let mut registered = Vec::with_capacity(entries.len());
        for (path, procedure) in entries {
            registered.push(self.register_procedure(&path, procedure).await?);
        }
        Ok(registered)
    }
}

/// Registrar backed by the host's registry, prefixing its root namespace
pub struct HostRegistrar {
    root: EndpointAddress,
    registry: Arc<ProcedureRegistry>,
}

impl HostRegistrar {
    pub fn new(root: EndpointAddress, registry: Arc<ProcedureRegistry>) -> Self {
        Self { root, registry }
    }

    pub fn root(&self) -> &EndpointAddress {
        &self.root
    }
}

#[async_trait]
impl ProcedureRegistrar for HostRegistrar {
    async fn register_procedure(
        &self,
        path: &EndpointAddress,
        procedure: Procedure,
    ) -> Result<EndpointAddress, RegistryError> {
        let address = self.root.concat(path);
        self.registry.insert(address.clone(), procedure)?;
        Ok(address)
    }

    /// All or nothing
    async fn register_procedures(
        &self,
        entries: Vec<(EndpointAddress, Procedure)>,
    ) -> Result<Vec<EndpointAddress>, RegistryError> {
        let prefixed = entries
            .into_iter()
            .map(|(path, procedure)| (self.root.concat(&path), procedure))
            .collect();
        self.registry.insert_batch(prefixed)
    }
}
