//! Registration surface handed to extensions.

use crate::registrar::ProcedureRegistrar;
use npc_registry::{HandlerError, Procedure, ProcedureSet, RegistryError};
use npc_schema::Validator;
use npc_types::EndpointAddress;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What an extension sees of the host
///
/// The registrar is optional: an extension loaded by a host that does not
/// offer procedure registration gets `Ok(None)` from every register call
/// instead of an error. Paths may use `/` or `\` as separators.
#[derive(Clone, Default)]
pub struct NpcApi {
    registrar: Option<Arc<dyn ProcedureRegistrar>>,
}

impl NpcApi {
    pub fn new(registrar: Arc<dyn ProcedureRegistrar>) -> Self {
        Self {
            registrar: Some(registrar),
        }
    }

    /// An API without registration support
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.registrar.is_some()
    }

    /// Registers an async handler at `path`
    pub async fn register<F, Fut, O, E>(
        &self,
        path: &str,
        handler: F,
    ) -> Result<Option<EndpointAddress>, RegistryError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
        O: Serialize,
        E: Into<HandlerError>,
    {
        self.register_procedure(path, Procedure::new(handler)).await
    }

    /// Registers a handler whose input first passes through `middleware`
    pub async fn register_with_middleware<T, V, F, Fut, O, E>(
        &self,
        path: &str,
        handler: F,
        middleware: V,
    ) -> Result<Option<EndpointAddress>, RegistryError>
    where
        T: Send + 'static,
        V: Validator<T> + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
        O: Serialize,
        E: Into<HandlerError>,
    {
        self.register_procedure(path, Procedure::with_middleware(middleware, handler))
            .await
    }

    pub async fn register_procedure(
        &self,
        path: &str,
        procedure: Procedure,
    ) -> Result<Option<EndpointAddress>, RegistryError> {
        let Some(registrar) = &self.registrar else {
            tracing::debug!(path, "no registrar, skipping registration");
            return Ok(None);
        };
        let path = EndpointAddress::normalize(path)?;
        let address = registrar.register_procedure(&path, procedure).await?;
        tracing::debug!(endpoint = %address, "procedure registered");
        Ok(Some(address))
    }

    /// Registers every procedure of `set` under `namespace`
    ///
    /// The result lists final addresses in the order the set declared them.
    /// Without a registrar every entry is `None`.
    pub async fn register_namespace(
        &self,
        namespace: &str,
        set: ProcedureSet,
    ) -> Result<Vec<Option<EndpointAddress>>, RegistryError> {
        let Some(registrar) = &self.registrar else {
            tracing::debug!(namespace, "no registrar, skipping namespace");
            return Ok(vec![None; set.len()]);
        };
        let namespace = EndpointAddress::normalize(namespace)?;
        let entries = set.resolve(&namespace)?;
        let addresses = registrar.register_procedures(entries).await?;
        tracing::debug!(namespace = %namespace, count = addresses.len(), "namespace registered");
        Ok(addresses.into_iter().map(Some).collect())
    }
}

impl fmt::Debug for NpcApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NpcApi")
            .field("available", &self.is_available())
            .finish()
    }
}
