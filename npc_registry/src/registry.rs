//! Address-keyed procedure table.

use crate::procedure::{BoxFuture, Procedure, ProcedureError};
use npc_types::{EndpointAddress, InvalidAddressError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// What happens when an address is registered twice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Keep the existing procedure and fail the registration
    #[default]
    Reject,
    /// Swap in the new procedure
    Replace,
}

/// Error types for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("a procedure is already registered at {0}")]
    AlreadyRegistered(EndpointAddress),

    #[error("{0} appears more than once in the same registration")]
    DuplicateInBatch(EndpointAddress),

    #[error("middleware declared for {0}, which names no procedure")]
    OrphanMiddleware(String),

    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddressError),

    #[error("no procedure registered at {0}")]
    NotFound(EndpointAddress),

    #[error("registry is shut down")]
    Closed,
}

/// Metadata for a registered procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureDescriptor {
    pub address: EndpointAddress,
    pub has_middleware: bool,
}

#[derive(Default)]
struct RegistryState {
    procedures: HashMap<EndpointAddress, Procedure>,
    closed: bool,
}

/// Procedure registry
///
/// Holds at most one procedure per address. Every mutation happens inside a
/// single write-lock critical section, and the lock is never held while a
/// procedure runs.
pub struct ProcedureRegistry {
    policy: CollisionPolicy,
    state: RwLock<RegistryState>,
}

impl ProcedureRegistry {
    /// Creates a registry that rejects duplicate addresses
    pub fn new() -> Self {
        Self::with_policy(CollisionPolicy::default())
    }

    pub fn with_policy(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers one procedure
    pub fn insert(
        &self,
        address: EndpointAddress,
        procedure: Procedure,
    ) -> Result<(), RegistryError> {
        self.insert_batch(vec![(address, procedure)]).map(|_| ())
    }

    /// Registers several procedures, all or nothing
    ///
    /// Duplicates within the batch and (under [`CollisionPolicy::Reject`])
    /// collisions with existing procedures are detected before anything is
    /// inserted. Returns the addresses in batch order.
    pub fn insert_batch(
        &self,
        entries: Vec<(EndpointAddress, Procedure)>,
    ) -> Result<Vec<EndpointAddress>, RegistryError> {
        let mut state = self.write();
        if state.closed {
            return Err(RegistryError::Closed);
        }

        let mut seen = HashSet::with_capacity(entries.len());
        for (address, _) in &entries {
            if !seen.insert(address) {
                return Err(RegistryError::DuplicateInBatch(address.clone()));
            }
            if self.policy == CollisionPolicy::Reject && state.procedures.contains_key(address) {
                tracing::warn!(endpoint = %address, "rejected duplicate registration");
                return Err(RegistryError::AlreadyRegistered(address.clone()));
            }
        }

        let mut addresses = Vec::with_capacity(entries.len());
        for (address, procedure) in entries {
            let has_middleware = procedure.has_middleware();
            if state
                .procedures
                .insert(address.clone(), procedure)
                .is_some()
            {
                tracing::info!(endpoint = %address, "replaced registered procedure");
            } else {
                tracing::debug!(endpoint = %address, has_middleware, "registered procedure");
            }
            addresses.push(address);
        }
        Ok(addresses)
    }

    /// Looks up a procedure
    pub fn lookup(&self, address: &EndpointAddress) -> Result<Procedure, RegistryError> {
        self.read()
            .procedures
            .get(address)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(address.clone()))
    }

    pub fn contains(&self, address: &EndpointAddress) -> bool {
        self.read().procedures.contains_key(address)
    }

    pub fn descriptor(&self, address: &EndpointAddress) -> Option<ProcedureDescriptor> {
        self.read()
            .procedures
            .get(address)
            .map(|procedure| ProcedureDescriptor {
                address: address.clone(),
                has_middleware: procedure.has_middleware(),
            })
    }

    /// Lists all registered procedures, sorted by address
    pub fn descriptors(&self) -> Vec<ProcedureDescriptor> {
        let mut descriptors: Vec<_> = self
            .read()
            .procedures
            .iter()
            .map(|(address, procedure)| ProcedureDescriptor {
                address: address.clone(),
                has_middleware: procedure.has_middleware(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.address.cmp(&b.address));
        descriptors
    }

    /// Returns the number of registered procedures
    pub fn count(&self) -> usize {
        self.read().procedures.len()
    }

    /// Starts the procedure at `address` with `input`
    ///
    /// Middleware runs before this returns; the handler runs when the
    /// returned future is polled.
    pub fn dispatch(
        &self,
        address: &EndpointAddress,
        input: Value,
    ) -> Result<BoxFuture<'static, Result<Value, ProcedureError>>, RegistryError> {
        let procedure = self.lookup(address).map_err(|err| {
            tracing::debug!(endpoint = %address, "dispatch to unknown endpoint");
            err
        })?;
        Ok(procedure.invoke(input))
    }

    /// Drops every procedure and refuses further registrations
    ///
    /// Returns how many procedures were dropped.
    pub fn shutdown(&self) -> usize {
        let mut state = self.write();
        state.closed = true;
        let dropped = state.procedures.len();
        state.procedures.clear();
        tracing::info!(dropped, "procedure registry shut down");
        dropped
    }

    pub fn is_closed(&self) -> bool {
        self.read().closed
    }
}

impl Default for ProcedureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::HandlerError;
    use serde_json::json;

    fn addr(path: &str) -> EndpointAddress {
        EndpointAddress::parse(path).unwrap()
    }

    fn constant(value: i64) -> Procedure {
        Procedure::from_fn(move |_input: Value| Ok::<_, HandlerError>(value))
    }

    #[test]
    fn test_registry_creation() {
        let registry = ProcedureRegistry::new();
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.policy(), CollisionPolicy::Reject);
    }

    #[tokio::test]
    async fn test_insert_and_dispatch() {
        let registry = ProcedureRegistry::new();
        registry.insert(addr("ns/one"), constant(1)).unwrap();

        assert!(registry.contains(&addr("ns/one")));
        let result = registry
            .dispatch(&addr("ns/one"), Value::Null)
            .unwrap()
            .await;
        assert_eq!(result, Ok(json!(1)));
    }

    #[test]
    fn test_lookup_not_found() {
        let registry = ProcedureRegistry::new();
        assert_eq!(
            registry.lookup(&addr("ns/missing")).unwrap_err(),
            RegistryError::NotFound(addr("ns/missing"))
        );
        assert!(registry.dispatch(&addr("ns/missing"), Value::Null).is_err());
    }

    #[tokio::test]
    async fn test_reject_policy_keeps_first() {
        let registry = ProcedureRegistry::new();
        registry.insert(addr("ns/x"), constant(1)).unwrap();

        let result = registry.insert(addr("ns/x"), constant(2));
        assert_eq!(result, Err(RegistryError::AlreadyRegistered(addr("ns/x"))));

        let value = registry.dispatch(&addr("ns/x"), Value::Null).unwrap().await;
        assert_eq!(value, Ok(json!(1)));
    }

    #[tokio::test]
    async fn test_replace_policy_swaps() {
        let registry = ProcedureRegistry::with_policy(CollisionPolicy::Replace);
        registry.insert(addr("ns/x"), constant(1)).unwrap();
        registry.insert(addr("ns/x"), constant(2)).unwrap();

        assert_eq!(registry.count(), 1);
        let value = registry.dispatch(&addr("ns/x"), Value::Null).unwrap().await;
        assert_eq!(value, Ok(json!(2)));
    }

    #[test]
    fn test_batch_is_atomic_on_collision() {
        let registry = ProcedureRegistry::new();
        registry.insert(addr("ns/b"), constant(0)).unwrap();

        let result = registry.insert_batch(vec![
            (addr("ns/a"), constant(1)),
            (addr("ns/b"), constant(2)),
        ]);
        assert_eq!(result, Err(RegistryError::AlreadyRegistered(addr("ns/b"))));
        assert!(!registry.contains(&addr("ns/a")));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_batch_rejects_internal_duplicates_under_any_policy() {
        let registry = ProcedureRegistry::with_policy(CollisionPolicy::Replace);
        let result = registry.insert_batch(vec![
            (addr("ns/a"), constant(1)),
            (addr("ns/a"), constant(2)),
        ]);
        assert_eq!(result, Err(RegistryError::DuplicateInBatch(addr("ns/a"))));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_batch_returns_addresses_in_order() {
        let registry = ProcedureRegistry::new();
        let addresses = registry
            .insert_batch(vec![
                (addr("ns/z"), constant(1)),
                (addr("ns/a"), constant(2)),
            ])
            .unwrap();
        assert_eq!(addresses, vec![addr("ns/z"), addr("ns/a")]);
    }

    #[test]
    fn test_descriptors_are_sorted() {
        let registry = ProcedureRegistry::new();
        registry.insert(addr("b/two"), constant(2)).unwrap();
        registry.insert(addr("a/one"), constant(1)).unwrap();

        let listed: Vec<_> = registry
            .descriptors()
            .into_iter()
            .map(|d| d.address.to_string())
            .collect();
        assert_eq!(listed, vec!["a/one", "b/two"]);
        assert_eq!(
            registry.descriptor(&addr("a/one")),
            Some(ProcedureDescriptor {
                address: addr("a/one"),
                has_middleware: false,
            })
        );
    }

    #[test]
    fn test_shutdown_refuses_registration() {
        let registry = ProcedureRegistry::new();
        registry.insert(addr("ns/a"), constant(1)).unwrap();

        assert_eq!(registry.shutdown(), 1);
        assert!(registry.is_closed());
        assert_eq!(registry.count(), 0);
        assert_eq!(
            registry.insert(addr("ns/a"), constant(1)),
            Err(RegistryError::Closed)
        );
        assert!(registry.lookup(&addr("ns/a")).is_err());
    }

    #[test]
    fn test_collision_policy_serde() {
        assert_eq!(
            serde_json::to_value(CollisionPolicy::Replace).unwrap(),
            json!("replace")
        );
        let parsed: CollisionPolicy = serde_json::from_value(json!("reject")).unwrap();
        assert_eq!(parsed, CollisionPolicy::Reject);
    }
}
