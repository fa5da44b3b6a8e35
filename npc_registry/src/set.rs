//! Named groups of procedures registered under one namespace.

use crate::procedure::{HandlerError, Procedure};
use crate::registry::RegistryError;
use npc_schema::Validator;
use npc_types::EndpointAddress;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// An ordered name -> procedure mapping with optional per-name middleware
///
/// Order is insertion order; registering the set yields one result per
/// procedure in that order. Adding a name again replaces its procedure but
/// keeps its original position.
///
/// ```
/// use npc_registry::{HandlerError, ProcedureSet};
/// use serde_json::Value;
///
/// let set = ProcedureSet::new()
///     .handler("double", |v: Value| async move {
///         Ok::<_, HandlerError>(v.as_i64().unwrap_or(0) * 2)
///     })
///     .handler("echo", |v: Value| async move { Ok::<_, HandlerError>(v) });
/// assert_eq!(set.names(), vec!["double", "echo"]);
/// ```
#[derive(Clone, Default)]
pub struct ProcedureSet {
    procedures: Vec<(String, Procedure)>,
    middleware: Vec<(String, Arc<dyn Validator<Value>>)>,
}

impl ProcedureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a procedure under `name`
    pub fn procedure(mut self, name: impl Into<String>, procedure: Procedure) -> Self {
        let name = name.into();
        match self.procedures.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = procedure,
            None => self.procedures.push((name, procedure)),
        }
        self
    }

    /// Adds an async handler that receives the raw input
    pub fn handler<F, Fut, O, E>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
        O: Serialize,
        E: Into<HandlerError>,
    {
        self.procedure(name, Procedure::new(handler))
    }

    /// Runs `middleware` before the procedure named `name`
    ///
    /// The middleware's output replaces the input the procedure receives.
    pub fn middleware<V>(mut self, name: impl Into<String>, middleware: V) -> Self
    where
        V: Validator<Value> + 'static,
    {
        let name = name.into();
        let middleware: Arc<dyn Validator<Value>> = Arc::new(middleware);
        match self.middleware.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = middleware,
            None => self.middleware.push((name, middleware)),
        }
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.procedures.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    /// Places every procedure under `namespace`, attaching its middleware
    ///
    /// Fails if a middleware entry names no procedure or a name is not a
    /// valid address segment.
    pub fn resolve(
        self,
        namespace: &EndpointAddress,
    ) -> Result<Vec<(EndpointAddress, Procedure)>, RegistryError> {
        let ProcedureSet {
            procedures,
            mut middleware,
        } = self;

        if let Some((orphan, _)) = middleware
            .iter()
            .find(|(name, _)| !procedures.iter().any(|(p, _)| p == name))
        {
            return Err(RegistryError::OrphanMiddleware(orphan.clone()));
        }

        procedures
            .into_iter()
            .map(|(name, procedure)| -> Result<_, RegistryError> {
                let address = namespace.join(&name)?;
                let procedure = match middleware.iter().position(|(m, _)| *m == name) {
                    Some(index) => {
                        let (_, validator) = middleware.swap_remove(index);
                        procedure.with_input_middleware(validator)
                    }
                    None => procedure,
                };
                Ok((address, procedure))
            })
            .collect()
    }
}

impl fmt::Debug for ProcedureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let middleware: Vec<_> = self.middleware.iter().map(|(name, _)| name).collect();
        f.debug_struct("ProcedureSet")
            .field("procedures", &self.names())
            .field("middleware", &middleware)
            .finish()
    }
}
