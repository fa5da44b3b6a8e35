//! Typed convenience surface over [`NpcClient`].
//!
//! A [`TypedEndpoint`] pairs a fixed address with a fixed result schema.
//! Every call through it validates the raw result before returning, so the
//! caller only ever sees a `T` or an [`NpcError`].

use crate::client::NpcClient;
use crate::error::NpcError;
use npc_lifecycle::CancellationToken;
use npc_schema::{Json, Validator};
use npc_types::EndpointAddress;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// Input and optional abort signal for one call
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub input: Value,
    pub signal: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

impl From<Value> for CallOptions {
    fn from(input: Value) -> Self {
        Self::new().with_input(input)
    }
}

/// A remote procedure with a known address and result schema
pub struct TypedEndpoint<T, V> {
    endpoint: EndpointAddress,
    schema: V,
    _marker: PhantomData<fn() -> T>,
}

impl<T, V> TypedEndpoint<T, V>
where
    V: Validator<T>,
{
    pub fn new(endpoint: EndpointAddress, schema: V) -> Self {
        Self {
            endpoint,
            schema,
            _marker: PhantomData,
        }
    }

    pub fn endpoint(&self) -> &EndpointAddress {
        &self.endpoint
    }

    /// Calls the endpoint and validates its result
    pub async fn call(&self, client: &NpcClient, options: CallOptions) -> Result<T, NpcError> {
        client
            .call_typed(&self.endpoint, &self.schema, options)
            .await
    }
}

impl<T: DeserializeOwned> TypedEndpoint<T, Json<T>> {
    /// Endpoint whose result is decoded with `T`'s `Deserialize` impl
    pub fn json(endpoint: EndpointAddress) -> Self {
        Self::new(endpoint, Json::new())
    }
}

impl<T, V> fmt::Debug for TypedEndpoint<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedEndpoint")
            .field("endpoint", &self.endpoint)
            .field("output", &std::any::type_name::<T>())
            .finish()
    }
}
