//! Caller side of a named procedure call.

use crate::error::NpcError;
use crate::transport::Transport;
use crate::typed::CallOptions;
use npc_ipc::{AbortRequest, CallRequest, CallResponse, MessageId};
use npc_lifecycle::CancellationToken;
use npc_schema::{validate, Validator};
use npc_types::EndpointAddress;
use serde_json::Value;
use std::sync::Arc;

/// Issues calls over a [`Transport`]
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct NpcClient {
    transport: Arc<dyn Transport>,
}

impl NpcClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Invokes the procedure at `endpoint` with a single argument
    ///
    /// When `signal` is already cancelled nothing is sent. When it fires
    /// while the call is pending, the pending exchange is dropped, an abort
    /// is sent to the other side, and the call fails with
    /// [`NpcError::Cancelled`]. A response that is already available wins
    /// over a signal that fires at the same time.
    pub async fn call(
        &self,
        endpoint: &EndpointAddress,
        input: Value,
        signal: Option<&CancellationToken>,
    ) -> Result<Value, NpcError> {
        if let Some(reason) = signal.and_then(CancellationToken::reason) {
            return Err(NpcError::Cancelled {
                endpoint: endpoint.clone(),
                reason,
            });
        }

        let request = CallRequest::new(endpoint.clone(), input)
            .into_envelope()
            .map_err(|err| NpcError::Codec(err.to_string()))?;
        let request_id = request.id;
        tracing::debug!(endpoint = %endpoint, request_id = %request_id, "sending call");

        let exchange = self.transport.exchange(request);
        let response = match signal {
            None => exchange.await?,
            Some(signal) => tokio::select! {
                biased;
                response = exchange => response?,
                reason = signal.cancelled() => {
                    tracing::debug!(endpoint = %endpoint, request_id = %request_id, %reason, "call cancelled");
                    self.abort(endpoint, request_id).await;
                    return Err(NpcError::Cancelled {
                        endpoint: endpoint.clone(),
                        reason,
                    });
                }
            },
        };

        if response.correlation_id != Some(request_id) {
            return Err(NpcError::Codec(format!(
                "response not correlated to request {}",
                request_id
            )));
        }

        CallResponse::from_envelope(&response)
            .map_err(|err| NpcError::Codec(err.to_string()))?
            .into_result()
            .map_err(|err| NpcError::from_call_error(endpoint.clone(), err))
    }

    /// Like [`call`](Self::call), parsing `path` as an address first
    pub async fn call_path(
        &self,
        path: &str,
        input: Value,
        signal: Option<&CancellationToken>,
    ) -> Result<Value, NpcError> {
        let endpoint = EndpointAddress::parse(path)?;
        self.call(&endpoint, input, signal).await
    }

    pub async fn call_with(
        &self,
        endpoint: &EndpointAddress,
        options: CallOptions,
    ) -> Result<Value, NpcError> {
        self.call(endpoint, options.input, options.signal.as_ref())
            .await
    }

    /// Calls `endpoint` and validates the raw result with `schema`
    pub async fn call_typed<T, V>(
        &self,
        endpoint: &EndpointAddress,
        schema: &V,
        options: CallOptions,
    ) -> Result<T, NpcError>
    where
        V: Validator<T> + ?Sized,
    {
        let raw = self.call_with(endpoint, options).await?;
        validate(schema, raw).map_err(|error| NpcError::SchemaValidation {
            endpoint: endpoint.clone(),
            error,
        })
    }

    async fn abort(&self, endpoint: &EndpointAddress, request_id: MessageId) {
        let message = match AbortRequest::new(request_id).into_envelope(endpoint.clone()) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(request_id = %request_id, error = %err, "failed to encode abort");
                return;
            }
        };
        if let Err(err) = self.transport.notify(message).await {
            tracing::debug!(request_id = %request_id, error = %err, "abort not delivered");
        }
    }
}
