//! Procedure side of a named procedure call.

use npc_ipc::{
    AbortRequest, CallError, CallErrorCode, CallRequest, CallResponse, EnvelopeError,
    MessageEnvelope, MessageId, VersionPolicy, CALL_ABORT_ACTION, CALL_REQUEST_ACTION,
    NPC_SCHEMA_VERSION,
};
use futures_util::FutureExt;
use npc_lifecycle::{CancellationReason, CancellationSource, CancellationToken, LifecycleError};
use npc_registry::{HandlerError, ProcedureError, ProcedureRegistry, RegistryError};
use npc_types::EndpointAddress;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Answers call requests from a [`ProcedureRegistry`]
///
/// Each in-flight request owns a cancellation source, so an abort from the
/// caller reaches the running handler.
pub struct NpcServer {
    registry: Arc<ProcedureRegistry>,
    policy: VersionPolicy,
    inflight: Mutex<HashMap<MessageId, CancellationSource>>,
}

impl NpcServer {
    /// Creates a server accepting the current call schema major version
    pub fn new(registry: Arc<ProcedureRegistry>) -> Self {
        Self::with_policy(
            registry,
            VersionPolicy::current(NPC_SCHEMA_VERSION.major, NPC_SCHEMA_VERSION.minor),
        )
    }

    pub fn with_policy(registry: Arc<ProcedureRegistry>, policy: VersionPolicy) -> Self {
        Self {
            registry,
            policy,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ProcedureRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> VersionPolicy {
        self.policy
    }

    fn inflight(&self) -> MutexGuard<'_, HashMap<MessageId, CancellationSource>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of requests currently being executed
    pub fn inflight_count(&self) -> usize {
        self.inflight().len()
    }

    fn begin(&self, request: MessageId) -> CancellationToken {
        let source = CancellationSource::new();
        let token = source.token();
        self.inflight().insert(request, source);
        token
    }

    fn finish(&self, request: MessageId) {
        self.inflight().remove(&request);
    }

    /// Executes one call request and builds its correlated response
    pub async fn handle_call(
        &self,
        request: MessageEnvelope,
    ) -> Result<MessageEnvelope, EnvelopeError> {
        let token = self.begin(request.id);
        let _inflight = Inflight {
            server: self,
            request: request.id,
        };
        self.respond(&request, &token).await
    }

    /// Cancels the in-flight request named by an abort message
    ///
    /// Returns `false` when the request already finished or was never seen.
    pub fn handle_abort(&self, message: &MessageEnvelope) -> bool {
        let abort = match AbortRequest::from_envelope(message) {
            Ok(abort) => abort,
            Err(err) => {
                tracing::warn!(error = %err, "malformed abort request");
                return false;
            }
        };
        match self.inflight().remove(&abort.request_id) {
            Some(source) => {
                tracing::debug!(request_id = %abort.request_id, "aborting in-flight call");
                source.cancel(CancellationReason::UserCancel)
            }
            None => {
                tracing::debug!(request_id = %abort.request_id, "abort for settled call");
                false
            }
        }
    }

    /// Cancels every in-flight request
    pub fn cancel_all(&self, reason: CancellationReason) -> usize {
        let drained: Vec<_> = self.inflight().drain().map(|(_, source)| source).collect();
        for source in &drained {
            source.cancel(reason.clone());
        }
        drained.len()
    }

    /// Serves envelopes from `inbound` until it closes
    ///
    /// Each call runs on its own task; aborts are applied in arrival order,
    /// so an abort is never processed before the request it names. When
    /// `inbound` closes, every in-flight call is cancelled.
    pub async fn serve(
        self: Arc<Self>,
        mut inbound: mpsc::Receiver<MessageEnvelope>,
        outbound: mpsc::Sender<MessageEnvelope>,
    ) {
        while let Some(message) = inbound.recv().await {
            let action = message.action.clone();
            match action.as_str() {
                CALL_REQUEST_ACTION => {
                    let token = self.begin(message.id);
                    let server = Arc::clone(&self);
                    let outbound = outbound.clone();
                    tokio::spawn(async move {
                        let inflight = Inflight {
                            server: &server,
                            request: message.id,
                        };
                        let response = server.respond(&message, &token).await;
                        drop(inflight);
                        match response {
                            Ok(response) => {
                                if outbound.send(response).await.is_err() {
                                    tracing::debug!(request_id = %message.id, "response dropped, caller gone");
                                }
                            }
                            Err(err) => {
                                tracing::error!(request_id = %message.id, error = %err, "failed to encode response");
                            }
                        }
                    });
                }
                CALL_ABORT_ACTION => {
                    self.handle_abort(&message);
                }
                other => {
                    tracing::warn!(action = other, "ignoring unexpected message");
                }
            }
        }
        let cancelled = self.cancel_all(CancellationReason::CallerGone);
        tracing::debug!(cancelled, "inbound channel closed");
    }

    async fn respond(
        &self,
        request: &MessageEnvelope,
        token: &CancellationToken,
    ) -> Result<MessageEnvelope, EnvelopeError> {
        let response = match self.execute(request, token).await {
            Ok(output) => CallResponse::ok(output),
            Err(error) => CallResponse::error(error),
        };
        Ok(response.into_envelope(request.destination.clone(), request.id)?)
    }

    async fn execute(
        &self,
        request: &MessageEnvelope,
        token: &CancellationToken,
    ) -> Result<Value, CallError> {
        let call = CallRequest::from_envelope(request).map_err(|err| {
            tracing::warn!(request_id = %request.id, error = %err, "malformed call request");
            CallError::internal("malformed call request").with_details(err.to_string())
        })?;

        self.policy
            .ensure_compatible(&call.endpoint, call.version)
            .map_err(|err| {
                tracing::warn!(endpoint = %call.endpoint, received = %err.received(), "schema version rejected");
                CallError::new(CallErrorCode::UnsupportedVersion, err.to_string())
            })?;

        token
            .throw_if_cancelled()
            .map_err(|LifecycleError::Cancelled { reason }| CallError::cancelled(reason.to_string()))?;

        // Middleware and synchronous handlers run inside dispatch, so it
        // belongs under the unwind guard too.
        let CallRequest {
            endpoint, input, ..
        } = call;
        let registry = &self.registry;
        let target = &endpoint;
        let run = AssertUnwindSafe(async move {
            let pending = registry.dispatch(target, input).map_err(dispatch_error)?;
            pending.await.map_err(procedure_error)
        })
        .catch_unwind();

        tokio::select! {
            biased;
            reason = token.cancelled() => Err(CallError::cancelled(reason.to_string())),
            outcome = run => outcome.unwrap_or_else(|payload| Err(panicked(&endpoint, payload))),
        }
    }
}

/// Removes a request from the in-flight table when dropped
struct Inflight<'a> {
    server: &'a NpcServer,
    request: MessageId,
}

impl Drop for Inflight<'_> {
    fn drop(&mut self) {
        self.server.finish(self.request);
    }
}

fn dispatch_error(error: RegistryError) -> CallError {
    match error {
        RegistryError::NotFound(endpoint) => {
            tracing::debug!(endpoint = %endpoint, "call to unknown endpoint");
            CallError::unknown_endpoint(&endpoint)
        }
        other => CallError::internal(other.to_string()),
    }
}

fn panicked(endpoint: &EndpointAddress, payload: Box<dyn Any + Send>) -> CallError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "procedure panicked".to_string());
    tracing::error!(endpoint = %endpoint, panic = %message, "procedure panicked");
    CallError::new(CallErrorCode::HandlerFailed, message).with_kind("Panic")
}

fn procedure_error(error: ProcedureError) -> CallError {
    match error {
        ProcedureError::Middleware(error) => CallError::invalid_input(error),
        ProcedureError::Handler(error) => handler_error(error),
        ProcedureError::Output(message) => {
            CallError::internal("procedure output could not be encoded").with_details(message)
        }
    }
}

fn handler_error(error: HandlerError) -> CallError {
    let mut wire =
        CallError::new(CallErrorCode::HandlerFailed, error.message).with_kind(error.kind);
    if let Some(cause) = error.cause {
        wire = wire.with_cause(handler_error(*cause));
    }
    wire
}

#[cfg(test)]
mod tests {
    use super::*;
    use npc_ipc::{CallStatus, MessagePayload, SchemaVersion};
    use npc_registry::Procedure;
    use npc_schema::ValidationError;
    use serde_json::json;

    fn addr(path: &str) -> EndpointAddress {
        EndpointAddress::parse(path).unwrap()
    }

    fn server() -> NpcServer {
        let registry = ProcedureRegistry::new();
        registry
            .insert(
                addr("ns/double"),
                Procedure::from_fn(|v: Value| {
                    v.as_i64()
                        .map(|n| n * 2)
                        .ok_or_else(|| HandlerError::new("TypeError", "expected an integer"))
                }),
            )
            .unwrap();
        registry
            .insert(
                addr("ns/boom"),
                Procedure::from_fn(|_v: Value| -> Result<Value, HandlerError> { panic!("boom") }),
            )
            .unwrap();
        registry
            .insert(
                addr("ns/guarded"),
                Procedure::with_middleware(
                    |_raw: Value| -> Result<i64, ValidationError> {
                        panic!("middleware blew up")
                    },
                    |n: i64| async move { Ok::<_, HandlerError>(n) },
                ),
            )
            .unwrap();
        NpcServer::new(Arc::new(registry))
    }

    async fn call(server: &NpcServer, request: CallRequest) -> (MessageId, CallResponse) {
        let envelope = request.into_envelope().unwrap();
        let id = envelope.id;
        let response = server.handle_call(envelope).await.unwrap();
        assert_eq!(response.correlation_id, Some(id));
        (id, CallResponse::from_envelope(&response).unwrap())
    }

    #[tokio::test]
    async fn test_successful_call() {
        let server = server();
        let (_, response) = call(&server, CallRequest::new(addr("ns/double"), json!(5))).await;
        assert_eq!(response.status, CallStatus::Ok(json!(10)));
        assert_eq!(server.inflight_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let (_, response) =
            call(&server(), CallRequest::new(addr("ns/missing"), json!(5))).await;
        match response.status {
            CallStatus::Error(err) => assert_eq!(err.code, CallErrorCode::UnknownEndpoint),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handler_error_keeps_kind() {
        let (_, response) =
            call(&server(), CallRequest::new(addr("ns/double"), json!("x"))).await;
        match response.into_result() {
            Err(err) => {
                assert_eq!(err.code, CallErrorCode::HandlerFailed);
                assert_eq!(err.kind.as_deref(), Some("TypeError"));
            }
            Ok(value) => panic!("expected error, got {}", value),
        }
    }

    #[tokio::test]
    async fn test_newer_major_version_rejected() {
        let mut request = CallRequest::new(addr("ns/double"), json!(5));
        request.version = SchemaVersion::new(2, 0);
        let (_, response) = call(&server(), request).await;
        match response.into_result() {
            Err(err) => assert_eq!(err.code, CallErrorCode::UnsupportedVersion),
            Ok(value) => panic!("expected error, got {}", value),
        }
    }

    #[tokio::test]
    async fn test_malformed_request_still_answered() {
        let envelope = MessageEnvelope::new(
            addr("ns/double"),
            CALL_REQUEST_ACTION,
            NPC_SCHEMA_VERSION,
            MessagePayload::new(&json!("not a request")).unwrap(),
        );
        let id = envelope.id;
        let response = server().handle_call(envelope).await.unwrap();
        assert_eq!(response.correlation_id, Some(id));
        let error = CallResponse::from_envelope(&response)
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(error.code, CallErrorCode::Internal);
        assert_eq!(error.message, "malformed call request");
        assert!(error.details.is_some());
    }

    #[tokio::test]
    async fn test_panicking_handler_answered() {
        let server = server();
        let (_, response) = call(&server, CallRequest::new(addr("ns/boom"), json!(1))).await;
        let error = response.into_result().unwrap_err();
        assert_eq!(error.code, CallErrorCode::HandlerFailed);
        assert_eq!(error.kind.as_deref(), Some("Panic"));
        assert_eq!(error.message, "boom");
        assert_eq!(server.inflight_count(), 0);

        let (_, response) = call(&server, CallRequest::new(addr("ns/double"), json!(4))).await;
        assert_eq!(response.status, CallStatus::Ok(json!(8)));
    }

    #[tokio::test]
    async fn test_panicking_middleware_answered() {
        let server = server();
        let (_, response) =
            call(&server, CallRequest::new(addr("ns/guarded"), json!(1))).await;
        let error = response.into_result().unwrap_err();
        assert_eq!(error.kind.as_deref(), Some("Panic"));
        assert_eq!(error.message, "middleware blew up");
        assert_eq!(server.inflight_count(), 0);
    }

    #[test]
    fn test_abort_for_unknown_request() {
        let abort = AbortRequest::new(MessageId::new())
            .into_envelope(addr("ns/double"))
            .unwrap();
        assert!(!server().handle_abort(&abort));
    }

    #[test]
    fn test_handler_error_chain_to_wire() {
        let wire = handler_error(
            HandlerError::new("Outer", "a").with_cause(HandlerError::new("Inner", "b")),
        );
        let kinds: Vec<_> = wire.chain().filter_map(|e| e.kind.as_deref()).collect();
        assert_eq!(kinds, vec!["Outer", "Inner"]);
    }
}
