//! Typed npc call messages.
//!
//! Three payloads cross the boundary: a call request, its response, and an
//! abort notification for an in-flight request. Each has a fixed envelope
//! action and carries the schema version it was written against.

use crate::{MessageEnvelope, MessageId, MessagePayload, SchemaVersion};
use npc_schema::{ValidationError, ValidationIssue};
use npc_types::EndpointAddress;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Call message schema version (v1.0).
pub const NPC_SCHEMA_VERSION: SchemaVersion = SchemaVersion::new(1, 0);

/// Envelope action for call requests.
pub const CALL_REQUEST_ACTION: &str = "npc.call.request";

/// Envelope action for call responses.
pub const CALL_RESPONSE_ACTION: &str = "npc.call.response";

/// Envelope action for aborting an in-flight call.
pub const CALL_ABORT_ACTION: &str = "npc.call.abort";

/// Errors unwrapping a typed message from an envelope
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("unexpected action: expected {expected}, found {found}")]
    UnexpectedAction {
        expected: &'static str,
        found: String,
    },

    #[error("payload codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

fn open<T: DeserializeOwned>(
    envelope: &MessageEnvelope,
    expected: &'static str,
) -> Result<T, EnvelopeError> {
    if envelope.action != expected {
        return Err(EnvelopeError::UnexpectedAction {
            expected,
            found: envelope.action.clone(),
        });
    }
    Ok(envelope.payload.deserialize()?)
}

/// One invocation of a named procedure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallRequest {
    pub version: SchemaVersion,
    pub endpoint: EndpointAddress,
    /// The single argument passed to the procedure.
    #[serde(default)]
    pub input: Value,
}

impl CallRequest {
    pub fn new(endpoint: EndpointAddress, input: Value) -> Self {
        Self {
            version: NPC_SCHEMA_VERSION,
            endpoint,
            input,
        }
    }

    /// Wraps this request in an envelope addressed to its endpoint.
    pub fn into_envelope(self) -> Result<MessageEnvelope, serde_json::Error> {
        let payload = MessagePayload::new(&self)?;
        Ok(MessageEnvelope::new(
            self.endpoint,
            CALL_REQUEST_ACTION,
            self.version,
            payload,
        ))
    }

    pub fn from_envelope(envelope: &MessageEnvelope) -> Result<Self, EnvelopeError> {
        open(envelope, CALL_REQUEST_ACTION)
    }
}

/// Outcome carried by a [`CallResponse`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Ok(Value),
    Error(CallError),
}

/// Response to a [`CallRequest`], correlated by request id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallResponse {
    pub version: SchemaVersion,
    pub status: CallStatus,
}

impl CallResponse {
    pub fn ok(output: Value) -> Self {
        Self {
            version: NPC_SCHEMA_VERSION,
            status: CallStatus::Ok(output),
        }
    }

    pub fn error(error: CallError) -> Self {
        Self {
            version: NPC_SCHEMA_VERSION,
            status: CallStatus::Error(error),
        }
    }

    pub fn into_result(self) -> Result<Value, CallError> {
        match self.status {
            CallStatus::Ok(value) => Ok(value),
            CallStatus::Error(error) => Err(error),
        }
    }

    /// Wraps this response in an envelope correlated to `request`.
    pub fn into_envelope(
        self,
        endpoint: EndpointAddress,
        request: MessageId,
    ) -> Result<MessageEnvelope, serde_json::Error> {
        let payload = MessagePayload::new(&self)?;
        Ok(
            MessageEnvelope::new(endpoint, CALL_RESPONSE_ACTION, self.version, payload)
                .with_correlation(request),
        )
    }

    pub fn from_envelope(envelope: &MessageEnvelope) -> Result<Self, EnvelopeError> {
        open(envelope, CALL_RESPONSE_ACTION)
    }
}

/// Asks the receiving side to stop working on `request_id`.
///
/// Best effort: the receiver may already have answered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AbortRequest {
    pub version: SchemaVersion,
    pub request_id: MessageId,
}

impl AbortRequest {
    pub fn new(request_id: MessageId) -> Self {
        Self {
            version: NPC_SCHEMA_VERSION,
            request_id,
        }
    }

    pub fn into_envelope(
        self,
        endpoint: EndpointAddress,
    ) -> Result<MessageEnvelope, serde_json::Error> {
        let payload = MessagePayload::new(&self)?;
        Ok(
            MessageEnvelope::new(endpoint, CALL_ABORT_ACTION, self.version, payload)
                .with_correlation(self.request_id),
        )
    }

    pub fn from_envelope(envelope: &MessageEnvelope) -> Result<Self, EnvelopeError> {
        open(envelope, CALL_ABORT_ACTION)
    }
}

/// Error codes for structured call failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallErrorCode {
    /// No procedure is registered at the address
    UnknownEndpoint,
    /// Middleware rejected the input; the handler never ran
    InvalidInput,
    /// The handler itself failed
    HandlerFailed,
    /// The call was aborted before it settled
    Cancelled,
    /// The request's schema version is outside the accepted window
    UnsupportedVersion,
    Internal,
}

/// Structured call error as it travels on the wire.
///
/// `kind` and `cause` preserve a handler's error identity and nesting;
/// `issues` carries validation detail for `InvalidInput`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallError {
    pub code: CallErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<CallError>>,
}

impl CallError {
    pub fn new(code: CallErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            kind: None,
            details: None,
            issues: Vec::new(),
            cause: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_issues(mut self, issues: Vec<ValidationIssue>) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_cause(mut self, cause: CallError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn unknown_endpoint(endpoint: &EndpointAddress) -> Self {
        Self::new(
            CallErrorCode::UnknownEndpoint,
            format!("no procedure registered at {}", endpoint),
        )
    }

    pub fn invalid_input(error: ValidationError) -> Self {
        Self::new(CallErrorCode::InvalidInput, error.to_string()).with_issues(error.into_issues())
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::new(CallErrorCode::Cancelled, reason)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CallErrorCode::Internal, message)
    }

    /// Iterates this error followed by its nested causes.
    pub fn chain(&self) -> impl Iterator<Item = &CallError> {
        std::iter::successors(Some(self), |err| err.cause.as_deref())
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{}: {}", kind, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for CallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}
