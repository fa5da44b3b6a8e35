//! # npc IPC
//!
//! Wire-level message primitives for named procedure calls.
//!
//! ## Philosophy
//!
//! - **Messages, not shared memory**: a call is a request envelope and a response envelope
//! - **Typed, not stringly-typed**: every payload has an action and a schema version
//! - **Traceable**: responses and aborts carry the id of the request they concern
//! - **Versionable**: receivers accept a window of schema versions, not one exact version
//!
//! ## Architecture
//!
//! A [`MessageEnvelope`] holds routing information (the endpoint address),
//! the action it carries, the payload's schema version, an optional
//! correlation id, and a JSON payload. The [`typed`] module defines the three
//! payloads npc exchanges: [`CallRequest`], [`CallResponse`] and
//! [`AbortRequest`].
//!
//! The physical transport is not defined here.

pub mod message;
pub mod typed;

pub use message::{
    Compatibility, MessageEnvelope, MessageId, MessagePayload, SchemaMismatchError,
    SchemaVersion, VersionPolicy,
};
pub use typed::{
    AbortRequest, CallError, CallErrorCode, CallRequest, CallResponse, CallStatus,
    EnvelopeError, CALL_ABORT_ACTION, CALL_REQUEST_ACTION, CALL_RESPONSE_ACTION,
    NPC_SCHEMA_VERSION,
};
