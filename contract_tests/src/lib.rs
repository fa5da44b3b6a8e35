//! # Wire Contract Tests
//!
//! "Golden" tests for the npc call protocol, so the shapes both sides of a
//! boundary depend on don't drift accidentally.
//!
//! ## Structure
//!
//! - [`call`]: request, response and abort envelopes
//! - [`errors`]: structured call errors and their codes
//! - [`address`]: endpoint address string form

pub mod address;
pub mod call;
pub mod errors;

/// Common test helpers for contract validation
pub mod test_helpers {
    use npc_ipc::{MessageEnvelope, MessagePayload, SchemaVersion};
    use npc_types::EndpointAddress;
    use serde::Serialize;

    /// Builds an envelope around an arbitrary payload
    pub fn create_test_envelope<T: Serialize>(
        destination: &str,
        action: &str,
        version: SchemaVersion,
        payload: &T,
    ) -> MessageEnvelope {
        let destination = EndpointAddress::parse(destination).expect("invalid test address");
        let payload = MessagePayload::new(payload).expect("failed to serialize payload");
        MessageEnvelope::new(destination, action, version, payload)
    }

    /// Verifies an envelope has the expected action and version
    pub fn verify_envelope_contract(
        envelope: &MessageEnvelope,
        expected_action: &str,
        expected_version: SchemaVersion,
    ) {
        assert_eq!(
            envelope.action, expected_action,
            "action identifier changed: expected '{}', got '{}'",
            expected_action, envelope.action
        );
        assert_eq!(
            envelope.schema_version, expected_version,
            "schema version changed: expected {}, got {}",
            expected_version, envelope.schema_version
        );
    }

    /// Verifies schema version stays within major version
    pub fn verify_major_version(envelope: &MessageEnvelope, expected_major: u32) {
        assert_eq!(
            envelope.schema_version.major, expected_major,
            "major version changed (breaking change): expected {}, got {}",
            expected_major, envelope.schema_version.major
        );
    }

    /// Serializes `value` and decodes the JSON back into a generic tree
    pub fn wire_json<T: Serialize>(value: &T) -> serde_json::Value {
        serde_json::to_value(value).expect("failed to serialize")
    }
}
