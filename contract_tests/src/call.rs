//! Call protocol contract tests
//!
//! Request, response and abort messages exchanged between a client and
//! the server answering it.

#[cfg(test)]
mod tests {
    use crate::test_helpers::*;
    use npc_ipc::{
        AbortRequest, CallError, CallErrorCode, CallRequest, CallResponse, CallStatus,
        MessageEnvelope, MessageId, SchemaVersion, CALL_ABORT_ACTION, CALL_REQUEST_ACTION,
        CALL_RESPONSE_ACTION, NPC_SCHEMA_VERSION,
    };
    use npc_types::EndpointAddress;
    use serde_json::json;

    fn addr(path: &str) -> EndpointAddress {
        EndpointAddress::parse(path).unwrap()
    }

    #[test]
    fn test_action_identifiers() {
        assert_eq!(CALL_REQUEST_ACTION, "npc.call.request");
        assert_eq!(CALL_RESPONSE_ACTION, "npc.call.response");
        assert_eq!(CALL_ABORT_ACTION, "npc.call.abort");
    }

    #[test]
    fn test_schema_version() {
        assert_eq!(NPC_SCHEMA_VERSION, SchemaVersion::new(1, 0));
        assert_eq!(
            wire_json(&NPC_SCHEMA_VERSION),
            json!({ "major": 1, "minor": 0 })
        );
    }

    #[test]
    fn test_request_contract() {
        let request = CallRequest::new(addr("vortex/ns/double"), json!(5));
        assert_eq!(
            wire_json(&request),
            json!({
                "version": { "major": 1, "minor": 0 },
                "endpoint": "vortex/ns/double",
                "input": 5
            })
        );

        let envelope = request.into_envelope().unwrap();
        verify_envelope_contract(&envelope, CALL_REQUEST_ACTION, NPC_SCHEMA_VERSION);
        verify_major_version(&envelope, 1);
        assert_eq!(envelope.destination.as_str(), "vortex/ns/double");
        assert_eq!(envelope.correlation_id, None);
    }

    #[test]
    fn test_request_input_defaults_to_null() {
        let envelope = create_test_envelope(
            "vortex/getMods",
            CALL_REQUEST_ACTION,
            NPC_SCHEMA_VERSION,
            &json!({
                "version": { "major": 1, "minor": 0 },
                "endpoint": "vortex/getMods"
            }),
        );
        let request = CallRequest::from_envelope(&envelope).unwrap();
        assert_eq!(request.input, serde_json::Value::Null);
    }

    #[test]
    fn test_ok_response_contract() {
        let response = CallResponse::ok(json!({ "id": "game" }));
        assert_eq!(
            wire_json(&response),
            json!({
                "version": { "major": 1, "minor": 0 },
                "status": { "ok": { "id": "game" } }
            })
        );

        let request_id = MessageId::new();
        let envelope = response
            .into_envelope(addr("vortex/getCurrentGame"), request_id)
            .unwrap();
        verify_envelope_contract(&envelope, CALL_RESPONSE_ACTION, NPC_SCHEMA_VERSION);
        assert_eq!(envelope.correlation_id, Some(request_id));
        assert!(envelope.is_response());
    }

    #[test]
    fn test_error_response_contract() {
        let response = CallResponse::error(CallError::unknown_endpoint(&addr("vortex/nope")));
        assert_eq!(
            wire_json(&response),
            json!({
                "version": { "major": 1, "minor": 0 },
                "status": {
                    "error": {
                        "code": "unknown_endpoint",
                        "message": "no procedure registered at vortex/nope"
                    }
                }
            })
        );
    }

    #[test]
    fn test_abort_contract() {
        let request_id = MessageId::new();
        let abort = AbortRequest::new(request_id);
        assert_eq!(
            wire_json(&abort),
            json!({
                "version": { "major": 1, "minor": 0 },
                "request_id": request_id.to_string()
            })
        );

        let envelope = abort.into_envelope(addr("vortex/ns/slow")).unwrap();
        verify_envelope_contract(&envelope, CALL_ABORT_ACTION, NPC_SCHEMA_VERSION);
        assert_eq!(envelope.correlation_id, Some(request_id));
    }

    #[test]
    fn test_envelope_field_names() {
        let envelope = CallRequest::new(addr("ns/a"), json!(null))
            .into_envelope()
            .unwrap();
        let json = wire_json(&envelope);
        let object = json.as_object().unwrap();
        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "action",
                "correlation_id",
                "destination",
                "id",
                "payload",
                "schema_version"
            ]
        );
        assert_eq!(json["destination"], json!("ns/a"));
    }

    #[test]
    fn test_envelope_bytes_survive_transport() {
        let envelope = CallRequest::new(addr("ns/a"), json!([1, 2]))
            .into_envelope()
            .unwrap();
        let decoded = MessageEnvelope::from_bytes(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(
            CallRequest::from_envelope(&decoded).unwrap().input,
            json!([1, 2])
        );
    }

    #[test]
    fn test_wrong_action_rejected() {
        let envelope = CallResponse::ok(json!(1))
            .into_envelope(addr("ns/a"), MessageId::new())
            .unwrap();
        assert!(CallRequest::from_envelope(&envelope).is_err());
        assert!(AbortRequest::from_envelope(&envelope).is_err());
    }

    #[test]
    fn test_status_decodes_from_golden_json() {
        let response: CallResponse = serde_json::from_value(json!({
            "version": { "major": 1, "minor": 0 },
            "status": { "error": { "code": "cancelled", "message": "UserCancel" } }
        }))
        .unwrap();
        match response.status {
            CallStatus::Error(err) => {
                assert_eq!(err.code, CallErrorCode::Cancelled);
                assert_eq!(err.message, "UserCancel");
                assert!(err.cause.is_none());
            }
            other => panic!("expected error status, got {:?}", other),
        }
    }
}
