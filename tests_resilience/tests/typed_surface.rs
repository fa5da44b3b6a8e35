//! Typed Surface Tests
//!
//! Callers describe a remote procedure once, with its address and result
//! schema, and get validated values back.

use npc_lifecycle::{CancellationReason, CancellationSource};
use npc_registry::HandlerError;
use npc_remote::{CallOptions, NpcError, TypedEndpoint};
use npc_schema::{Json, ValidationError};
use serde::Deserialize;
use serde_json::{json, Value};
use tests_resilience::{test_bootstrap, StuckHandler};

#[derive(Debug, Deserialize, PartialEq)]
struct Game {
    id: String,
    name: String,
}

#[tokio::test]
async fn test_json_endpoint_decodes_result() {
    let (host, client) = test_bootstrap();
    host.api()
        .register("getCurrentGame", |_v: Value| async move {
            Ok::<_, HandlerError>(json!({ "id": "skyrimse", "name": "Skyrim Special Edition" }))
        })
        .await
        .unwrap();

    let current_game: TypedEndpoint<Game, Json<Game>> =
        TypedEndpoint::json(host.endpoint("getCurrentGame").unwrap());
    let game = current_game
        .call(&client, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(
        game,
        Game {
            id: "skyrimse".to_string(),
            name: "Skyrim Special Edition".to_string(),
        }
    );
}

#[tokio::test]
async fn test_result_schema_mismatch() {
    let (host, client) = test_bootstrap();
    host.api()
        .register("getCurrentGame", |_v: Value| async move {
            Ok::<_, HandlerError>(json!({ "id": 7 }))
        })
        .await
        .unwrap();

    let endpoint = host.endpoint("getCurrentGame").unwrap();
    let current_game = TypedEndpoint::<Game, _>::json(endpoint.clone());
    let err = current_game
        .call(&client, CallOptions::new())
        .await
        .unwrap_err();
    match err {
        NpcError::SchemaValidation { endpoint: failed, .. } => assert_eq!(failed, endpoint),
        other => panic!("expected schema validation error, got {:?}", other),
    }
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ModEntry {
    id: u64,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ModList {
    mods: Vec<ModEntry>,
}

#[tokio::test]
async fn test_schema_mismatch_names_nested_field() {
    let (host, client) = test_bootstrap();
    host.api()
        .register("mods/list", |_v: Value| async move {
            Ok::<_, HandlerError>(json!({ "mods": [{ "id": 1 }, { "id": "x" }] }))
        })
        .await
        .unwrap();

    let list = TypedEndpoint::<ModList, _>::json(host.endpoint("mods/list").unwrap());
    let err = list.call(&client, CallOptions::new()).await.unwrap_err();
    match err {
        NpcError::SchemaValidation { error, .. } => {
            assert_eq!(error.issues().len(), 1);
            assert_eq!(error.issues()[0].path_string(), "$.mods[1].id");
        }
        other => panic!("expected schema validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_closure_schema_with_input() {
    let (host, client) = test_bootstrap();
    host.api()
        .register("mods/count", |v: Value| async move {
            let profile = v.as_str().unwrap_or_default().to_string();
            Ok::<_, HandlerError>(json!({ "profile": profile, "count": 42 }))
        })
        .await
        .unwrap();

    let count = TypedEndpoint::new(
        host.endpoint("mods/count").unwrap(),
        |raw: Value| -> Result<u64, ValidationError> {
            raw.get("count")
                .and_then(Value::as_u64)
                .ok_or_else(|| ValidationError::at(["count"], "expected an unsigned integer"))
        },
    );
    let value = count
        .call(&client, CallOptions::new().with_input(json!("default")))
        .await
        .unwrap();
    assert_eq!(value, 42);
}

#[tokio::test]
async fn test_remote_errors_pass_through_typed_call() {
    let (host, client) = test_bootstrap();

    let missing = TypedEndpoint::<Game, _>::json(host.endpoint("getNothing").unwrap());
    let err = missing
        .call(&client, CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unknown_endpoint");
}

#[tokio::test]
async fn test_typed_call_honours_signal() {
    let (host, client) = test_bootstrap();
    let stuck = StuckHandler::new();
    host.api()
        .register_procedure("getCurrentGame", stuck.procedure())
        .await
        .unwrap();

    let current_game = TypedEndpoint::<Game, _>::json(host.endpoint("getCurrentGame").unwrap());
    let source = CancellationSource::new();
    let call = current_game.call(&client, CallOptions::new().with_signal(source.token()));
    let cancel = async {
        stuck.started().await;
        source.cancel(CancellationReason::UserCancel);
    };
    let (result, ()) = tokio::join!(call, cancel);
    assert!(result.unwrap_err().is_cancelled());
}
