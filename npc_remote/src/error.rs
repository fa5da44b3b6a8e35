//! Caller-facing error taxonomy.

use crate::transport::TransportError;
use npc_ipc::{CallError, CallErrorCode};
use npc_lifecycle::CancellationReason;
use npc_registry::HandlerError;
use npc_schema::ValidationError;
use npc_types::{EndpointAddress, InvalidAddressError};
use thiserror::Error;

/// Why a call did not produce a value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NpcError {
    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddressError),

    #[error("no procedure registered at {endpoint}")]
    UnknownEndpoint { endpoint: EndpointAddress },

    /// Middleware rejected the input; the handler never ran
    #[error("input for {endpoint} rejected by middleware: {error}")]
    Middleware {
        endpoint: EndpointAddress,
        error: ValidationError,
    },

    /// The call succeeded but its result failed the caller's schema
    #[error("result of {endpoint} failed schema validation: {error}")]
    SchemaValidation {
        endpoint: EndpointAddress,
        error: ValidationError,
    },

    #[error("procedure {endpoint} failed: {error}")]
    Handler {
        endpoint: EndpointAddress,
        error: HandlerError,
    },

    #[error("call to {endpoint} cancelled: {reason}")]
    Cancelled {
        endpoint: EndpointAddress,
        reason: CancellationReason,
    },

    #[error("call to {endpoint} rejected: {message}")]
    VersionMismatch {
        endpoint: EndpointAddress,
        message: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("codec error: {0}")]
    Codec(String),
}

impl NpcError {
    /// Stable discriminator for matching and logging
    pub fn kind(&self) -> &'static str {
        match self {
            NpcError::InvalidAddress(_) => "invalid_address",
            NpcError::UnknownEndpoint { .. } => "unknown_endpoint",
            NpcError::Middleware { .. } => "middleware",
            NpcError::SchemaValidation { .. } => "schema_validation",
            NpcError::Handler { .. } => "handler",
            NpcError::Cancelled { .. } => "cancelled",
            NpcError::VersionMismatch { .. } => "version_mismatch",
            NpcError::Transport(_) => "transport",
            NpcError::Codec(_) => "codec",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, NpcError::Cancelled { .. })
    }

    /// Rebuilds the caller-side error from a wire error
    pub fn from_call_error(endpoint: EndpointAddress, error: CallError) -> Self {
        match error.code {
            CallErrorCode::UnknownEndpoint => NpcError::UnknownEndpoint { endpoint },
            CallErrorCode::InvalidInput => NpcError::Middleware {
                endpoint,
                error: ValidationError::new(error.issues),
            },
            CallErrorCode::HandlerFailed => NpcError::Handler {
                endpoint,
                error: handler_error(error),
            },
            CallErrorCode::Cancelled => NpcError::Cancelled {
                endpoint,
                reason: CancellationReason::Custom(error.message),
            },
            CallErrorCode::UnsupportedVersion => NpcError::VersionMismatch {
                endpoint,
                message: error.message,
            },
            CallErrorCode::Internal => match error.details {
                Some(details) => NpcError::Codec(format!("{}: {}", error.message, details)),
                None => NpcError::Codec(error.message),
            },
        }
    }
}

fn handler_error(error: CallError) -> HandlerError {
    let mut rebuilt = HandlerError::new(
        error.kind.unwrap_or_else(|| "Error".to_string()),
        error.message,
    );
    if let Some(cause) = error.cause {
        rebuilt = rebuilt.with_cause(handler_error(*cause));
    }
    rebuilt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> EndpointAddress {
        EndpointAddress::parse("vortex/ns/square").unwrap()
    }

    #[test]
    fn test_kinds_are_distinct() {
        let errors = vec![
            NpcError::InvalidAddress(InvalidAddressError::Empty),
            NpcError::UnknownEndpoint {
                endpoint: endpoint(),
            },
            NpcError::Codec("x".to_string()),
            NpcError::Transport(TransportError::Closed),
        ];
        let kinds: Vec<_> = errors.iter().map(NpcError::kind).collect();
        assert_eq!(
            kinds,
            vec!["invalid_address", "unknown_endpoint", "codec", "transport"]
        );
    }

    #[test]
    fn test_handler_cause_chain_rebuilt() {
        let wire = CallError::new(CallErrorCode::HandlerFailed, "download failed")
            .with_kind("DownloadError")
            .with_cause(CallError::new(CallErrorCode::HandlerFailed, "disk full"));

        match NpcError::from_call_error(endpoint(), wire) {
            NpcError::Handler { error, .. } => {
                assert_eq!(error.kind, "DownloadError");
                let cause = error.cause.unwrap();
                assert_eq!(cause.kind, "Error");
                assert_eq!(cause.message, "disk full");
            }
            other => panic!("expected handler error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_input_becomes_middleware_error() {
        let wire = CallError::invalid_input(ValidationError::at(["n"], "expected a number"));
        let err = NpcError::from_call_error(endpoint(), wire);
        assert_eq!(err.kind(), "middleware");
        assert!(err.to_string().contains("$.n: expected a number"));
    }

    #[test]
    fn test_internal_details_kept() {
        let wire = CallError::internal("procedure output could not be encoded")
            .with_details("key must be a string");
        assert_eq!(
            NpcError::from_call_error(endpoint(), wire),
            NpcError::Codec(
                "procedure output could not be encoded: key must be a string".to_string()
            )
        );
        assert_eq!(
            NpcError::from_call_error(endpoint(), CallError::internal("boom")),
            NpcError::Codec("boom".to_string())
        );
    }

    #[test]
    fn test_cancelled_from_wire() {
        let err = NpcError::from_call_error(endpoint(), CallError::cancelled("shutting down"));
        assert!(err.is_cancelled());
    }
}
