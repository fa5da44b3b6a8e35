//! Registered procedures: a handler, optionally preceded by middleware.

use npc_schema::{Json, ValidationError, Validator};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Boxed, sendable future returned by type-erased procedures
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Failure raised by a procedure handler
///
/// `kind` and the nested `cause` chain survive the trip to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerError {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<HandlerError>>,
}

impl HandlerError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// A handler failure with the generic `Error` kind
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    pub fn with_cause(mut self, cause: HandlerError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Captures any error and its `source()` chain
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut error = Self::msg(err.to_string());
        if let Some(source) = err.source() {
            error.cause = Some(Box::new(Self::from_error(source)));
        }
        error
    }

    /// Iterates this error followed by its nested causes
    pub fn chain(&self) -> impl Iterator<Item = &HandlerError> {
        std::iter::successors(Some(self), |err| err.cause.as_deref())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

/// Why invoking a procedure failed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcedureError {
    /// Middleware rejected the input; the handler did not run
    #[error("input rejected by middleware: {0}")]
    Middleware(ValidationError),

    #[error(transparent)]
    Handler(HandlerError),

    /// The handler's output could not be encoded as JSON
    #[error("handler output could not be encoded: {0}")]
    Output(String),
}

type InvokeFuture = BoxFuture<'static, Result<Value, ProcedureError>>;
type Invoke = dyn Fn(Value) -> InvokeFuture + Send + Sync;

fn encode<O: Serialize, E: Into<HandlerError>>(
    result: Result<O, E>,
) -> Result<Value, ProcedureError> {
    let output = result.map_err(|err| ProcedureError::Handler(err.into()))?;
    serde_json::to_value(output).map_err(|err| ProcedureError::Output(err.to_string()))
}

/// A callable procedure
///
/// Every procedure takes exactly one JSON argument. When middleware is
/// present it runs first and its output is the only thing the handler sees.
#[derive(Clone)]
pub struct Procedure {
    invoke: Arc<Invoke>,
    has_middleware: bool,
}

impl Procedure {
    /// Wraps an async handler that receives the raw input
    pub fn new<F, Fut, O, E>(handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
        O: Serialize,
        E: Into<HandlerError>,
    {
        Self {
            invoke: Arc::new(move |input: Value| -> InvokeFuture {
                let fut = handler(input);
                Box::pin(async move { encode(fut.await) })
            }),
            has_middleware: false,
        }
    }

    /// Wraps a synchronous handler
    pub fn from_fn<F, O, E>(handler: F) -> Self
    where
        F: Fn(Value) -> Result<O, E> + Send + Sync + 'static,
        O: Serialize,
        E: Into<HandlerError>,
    {
        Self {
            invoke: Arc::new(move |input: Value| -> InvokeFuture {
                let result = encode(handler(input));
                Box::pin(async move { result })
            }),
            has_middleware: false,
        }
    }

    /// Wraps a handler behind middleware producing its typed argument
    pub fn with_middleware<T, V, F, Fut, O, E>(middleware: V, handler: F) -> Self
    where
        T: Send + 'static,
        V: Validator<T> + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
        O: Serialize,
        E: Into<HandlerError>,
    {
        Self {
            invoke: Arc::new(move |input: Value| -> InvokeFuture {
                match middleware.parse(input) {
                    Ok(parsed) => {
                        let fut = handler(parsed);
                        Box::pin(async move { encode(fut.await) })
                    }
                    Err(err) => Box::pin(async move { Err(ProcedureError::Middleware(err)) }),
                }
            }),
            has_middleware: true,
        }
    }

    /// Handler whose argument is decoded with its `Deserialize` impl
    pub fn typed<T, F, Fut, O, E>(handler: F) -> Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
        O: Serialize,
        E: Into<HandlerError>,
    {
        Self::with_middleware(Json::<T>::new(), handler)
    }

    /// Puts `middleware` in front of this procedure
    pub fn with_input_middleware(self, middleware: Arc<dyn Validator<Value>>) -> Self {
        let inner = self.invoke;
        Self {
            invoke: Arc::new(move |input: Value| -> InvokeFuture {
                match middleware.parse(input) {
                    Ok(parsed) => inner(parsed),
                    Err(err) => Box::pin(async move { Err(ProcedureError::Middleware(err)) }),
                }
            }),
            has_middleware: true,
        }
    }

    /// Runs middleware now and returns the handler's pending result
    pub fn invoke(&self, input: Value) -> BoxFuture<'static, Result<Value, ProcedureError>> {
        (self.invoke)(input)
    }

    pub fn has_middleware(&self) -> bool {
        self.has_middleware
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("has_middleware", &self.has_middleware)
            .finish_non_exhaustive()
    }
}
