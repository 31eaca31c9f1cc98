//! Dispatch table - validates and routes incoming method requests

use super::args::{MethodArgs, ParamSpec};
use super::handlers::HandlerContext;
use greenhouse_shared::{keys, MethodRequest, MethodResponse, Payload, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::{info, warn};

/// Per-invocation failures, always turned into a response
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    #[error("direct method '{0}' not defined")]
    MethodNotFound(String),

    #[error("{0}")]
    InvalidArgument(String),
}

/// What a handler produces: an optional `Result` value for the caller
pub type HandlerResult = Result<Option<Value>, InvokeError>;

/// A direct method implementation.
///
/// Handlers run on the device's receive loop and shutdown is cooperative, so
/// a handler must return promptly; a blocking handler stalls its device's
/// shutdown.
pub type MethodHandler = fn(&HandlerContext, &MethodArgs) -> HandlerResult;

struct MethodEntry {
    params: Vec<ParamSpec>,
    handler: MethodHandler,
}

/// Fixed mapping from method name to handler, built once per device
pub struct DispatchTable {
    methods: HashMap<String, MethodEntry>,
}

/// Collects methods before the table is frozen
#[derive(Default)]
pub struct DispatchTableBuilder {
    methods: HashMap<String, MethodEntry>,
}

impl DispatchTableBuilder {
    /// Register `name`; a later registration of the same name replaces it
    pub fn method(mut self, name: &str, params: Vec<ParamSpec>, handler: MethodHandler) -> Self {
        self.methods
            .insert(name.to_string(), MethodEntry { params, handler });
        self
    }

    pub fn build(self) -> DispatchTable {
        DispatchTable {
            methods: self.methods,
        }
    }
}

impl DispatchTable {
    pub fn builder() -> DispatchTableBuilder {
        DispatchTableBuilder::default()
    }

    /// A table that answers every request with 404
    pub fn empty() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Registered method names, sorted
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up, bind and run the handler for `request`
    pub fn invoke(&self, ctx: &HandlerContext, request: &MethodRequest) -> HandlerResult {
        let entry = self
            .methods
            .get(&request.method_name)
            .ok_or_else(|| InvokeError::MethodNotFound(request.method_name.clone()))?;

        let args = MethodArgs::bind(&request.method_name, &entry.params, &request.payload)?;

        match panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(ctx, &args))) {
            Ok(result) => result,
            Err(_) => Err(InvokeError::InvalidArgument(format!(
                "handler for '{}' failed",
                request.method_name
            ))),
        }
    }

    /// Execute a request and build the response sent back to the hub
    pub fn dispatch(&self, ctx: &HandlerContext, request: &MethodRequest) -> MethodResponse {
        let name = &request.method_name;
        let mut payload = Payload::new();

        let status = match self.invoke(ctx, request) {
            Ok(result) => {
                payload.insert(
                    keys::RESPONSE.into(),
                    Value::String(format!("Executed direct method '{name}'.")),
                );
                if let Some(value) = result.filter(|v| !is_empty_result(v)) {
                    payload.insert(keys::RESULT.into(), value);
                }
                info!(device = %ctx.device_id, method = %name, "direct method executed");
                StatusCode::Ok
            }
            Err(InvokeError::MethodNotFound(_)) => {
                payload.insert(
                    keys::RESPONSE.into(),
                    Value::String(format!("direct method '{name}' not defined.")),
                );
                warn!(device = %ctx.device_id, method = %name, "direct method not defined");
                StatusCode::NotFound
            }
            Err(InvokeError::InvalidArgument(detail)) => {
                payload.insert(
                    keys::RESPONSE.into(),
                    Value::String(format!("Invalid parameter: {detail}.")),
                );
                warn!(device = %ctx.device_id, method = %name, %detail, "direct method rejected");
                StatusCode::BadArgs
            }
        };

        payload.insert(keys::DEVICE.into(), Value::String(ctx.device_id.clone()));
        payload.insert(keys::METHOD.into(), Value::String(name.clone()));

        MethodResponse::new(request.request_id.clone(), status, payload)
    }
}

/// Null, empty strings and empty collections do not count as a result
fn is_empty_result(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
