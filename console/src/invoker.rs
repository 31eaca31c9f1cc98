//! Command invoker - authenticated direct method calls over HTTP

use crate::token::TokenManager;
use greenhouse_shared::sas::SasError;
use greenhouse_shared::{timing, DescriptorError, DirectMethodBody, Payload};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// API version appended to every direct method URL
pub const API_VERSION: &str = "2018-06-30";

/// Extra time the HTTP client waits beyond the device response timeout
const HTTP_GRACE: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum InvokerError {
    #[error("Invalid hub credentials: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("Token signing failed: {0}")]
    Token(#[from] SasError),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Hub answered {status}: {body}")]
    Remote { status: u16, body: String },
}

/// `<base>/twins/<device_id>/methods?api-version=2018-06-30`
pub fn device_method_url(base: &str, device_id: &str) -> String {
    format!(
        "{}/twins/{}/methods?api-version={}",
        base.trim_end_matches('/'),
        device_id,
        API_VERSION
    )
}

/// One direct method call: name, arguments and how long the device may take
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    method_name: String,
    arguments: Payload,
    overrides: Payload,
    response_timeout: Duration,
}

impl MethodCall {
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            arguments: Payload::new(),
            overrides: Payload::new(),
            response_timeout: Duration::from_secs(timing::METHOD_RESPONSE_TIMEOUT_SECS),
        }
    }

    /// Base arguments
    pub fn arguments(mut self, arguments: Payload) -> Self {
        self.arguments = arguments;
        self
    }

    /// Single argument; wins over a base argument with the same key
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Base arguments merged with the overrides
    pub fn payload(&self) -> Payload {
        let mut payload = self.arguments.clone();
        payload.extend(self.overrides.clone());
        payload
    }

    pub fn body(&self) -> DirectMethodBody {
        DirectMethodBody {
            method_name: self.method_name.clone(),
            response_timeout_in_seconds: self.response_timeout.as_secs(),
            payload: self.payload(),
        }
    }
}

/// Sends direct methods to the hub, signing each request
pub struct CommandInvoker {
    client: reqwest::Client,
    tokens: Mutex<TokenManager>,
}

impl CommandInvoker {
    /// Build an invoker from a hub access policy descriptor
    pub fn new(descriptor: &str) -> Result<Self, InvokerError> {
        Ok(Self::with_tokens(TokenManager::new(descriptor)?))
    }

    pub fn with_tokens(tokens: TokenManager) -> Self {
        Self {
            client: reqwest::Client::new(),
            tokens: Mutex::new(tokens),
        }
    }

    /// POST `call` to `url` and return the hub's JSON answer as is
    pub async fn invoke(&self, url: &str, call: &MethodCall) -> Result<Value, InvokerError> {
        let token = self.tokens.lock().await.current_token()?;
        debug!(%url, method = %call.method_name, "invoking direct method");

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, token.value)
            .header(CONTENT_TYPE, "application/json")
            .timeout(call.response_timeout + HTTP_GRACE)
            .json(&call.body())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(InvokerError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let value = serde_json::from_str(&body).map_err(|_| InvokerError::Remote {
            status: status.as_u16(),
            body: body.clone(),
        })?;
        info!(%url, method = %call.method_name, status = status.as_u16(), "direct method answered");
        Ok(value)
    }

    /// Invoke on `device_id` under the hub base URL
    pub async fn invoke_device(
        &self,
        base: &str,
        device_id: &str,
        call: &MethodCall,
    ) -> Result<Value, InvokerError> {
        self.invoke(&device_method_url(base, device_id), call).await
    }
}
