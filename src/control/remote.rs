//! Remote control endpoint of the sensor device.
//!
//! The device exposes a small HTTP API:
//! - `POST /command` - run a command string (JSON or plain text body)
//! - `POST /tcp` - point the device's frame stream at a TCP target
//! - `GET /stream/start`, `GET /stream/stop`
//!
//! [`RemoteControl`] abstracts that API so the dispatch queue and the
//! lifecycle controller can be driven by a fake in tests.

use std::future::Future;
use std::pin::Pin;

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::json;

use crate::error::{BridgeError, Result};

/// Boxed future for remote calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Status and body returned by the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, as text.
    pub body: String,
}

impl RemoteResponse {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx.
    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Where the device should stream its frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkTarget {
    /// Address of this bridge as seen by the device.
    pub ip: String,
    /// Frame listener port.
    pub port: u16,
    /// Whether the device appends a delimiter after each frame.
    pub delimiter: bool,
    /// Latency hint in microseconds.
    pub latency: u32,
    /// Output mode.
    pub output: String,
}

impl NetworkTarget {
    /// Raw 33-byte frames, no delimiter.
    pub fn raw(ip: impl Into<String>, port: u16, latency: u32) -> Self {
        Self {
            ip: ip.into(),
            port,
            delimiter: false,
            latency,
            output: "raw".to_string(),
        }
    }
}

/// Calls the bridge makes on the device's control endpoint.
pub trait RemoteControl: Send + Sync + 'static {
    /// `POST /command` with a JSON body `{"command": ...}`.
    fn post_command_json<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<RemoteResponse>>;

    /// `POST /command` with the command as a plain-text body.
    fn post_command_text<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<RemoteResponse>>;

    /// `POST /tcp` with the network target.
    fn configure_target<'a>(
        &'a self,
        target: &'a NetworkTarget,
    ) -> BoxFuture<'a, Result<RemoteResponse>>;

    /// `GET /stream/start`.
    fn stream_start(&self) -> BoxFuture<'_, Result<RemoteResponse>>;

    /// `GET /stream/stop`.
    fn stream_stop(&self) -> BoxFuture<'_, Result<RemoteResponse>>;
}

/// [`RemoteControl`] over HTTP using `reqwest`.
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemote {
    /// Create a client for the device at `device` (host, host:port or URL).
    pub fn new(device: &str) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, device))
    }

    /// Create a client reusing an existing `reqwest::Client`.
    pub fn with_client(client: reqwest::Client, device: &str) -> Self {
        let device = device.trim_end_matches('/');
        let base_url = if device.starts_with("http://") || device.starts_with("https://") {
            device.to_string()
        } else {
            format!("http://{}", device)
        };

        Self { client, base_url }
    }

    /// Base URL every call is made against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn into_response(response: reqwest::Response) -> Result<RemoteResponse> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok(RemoteResponse { status, body })
}

impl RemoteControl for HttpRemote {
    fn post_command_json<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<RemoteResponse>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url("/command"))
                .json(&json!({ "command": command }))
                .send()
                .await?;
            into_response(response).await
        })
    }

    fn post_command_text<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<RemoteResponse>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url("/command"))
                .header(CONTENT_TYPE, "text/plain")
                .body(command.to_string())
                .send()
                .await?;
            into_response(response).await
        })
    }

    fn configure_target<'a>(
        &'a self,
        target: &'a NetworkTarget,
    ) -> BoxFuture<'a, Result<RemoteResponse>> {
        Box::pin(async move {
            let response = self.client.post(self.url("/tcp")).json(target).send().await?;
            into_response(response).await
        })
    }

    fn stream_start(&self) -> BoxFuture<'_, Result<RemoteResponse>> {
        Box::pin(async move {
            let response = self.client.get(self.url("/stream/start")).send().await?;
            into_response(response).await
        })
    }

    fn stream_stop(&self) -> BoxFuture<'_, Result<RemoteResponse>> {
        Box::pin(async move {
            let response = self.client.get(self.url("/stream/stop")).send().await?;
            into_response(response).await
        })
    }
}

/// Turn a non-2xx response into [`BridgeError::Remote`].
pub fn check_response(call: &'static str, result: Result<RemoteResponse>) -> Result<RemoteResponse> {
    let response = result?;
    if response.is_success() {
        Ok(response)
    } else {
        Err(BridgeError::Remote {
            call,
            status: response.status,
            body: response.body,
        })
    }
}

/// Outcome of one attempt to send a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// The endpoint answered (any status).
    Answered(RemoteResponse),
    /// The request never got an answer.
    Failed(String),
}

impl Attempt {
    fn from_result(result: Result<RemoteResponse>) -> Self {
        match result {
            Ok(response) => Attempt::Answered(response),
            Err(e) => Attempt::Failed(e.to_string()),
        }
    }

    /// Whether the endpoint answered with 2xx.
    pub fn is_success(&self) -> bool {
        matches!(self, Attempt::Answered(r) if r.is_success())
    }

    /// HTTP status, if the endpoint answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Attempt::Answered(r) => Some(r.status),
            Attempt::Failed(_) => None,
        }
    }
}

/// What happened when a command token was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// The command token.
    pub command: String,
    /// The structured (JSON) attempt.
    pub json: Attempt,
    /// The plain-text fallback, made only if the JSON attempt failed.
    pub text: Option<Attempt>,
}

impl DispatchReport {
    /// Whether either attempt succeeded.
    pub fn succeeded(&self) -> bool {
        self.json.is_success() || self.text.as_ref().is_some_and(Attempt::is_success)
    }
}

/// Send one command, falling back to a plain-text body if JSON fails.
///
/// Neither attempt is retried; failures are logged and reported, never
/// returned as errors.
pub async fn send_command<R>(remote: &R, command: &str) -> DispatchReport
where
    R: RemoteControl + ?Sized,
{
    let json = Attempt::from_result(remote.post_command_json(command).await);
    if json.is_success() {
        tracing::debug!(command, status = ?json.status(), "command sent");
        return DispatchReport {
            command: command.to_string(),
            json,
            text: None,
        };
    }

    tracing::debug!(command, attempt = ?json, "JSON command failed, retrying as text");
    let text = Attempt::from_result(remote.post_command_text(command).await);

    if text.is_success() {
        tracing::debug!(command, status = ?text.status(), "command sent as text");
    } else {
        tracing::warn!(command, json = ?json, text = ?text, "command failed");
    }

    DispatchReport {
        command: command.to_string(),
        json,
        text: Some(text),
    }
}
